// ─────────────────────────────────────────────────────────────────────
// Truthal — Triage Queue
// ─────────────────────────────────────────────────────────────────────
//! Bounded, priority-ordered admission queue.
//!
//! A flood of low-priority submissions cannot starve high-priority
//! evidence: each drain returns at most `max_concurrent` items, highest
//! priority first, and everything else waits in arrival order.

use parking_lot::Mutex;

use truthal_types::Evidence;

use crate::constitution::Constitution;

pub struct TriageQueue {
    constitution: Constitution,
    max_concurrent: usize,
    queue: Mutex<Vec<Evidence>>,
}

impl TriageQueue {
    pub fn new(constitution: Constitution) -> Self {
        let max_concurrent = constitution.config().max_concurrent;
        Self {
            constitution,
            max_concurrent,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Queue an item, attaching its priority score.
    pub fn enqueue(&self, mut evidence: Evidence) {
        evidence.priority_score = Some(self.constitution.priority(&evidence));
        self.queue.lock().push(evidence);
    }

    /// Remove and return up to `n` highest-priority items.
    ///
    /// `n` is capped at `max_concurrent`. Ties keep enqueue order and the
    /// items left behind keep their relative order.
    pub fn drain_top_n(&self, n: usize) -> Vec<Evidence> {
        let mut queue = self.queue.lock();
        let take = n.min(self.max_concurrent).min(queue.len());
        if take == 0 {
            return Vec::new();
        }

        let order = self.constitution.rank(&queue);
        let selected = &order[..take];

        let mut slots: Vec<Option<Evidence>> = queue.drain(..).map(Some).collect();
        let drained: Vec<Evidence> = selected
            .iter()
            .filter_map(|&i| slots[i].take())
            .collect();
        queue.extend(slots.into_iter().flatten());
        drained
    }

    /// Drain one full batch.
    pub fn drain_batch(&self) -> Vec<Evidence> {
        self.drain_top_n(self.max_concurrent)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthal_types::GateConfig;

    fn queue_with(max_concurrent: usize) -> TriageQueue {
        TriageQueue::new(Constitution::new(GateConfig {
            max_concurrent,
            ..Default::default()
        }))
    }

    fn ev(id: &str, scope: f64, irreversibility: f64) -> Evidence {
        Evidence::new(id, "").with_priority_factors(scope, irreversibility)
    }

    fn ids(items: &[Evidence]) -> Vec<String> {
        items.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_drain_orders_by_priority() {
        let q = queue_with(5);
        q.enqueue(ev("a", 0.2, 0.2));
        q.enqueue(ev("b", 0.9, 0.9));
        q.enqueue(ev("c", 0.5, 0.5));
        let out = q.drain_top_n(3);
        assert_eq!(ids(&out), vec!["b", "c", "a"]);
        let scores: Vec<f64> = out.iter().map(|e| e.priority_score.unwrap()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(q.is_empty());
    }

    #[test]
    fn test_survivors_keep_relative_order() {
        let q = queue_with(5);
        q.enqueue(ev("n1", 0.1, 0.1));
        q.enqueue(ev("hot", 1.0, 1.0));
        q.enqueue(ev("n2", 0.1, 0.2));
        q.enqueue(ev("n3", 0.1, 0.1));
        let out = q.drain_top_n(1);
        assert_eq!(ids(&out), vec!["hot"]);
        let rest = q.drain_top_n(5);
        // n2 has the highest remaining priority; n1 and n3 tie in arrival order.
        assert_eq!(ids(&rest), vec!["n2", "n1", "n3"]);
    }

    #[test]
    fn test_ties_preserve_enqueue_order() {
        let q = queue_with(5);
        for id in ["x", "y", "z"] {
            q.enqueue(ev(id, 0.5, 0.5));
        }
        assert_eq!(ids(&q.drain_top_n(2)), vec!["x", "y"]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_drain_capped_at_max_concurrent() {
        let q = queue_with(5);
        for i in 0..20 {
            q.enqueue(ev(&format!("noise{i}"), 0.1, 0.1));
        }
        q.enqueue(ev("critical", 1.0, 1.0));
        let out = q.drain_top_n(100);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].id, "critical");
        assert_eq!(q.len(), 16);
    }

    #[test]
    fn test_drain_more_than_len_returns_all() {
        let q = queue_with(5);
        q.enqueue(ev("only", 0.3, 0.3));
        let out = q.drain_batch();
        assert_eq!(out.len(), 1);
        assert!(q.drain_top_n(3).is_empty());
    }

    #[test]
    fn test_inflated_factors_do_not_outrank_critical() {
        let q = queue_with(5);
        let noise: Evidence =
            serde_json::from_str(r#"{"id": "noise", "scope": 1000.0, "irreversibility": 0.5}"#)
                .unwrap();
        q.enqueue(noise);
        q.enqueue(ev("critical", 0.9, 0.9));
        let out = q.drain_batch();
        assert_eq!(ids(&out), vec!["critical", "noise"]);
        assert_eq!(out[1].priority_score, Some(0.5));
    }

    #[test]
    fn test_drain_zero() {
        let q = queue_with(5);
        q.enqueue(ev("a", 0.3, 0.3));
        assert!(q.drain_top_n(0).is_empty());
        assert_eq!(q.len(), 1);
    }
}
