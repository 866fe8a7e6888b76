// ─────────────────────────────────────────────────────────────────────
// Truthal — Verifier Snapshots
// ─────────────────────────────────────────────────────────────────────
//! Named JSON snapshots of engine state under a snapshot directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::Value;

/// Write `data` to `<dir>/<name>`, defaulting to a UTC-timestamped name.
pub fn save_snapshot(dir: &Path, name: Option<&str>, data: &Value) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let name = match name {
        Some(n) => n.to_string(),
        None => Utc::now().format("%Y-%m-%d_%H-%M-%S_snapshot.json").to_string(),
    };
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(data)?)
        .with_context(|| format!("writing snapshot {}", path.display()))?;
    log::info!("Snapshot saved to {}", path.display());
    Ok(path)
}

pub fn load_snapshot(dir: &Path, name: &str) -> Result<Value> {
    let path = dir.join(name);
    if !path.exists() {
        bail!("snapshot {name} does not exist");
    }
    let text =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
