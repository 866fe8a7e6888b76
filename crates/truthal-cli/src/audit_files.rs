// ─────────────────────────────────────────────────────────────────────
// Truthal — Daily-Rotated Audit Files
// ─────────────────────────────────────────────────────────────────────
//! `AuditSink` that stores entries as JSON arrays, one file per UTC day:
//! `<dir>/YYYY-MM-DD_audit.json`.
//!
//! Each append writes the whole day file to a temporary file in the same
//! directory and renames it into place, so a crash leaves either the old
//! or the new array on disk. The current day is cached in memory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use truthal_core::AuditSink;
use truthal_types::{GateError, GateResult, LogEntry};

const SUFFIX: &str = "_audit.json";

/// Entries of the day file last written.
struct DayCache {
    path: PathBuf,
    entries: Vec<LogEntry>,
}

pub struct DailyAuditSink {
    dir: PathBuf,
    day: Mutex<Option<DayCache>>,
}

impl DailyAuditSink {
    /// Open (and create if needed) an audit directory.
    pub fn open(dir: impl Into<PathBuf>) -> GateResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| GateError::Sink(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            day: Mutex::new(None),
        })
    }

    pub fn file_for(&self, entry: &LogEntry) -> PathBuf {
        self.dir
            .join(format!("{}{SUFFIX}", entry.timestamp.format("%Y-%m-%d")))
    }

    /// Audit files in chronological order.
    pub fn files(&self) -> GateResult<Vec<PathBuf>> {
        let listing = fs::read_dir(&self.dir)
            .map_err(|e| GateError::Sink(format!("cannot list {}: {e}", self.dir.display())))?;
        let mut files: Vec<PathBuf> = listing
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(SUFFIX))
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

fn read_file(path: &Path) -> GateResult<Vec<LogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)
        .map_err(|e| GateError::Sink(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| GateError::Sink(format!("malformed audit file {}: {e}", path.display())))
}

fn write_atomic(dir: &Path, path: &Path, entries: &[LogEntry]) -> GateResult<()> {
    let sink_err =
        |e: std::io::Error| GateError::Sink(format!("cannot write {}: {e}", path.display()));
    let mut tmp = NamedTempFile::new_in(dir).map_err(sink_err)?;
    tmp.write_all(serde_json::to_string_pretty(entries)?.as_bytes())
        .map_err(sink_err)?;
    tmp.as_file().sync_all().map_err(sink_err)?;
    tmp.persist(path).map_err(|e| sink_err(e.error))?;
    Ok(())
}

impl AuditSink for DailyAuditSink {
    fn append(&self, entry: &LogEntry) -> GateResult<()> {
        let mut day = self.day.lock();
        let path = self.file_for(entry);
        let mut cache = match day.take() {
            Some(cache) if cache.path == path => cache,
            _ => DayCache {
                entries: read_file(&path)?,
                path,
            },
        };
        cache.entries.push(entry.clone());
        if let Err(e) = write_atomic(&self.dir, &cache.path, &cache.entries) {
            // the file still holds the previous array
            cache.entries.pop();
            *day = Some(cache);
            return Err(e);
        }
        *day = Some(cache);
        Ok(())
    }

    fn read_all(&self) -> GateResult<Vec<LogEntry>> {
        let _guard = self.day.lock();
        let mut all = Vec::new();
        for path in self.files()? {
            all.extend(read_file(&path)?);
        }
        Ok(all)
    }
}
