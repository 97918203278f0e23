use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

/// Paths already handled by the import pipeline.
///
/// Alongside the paths the ledger keeps a high watermark per folder
/// and one for the whole ledger, so finalization and pruning never depend on
/// insertion order.
#[derive(Debug, Default)]
pub struct ProcessedLedger {
    entries: HashSet<String>,
    folder_watermarks: HashMap<String, DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

fn folder_of(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl ProcessedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    pub fn record(&mut self, path: &str, seen_at: DateTime<Utc>) {
        self.entries.insert(path.to_string());

        let watermark = self
            .folder_watermarks
            .entry(folder_of(path))
            .or_insert(seen_at);
        if seen_at > *watermark {
            *watermark = seen_at;
        }

        if self.latest.map_or(true, |latest| seen_at > latest) {
            self.latest = Some(seen_at);
        }
    }

    /// Most recent time any file directly inside `folder` was recorded.
    pub fn folder_watermark(&self, folder: &str) -> Option<DateTime<Utc>> {
        self.folder_watermarks.get(folder).copied()
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.folder_watermarks.clear();
        self.latest = None;
    }

    /// Drops everything once nothing has been recorded for longer than
    /// `idle`. Returns whether the ledger was cleared.
    pub fn prune_if_idle(&mut self, now: DateTime<Utc>, idle: Duration) -> bool {
        match self.latest {
            Some(latest) if latest < now - idle => {
                tracing::info!("clearing processed ledger ({} entries)", self.entries.len());
                self.clear();
                true
            }
            _ => false,
        }
    }
}
