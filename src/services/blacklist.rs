use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use crate::error::AppError;

pub const FAULT_LOG_FILE: &str = "exceptions-last-poll.log";
pub const SNAPSHOT_FILE: &str = "blacklist.json";

#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    pub folder: String,
    pub reason: String,
    pub blacklisted_at: DateTime<Utc>,
}

/// Directories excluded from polling after an import failure. Entries live
/// until the process exits.
#[derive(Debug)]
pub struct Blacklist {
    entries: Vec<BlacklistEntry>,
    folders: HashSet<String>,
    fault_log_path: PathBuf,
    snapshot_path: PathBuf,
}

impl Blacklist {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            entries: Vec::new(),
            folders: HashSet::new(),
            fault_log_path: log_dir.join(FAULT_LOG_FILE),
            snapshot_path: log_dir.join(SNAPSHOT_FILE),
        }
    }

    pub fn contains(&self, folder: &str) -> bool {
        self.folders.contains(folder)
    }

    pub fn entries(&self) -> &[BlacklistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fault_log_path(&self) -> &Path {
        &self.fault_log_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Excludes `folder` and appends the failure to the fault log. A fault log
    /// that cannot be written is reported but does not undo the exclusion.
    pub fn add(&mut self, folder: &str, err: &AppError, at: DateTime<Utc>) -> bool {
        if !self.folders.insert(folder.to_string()) {
            return false;
        }
        tracing::error!("blacklisting {folder}: {err}");

        let entry = BlacklistEntry {
            folder: folder.to_string(),
            reason: format!("{err:?}"),
            blacklisted_at: at,
        };
        if let Err(e) = self.append_fault_log(&entry, err) {
            tracing::warn!(
                "could not write fault log {}: {e}",
                self.fault_log_path.display()
            );
        }
        self.entries.push(entry);
        true
    }

    fn append_fault_log(&self, entry: &BlacklistEntry, err: &AppError) -> Result<(), AppError> {
        if let Some(parent) = self.fault_log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.fault_log_path)?;
        writeln!(file, "Exception, time: {}", entry.blacklisted_at.to_rfc3339())?;
        writeln!(file, "img_dir: {}", entry.folder)?;
        writeln!(file, "error: {err}")?;
        writeln!(file, "detail: {}", entry.reason)?;
        writeln!(file)?;
        Ok(())
    }

    /// Overwrites the snapshot with the blacklisted folders as a JSON array.
    pub fn write_snapshot(&self) -> Result<(), AppError> {
        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let folders: Vec<&str> = self.entries.iter().map(|e| e.folder.as_str()).collect();
        let json = serde_json::to_string_pretty(&folders)?;
        fs::write(&self.snapshot_path, json)?;
        Ok(())
    }
}
