use std::path::Path;

use crate::services::blacklist::Blacklist;
use crate::services::ledger::ProcessedLedger;

/// Process-local bookkeeping carried from one poll cycle to the next.
#[derive(Debug)]
pub struct MonitorState {
    pub ledger: ProcessedLedger,
    pub blacklist: Blacklist,
}

impl MonitorState {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            ledger: ProcessedLedger::new(),
            blacklist: Blacklist::new(log_dir),
        }
    }
}
