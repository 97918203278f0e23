use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::config::MonitorConfig;
use crate::data::repository;
use crate::error::AppError;
use crate::services::filename_parser::FilenameParser;
use crate::services::finalization::finalize_idle_acquisitions;
use crate::services::import_service::{import_directory, DirectoryImport, ImportContext};
use crate::services::scanner::ImageDirScanner;
use crate::services::thumbnail_service::TagExtractor;
use crate::state::MonitorState;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub root_dirs: Vec<PathBuf>,
    pub poll_interval: std::time::Duration,
    pub stale_margin: Duration,
    pub idle_margin: Duration,
    pub continuous: bool,
    pub thumbnail_dir: Option<PathBuf>,
}

impl From<&MonitorConfig> for PollSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            root_dirs: config.root_dirs.clone(),
            poll_interval: config.poll_interval(),
            stale_margin: config.stale_margin(),
            idle_margin: config.idle_margin(),
            continuous: config.continuous_polling,
            thumbnail_dir: config.thumbnail_dir.clone(),
        }
    }
}

/// Result of importing one candidate directory. A failure here never stops
/// the rest of the cycle.
#[derive(Debug)]
pub enum DirectoryOutcome {
    Imported {
        dir: PathBuf,
        summary: DirectoryImport,
    },
    Failed {
        dir: PathBuf,
        error: AppError,
    },
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub candidates: usize,
    pub skipped_finished: usize,
    pub skipped_stale: usize,
    pub skipped_blacklisted: usize,
    pub outcomes: Vec<DirectoryOutcome>,
    pub finalized: Vec<String>,
    pub ledger_cleared: bool,
}

impl CycleReport {
    pub fn imported_dirs(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                DirectoryOutcome::Imported { dir, .. } => Some(dir.as_path()),
                DirectoryOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failed_dirs(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                DirectoryOutcome::Failed { dir, .. } => Some(dir.as_path()),
                DirectoryOutcome::Imported { .. } => None,
            })
            .collect()
    }

    pub fn images_inserted(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                DirectoryOutcome::Imported { summary, .. } => summary.inserted,
                DirectoryOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

fn last_modified(dir: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(dir).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Drives discover, filter, import, finalize, prune and persist, then sleeps
/// or stops.
pub struct PollScheduler {
    settings: PollSettings,
    parser: Box<dyn FilenameParser>,
    extractor: Box<dyn TagExtractor>,
    state: MonitorState,
}

impl PollScheduler {
    pub fn new(
        settings: PollSettings,
        parser: Box<dyn FilenameParser>,
        extractor: Box<dyn TagExtractor>,
        state: MonitorState,
    ) -> Self {
        Self {
            settings,
            parser,
            extractor,
            state,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn discover(&self) -> HashSet<PathBuf> {
        ImageDirScanner::new(&self.settings.root_dirs)
            .sorted()
            .collect()
    }

    /// Drops finished, stale and blacklisted candidates. The survivors come
    /// back sorted so a cycle processes directories in a stable order.
    fn filter(
        &self,
        conn: &Connection,
        candidates: HashSet<PathBuf>,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<Vec<PathBuf>, AppError> {
        let finished = repository::finished_acquisition_folders(conn)?;
        let stale_cutoff = now - self.settings.stale_margin;

        let mut survivors = Vec::new();
        for dir in candidates {
            let key = dir.to_string_lossy();
            if finished.contains(key.as_ref()) {
                report.skipped_finished += 1;
                continue;
            }
            match last_modified(&dir) {
                Some(modified) if modified >= stale_cutoff => {}
                Some(_) => {
                    report.skipped_stale += 1;
                    continue;
                }
                None => {
                    tracing::debug!("candidate vanished: {}", dir.display());
                    report.skipped_stale += 1;
                    continue;
                }
            }
            if self.state.blacklist.contains(key.as_ref()) {
                tracing::info!("removed because blacklisted: {key}");
                report.skipped_blacklisted += 1;
                continue;
            }
            survivors.push(dir);
        }
        survivors.sort();
        Ok(survivors)
    }

    /// Runs one full polling cycle as of `now`.
    ///
    /// Per-directory import errors end up in the report and the blacklist;
    /// only store errors outside an import and consistency violations are
    /// returned.
    pub fn run_cycle(
        &mut self,
        conn: &Connection,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, AppError> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        let candidates = self.discover();
        report.candidates = candidates.len();

        let dirs = self.filter(conn, candidates, now, &mut report)?;
        tracing::info!(
            "{} candidate dirs, {} finished, {} stale, {} blacklisted, {} to import",
            report.candidates,
            report.skipped_finished,
            report.skipped_stale,
            report.skipped_blacklisted,
            dirs.len()
        );

        let ctx = ImportContext {
            parser: &*self.parser,
            extractor: &*self.extractor,
            thumbnail_dir: self.settings.thumbnail_dir.as_deref(),
        };
        for dir in dirs {
            match import_directory(conn, &ctx, &mut self.state.ledger, &dir, now) {
                Ok(summary) => {
                    report.outcomes.push(DirectoryOutcome::Imported { dir, summary });
                }
                Err(error) => {
                    self.state.blacklist.add(&dir.to_string_lossy(), &error, now);
                    report.outcomes.push(DirectoryOutcome::Failed { dir, error });
                }
            }
        }

        report.finalized =
            finalize_idle_acquisitions(conn, &self.state.ledger, now, self.settings.idle_margin)?;

        report.ledger_cleared = self
            .state
            .ledger
            .prune_if_idle(now, self.settings.idle_margin);

        if let Err(e) = self.state.blacklist.write_snapshot() {
            tracing::warn!(
                "could not write blacklist snapshot {}: {e}",
                self.state.blacklist.snapshot_path().display()
            );
        }
        if !self.state.blacklist.is_empty() {
            let folders: Vec<&str> = self
                .state
                .blacklist
                .entries()
                .iter()
                .map(|e| e.folder.as_str())
                .collect();
            tracing::info!("blacklist: {folders:?}");
        }

        tracing::info!(
            "cycle done in {:.1}s: {} images inserted, {} dirs failed, {} acquisitions finished",
            started.elapsed().as_secs_f64(),
            report.images_inserted(),
            report.failed_dirs().len(),
            report.finalized.len()
        );
        Ok(report)
    }

    /// Polls until an error surfaces or, in single-pass mode, after one cycle.
    pub fn run(&mut self, conn: &Connection) -> Result<(), AppError> {
        tracing::info!("polling roots: {:?}", self.settings.root_dirs);
        loop {
            self.run_cycle(conn, Utc::now())?;

            if !self.settings.continuous {
                return Ok(());
            }
            tracing::info!("sleeping for {}s", self.settings.poll_interval.as_secs());
            std::thread::sleep(self.settings.poll_interval);
        }
    }
}
