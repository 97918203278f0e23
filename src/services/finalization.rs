use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::services::ledger::ProcessedLedger;

/// Marks unfinished acquisitions whose folder has seen no new file for longer
/// than `idle` as finished, stamped with the folder's last ledger time.
///
/// Folders without ledger entries are left alone. A consistency error aborts
/// the pass and is returned to the caller.
pub fn finalize_idle_acquisitions(
    conn: &Connection,
    ledger: &ProcessedLedger,
    now: DateTime<Utc>,
    idle: Duration,
) -> Result<Vec<String>, AppError> {
    let mut finalized = Vec::new();

    for folder in repository::unfinished_acquisition_folders(conn)? {
        let Some(last_seen) = ledger.folder_watermark(&folder) else {
            tracing::debug!("no ledger entries for unfinished {folder}");
            continue;
        };

        if now - last_seen > idle {
            tracing::info!("acquisition finished: {folder} (last file {last_seen})");
            repository::mark_acquisition_finished(conn, &folder, last_seen)?;
            finalized.push(folder);
        }
    }

    Ok(finalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::acquisition::AcquisitionStatus;
    use crate::models::image::ParsedFilename;
    use crate::services::filename_parser::FilenameParser;
    use crate::services::test_support::{setup_db, StubParser};
    use chrono::TimeZone;
    use std::path::Path;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn seed_acquisition(conn: &Connection, image_path: &str) {
        let ParsedFilename::Image(meta) = StubParser.parse(Path::new(image_path)) else {
            panic!("stub parser always parses");
        };
        repository::select_or_insert_acquisition(conn, &meta).unwrap();
    }

    #[test]
    fn test_idle_folder_is_finished_at_last_touch() {
        let conn = setup_db();
        seed_acquisition(&conn, "/data/plateB/a.tif");
        let mut ledger = ProcessedLedger::new();
        ledger.record("/data/plateB/a.tif", t(0));

        let done = finalize_idle_acquisitions(&conn, &ledger, t(601), Duration::seconds(600))
            .unwrap();

        assert_eq!(done, vec!["/data/plateB"]);
        let acq = repository::get_acquisition(&conn, "/data/plateB").unwrap().unwrap();
        assert_eq!(acq.status(), AcquisitionStatus::Finished);
        assert_eq!(acq.finished, Some(t(0)));
    }

    #[test]
    fn test_exactly_at_cutoff_stays_unfinished() {
        let conn = setup_db();
        seed_acquisition(&conn, "/data/plateB/a.tif");
        let mut ledger = ProcessedLedger::new();
        ledger.record("/data/plateB/a.tif", t(0));

        let done = finalize_idle_acquisitions(&conn, &ledger, t(600), Duration::seconds(600))
            .unwrap();
        assert!(done.is_empty());
    }

    #[test]
    fn test_recent_file_in_folder_keeps_it_open() {
        let conn = setup_db();
        seed_acquisition(&conn, "/data/plateB/a.tif");
        let mut ledger = ProcessedLedger::new();
        ledger.record("/data/plateB/b.tif", t(500));
        ledger.record("/data/plateB/a.tif", t(0));

        let done = finalize_idle_acquisitions(&conn, &ledger, t(700), Duration::seconds(600))
            .unwrap();
        assert!(done.is_empty());
    }

    #[test]
    fn test_folder_without_ledger_entries_is_skipped() {
        let conn = setup_db();
        seed_acquisition(&conn, "/data/plateB/a.tif");
        let ledger = ProcessedLedger::new();

        let done = finalize_idle_acquisitions(&conn, &ledger, t(10_000), Duration::seconds(600))
            .unwrap();
        assert!(done.is_empty());
        assert_eq!(repository::unfinished_acquisition_folders(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_subfolder_entries_do_not_count_for_parent() {
        let conn = setup_db();
        seed_acquisition(&conn, "/data/plate/a.tif");
        let mut ledger = ProcessedLedger::new();
        ledger.record("/data/plate/sub/x.tif", t(0));

        let done = finalize_idle_acquisitions(&conn, &ledger, t(10_000), Duration::seconds(600))
            .unwrap();
        assert!(done.is_empty());
    }
}
