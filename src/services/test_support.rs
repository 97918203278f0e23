//! Stub collaborators shared by the service tests.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::data::migrations;
use crate::error::AppError;
use crate::models::image::{ImageMeta, ParsedFilename};
use crate::services::filename_parser::FilenameParser;
use crate::services::thumbnail_service::TagExtractor;

pub fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    migrations::run_migrations(&conn).unwrap();
    conn
}

pub fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"pixels").unwrap();
}

/// Plate is the folder name. Names starting with `junk` are unparseable and
/// names containing `_thumb` are thumbnails.
pub struct StubParser;

impl FilenameParser for StubParser {
    fn parse(&self, path: &Path) -> ParsedFilename {
        let filename = path.file_name().unwrap().to_string_lossy().to_string();
        if filename.starts_with("junk") {
            return ParsedFilename::Unparseable;
        }
        let plate = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        ParsedFilename::Image(ImageMeta {
            path: path.to_string_lossy().to_string(),
            filename: filename.clone(),
            project: "proj".to_string(),
            plate,
            well: "A01".to_string(),
            site: "1".to_string(),
            channel: "1".to_string(),
            timepoint: "1".to_string(),
            extension: "tif".to_string(),
            microscope: "Unknown".to_string(),
            magnification: "?x".to_string(),
            imaged: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            channel_map_id: 1,
            guid: None,
            is_thumbnail: filename.contains("_thumb"),
        })
    }
}

#[derive(Default)]
pub struct CountingExtractor {
    pub tag_calls: AtomicUsize,
    pub thumbnail_calls: AtomicUsize,
}

impl TagExtractor for CountingExtractor {
    fn extract_tags(&self, _path: &Path) -> Result<serde_json::Value, AppError> {
        self.tag_calls.fetch_add(1, Ordering::Relaxed);
        Ok(serde_json::json!({"width": 1, "height": 1}))
    }

    fn make_thumbnail(&self, _src: &Path, dest: &Path) -> Result<(), AppError> {
        self.thumbnail_calls.fetch_add(1, Ordering::Relaxed);
        touch(dest);
        Ok(())
    }
}

pub struct FailingExtractor;

impl TagExtractor for FailingExtractor {
    fn extract_tags(&self, path: &Path) -> Result<serde_json::Value, AppError> {
        Err(AppError::Image(format!("unreadable tags: {}", path.display())))
    }

    fn make_thumbnail(&self, src: &Path, _dest: &Path) -> Result<(), AppError> {
        Err(AppError::Image(format!("cannot decode {}", src.display())))
    }
}

/// Makes every image insert below `folder_fragment` fail inside SQLite.
pub fn fail_inserts_under(conn: &Connection, folder_fragment: &str) {
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_{name} BEFORE INSERT ON images
         WHEN NEW.path LIKE '%/{name}/%'
         BEGIN SELECT RAISE(ABORT, 'simulated write failure'); END;",
        name = folder_fragment
    ))
    .unwrap();
}
