use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS plate_acquisition (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plate_barcode TEXT NOT NULL,
    name TEXT NOT NULL,
    project TEXT NOT NULL,
    imaged TEXT,
    microscope TEXT,
    channel_map_id INTEGER,
    timepoint TEXT,
    folder TEXT UNIQUE NOT NULL,
    finished TEXT
);

CREATE INDEX IF NOT EXISTS idx_plate_acquisition_finished ON plate_acquisition(finished);

CREATE TABLE IF NOT EXISTS new_plate_acquisition (
    id INTEGER PRIMARY KEY REFERENCES plate_acquisition(id),
    folder TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    plate_acquisition_id INTEGER NOT NULL REFERENCES plate_acquisition(id),
    plate_barcode TEXT NOT NULL,
    plate_acquisition_name TEXT NOT NULL,
    timepoint TEXT,
    well TEXT,
    site TEXT,
    channel TEXT,
    path TEXT UNIQUE NOT NULL,
    file_meta TEXT,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_images_acquisition ON images(plate_acquisition_id);
CREATE INDEX IF NOT EXISTS idx_images_barcode ON images(plate_barcode);
";

pub fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.execute_batch(SCHEMA_V1)?;
    Ok(())
}
