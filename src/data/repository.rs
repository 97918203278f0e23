use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::acquisition::PlateAcquisition;
use crate::models::image::{ImageFile, ImageMeta};

static BARCODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(P015\d{3})(-|$)").expect("valid barcode pattern"));

/// Acquisitions imaged from this date on use the second channel map.
const CHANNEL_MAP_V2_FROM: (i32, u32, u32) = (2020, 9, 1);

/// Extracts the `P015ddd` barcode from an acquisition name, falling back to the
/// name itself.
pub fn plate_barcode_from_name(acquisition_name: &str) -> String {
    BARCODE_PATTERN
        .captures(acquisition_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| acquisition_name.to_string())
}

pub fn channel_map_id_for(imaged: NaiveDate) -> i64 {
    let (year, month, day) = CHANNEL_MAP_V2_FROM;
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(switch) if imaged >= switch => 2,
        _ => 1,
    }
}

pub fn image_exists(conn: &Connection, path: &str) -> Result<bool, AppError> {
    let exists = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM images WHERE path = ?1)",
        params![path],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn insert_image(conn: &Connection, image: &ImageFile) -> Result<i64, AppError> {
    let file_meta_json = serde_json::to_string(&image.file_meta)?;
    let metadata_json = serde_json::to_string(&image.metadata)?;

    conn.execute(
        "INSERT INTO images (project, plate_acquisition_id, plate_barcode, plate_acquisition_name, timepoint, well, site, channel, path, file_meta, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            image.project,
            image.plate_acquisition_id,
            image.plate_barcode,
            image.plate_acquisition_name,
            image.timepoint,
            image.well,
            image.site,
            image.channel,
            image.path,
            file_meta_json,
            metadata_json,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn select_acquisition_id(conn: &Connection, folder: &str) -> Result<Option<i64>, AppError> {
    let id = conn
        .query_row(
            "SELECT id FROM plate_acquisition WHERE folder = ?1",
            params![folder],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Creates an unfinished acquisition for the image's folder and queues it in
/// `new_plate_acquisition`, both in one transaction.
pub fn insert_acquisition(conn: &Connection, meta: &ImageMeta) -> Result<i64, AppError> {
    let folder = meta.folder();
    let imaged = meta.imaged.and_hms_opt(0, 0, 0).unwrap_or_default();
    let channel_map_id = channel_map_id_for(meta.imaged);

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO plate_acquisition (plate_barcode, name, project, imaged, microscope, channel_map_id, timepoint, folder)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            plate_barcode_from_name(&meta.plate),
            meta.plate,
            meta.project,
            imaged,
            meta.microscope,
            channel_map_id,
            meta.timepoint,
            folder,
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.execute(
        "INSERT INTO new_plate_acquisition (id, folder) VALUES (?1, ?2)",
        params![id, folder],
    )?;
    tx.commit()?;
    Ok(id)
}

pub fn select_or_insert_acquisition(conn: &Connection, meta: &ImageMeta) -> Result<i64, AppError> {
    match select_acquisition_id(conn, &meta.folder())? {
        Some(id) => Ok(id),
        None => insert_acquisition(conn, meta),
    }
}

pub fn finished_acquisition_folders(conn: &Connection) -> Result<HashSet<String>, AppError> {
    let mut stmt =
        conn.prepare("SELECT folder FROM plate_acquisition WHERE finished IS NOT NULL")?;
    let folders = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(folders)
}

pub fn unfinished_acquisition_folders(conn: &Connection) -> Result<Vec<String>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT folder FROM plate_acquisition WHERE finished IS NULL ORDER BY folder",
    )?;
    let folders = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(folders)
}

/// Moves an acquisition to Finished. Anything but exactly one updated row means
/// the folder key is not unique or the row changed underneath us.
pub fn mark_acquisition_finished(
    conn: &Connection,
    folder: &str,
    finished_at: DateTime<Utc>,
) -> Result<(), AppError> {
    let rows = conn.execute(
        "UPDATE plate_acquisition SET finished = ?1 WHERE folder = ?2 AND finished IS NULL",
        params![finished_at, folder],
    )?;
    if rows != 1 {
        return Err(AppError::Consistency {
            folder: folder.to_string(),
            rows,
        });
    }
    Ok(())
}

pub fn get_acquisition(
    conn: &Connection,
    folder: &str,
) -> Result<Option<PlateAcquisition>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, folder, name, plate_barcode, project, imaged, microscope, channel_map_id, timepoint, finished
         FROM plate_acquisition WHERE folder = ?1",
    )?;

    let acquisition = stmt
        .query_row(params![folder], |row| {
            Ok(PlateAcquisition {
                id: row.get(0)?,
                folder: row.get(1)?,
                name: row.get(2)?,
                plate_barcode: row.get(3)?,
                project: row.get(4)?,
                imaged: row.get(5)?,
                microscope: row.get(6)?,
                channel_map_id: row.get(7)?,
                timepoint: row.get(8)?,
                finished: row.get(9)?,
            })
        })
        .optional()?;

    Ok(acquisition)
}

pub fn count_images(conn: &Connection) -> Result<i64, AppError> {
    let count = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_acquisitions(conn: &Connection) -> Result<i64, AppError> {
    let count = conn.query_row("SELECT COUNT(*) FROM plate_acquisition", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

// Needed for rusqlite optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
