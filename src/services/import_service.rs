use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::models::image::{ImageFile, ImageMeta, ParsedFilename};
use crate::services::filename_parser::FilenameParser;
use crate::services::ledger::ProcessedLedger;
use crate::services::scanner::{is_hidden, is_image_file};
use crate::services::thumbnail_service::{thumbnail_path_for, TagExtractor};

const PROGRESS_EVERY: usize = 100;

/// Collaborators used while importing one directory.
pub struct ImportContext<'a> {
    pub parser: &'a dyn FilenameParser,
    pub extractor: &'a dyn TagExtractor,
    pub thumbnail_dir: Option<&'a Path>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryImport {
    pub examined: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub unparseable: usize,
    pub thumbnails: usize,
}

/// Visible image files directly inside `dir`, sorted by path.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if is_image_file(&path) && !is_hidden(&path) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Imports every new image in `dir`. Files already in the ledger are not
/// looked at; everything examined and not skipped is recorded at `now`.
pub fn import_directory(
    conn: &Connection,
    ctx: &ImportContext<'_>,
    ledger: &mut ProcessedLedger,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<DirectoryImport, AppError> {
    tracing::debug!("importing {}", dir.display());

    let new_files: Vec<PathBuf> = list_image_files(dir)?
        .into_iter()
        .filter(|p| !ledger.contains(&p.to_string_lossy()))
        .collect();

    let mut summary = DirectoryImport::default();
    let total = new_files.len();

    for (idx, path) in new_files.iter().enumerate() {
        summary.examined += 1;

        let meta = match ctx.parser.parse(path) {
            ParsedFilename::Image(meta) => meta,
            ParsedFilename::Unparseable => {
                summary.unparseable += 1;
                continue;
            }
        };
        if meta.is_thumbnail {
            summary.thumbnails += 1;
            continue;
        }

        if repository::image_exists(conn, &meta.path)? {
            tracing::debug!("already in database: {}", meta.path);
            summary.already_present += 1;
        } else {
            add_image(conn, ctx, &meta)?;
            summary.inserted += 1;
        }

        ledger.record(&path.to_string_lossy(), now);

        if (idx + 1) % PROGRESS_EVERY == 0 {
            tracing::info!("{}: {}/{} images processed", dir.display(), idx + 1, total);
        }
    }

    if summary.inserted > 0 {
        tracing::info!(
            "{}: inserted {} images ({} already present)",
            dir.display(),
            summary.inserted,
            summary.already_present
        );
    }
    Ok(summary)
}

/// Stores one image, creating its acquisition on first sight. Tag and
/// thumbnail failures are logged and never block the insert.
fn add_image(
    conn: &Connection,
    ctx: &ImportContext<'_>,
    meta: &ImageMeta,
) -> Result<i64, AppError> {
    let path = Path::new(&meta.path);

    let file_meta = match ctx.extractor.extract_tags(path) {
        Ok(tags) => tags,
        Err(e) => {
            tracing::warn!("could not read tags of {}: {e}", meta.path);
            serde_json::Value::Null
        }
    };

    let acquisition_id = repository::select_or_insert_acquisition(conn, meta)?;
    let record = ImageFile {
        path: meta.path.clone(),
        plate_acquisition_id: acquisition_id,
        project: meta.project.clone(),
        plate_barcode: repository::plate_barcode_from_name(&meta.plate),
        plate_acquisition_name: meta.plate.clone(),
        timepoint: meta.timepoint.clone(),
        well: meta.well.clone(),
        site: meta.site.clone(),
        channel: meta.channel.clone(),
        file_meta,
        metadata: serde_json::to_value(meta)?,
    };
    let id = repository::insert_image(conn, &record)?;

    if let Some(thumbnail_dir) = ctx.thumbnail_dir {
        let dest = thumbnail_path_for(thumbnail_dir, path);
        if !dest.exists() {
            if let Err(e) = ctx.extractor.make_thumbnail(path, &dest) {
                tracing::warn!("could not make thumbnail {}: {e}", dest.display());
            }
        }
    }

    Ok(id)
}
