use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Metadata a filename parser extracts from one image path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub path: String,
    pub filename: String,
    pub project: String,
    pub plate: String,
    pub well: String,
    pub site: String,
    pub channel: String,
    pub timepoint: String,
    pub extension: String,
    pub microscope: String,
    pub magnification: String,
    pub imaged: NaiveDate,
    pub channel_map_id: i64,
    pub guid: Option<String>,
    pub is_thumbnail: bool,
}

impl ImageMeta {
    /// Acquisition folder: the directory directly containing the image.
    pub fn folder(&self) -> String {
        Path::new(&self.path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFilename {
    Image(ImageMeta),
    Unparseable,
}

/// One row of the `images` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFile {
    pub path: String,
    pub plate_acquisition_id: i64,
    pub project: String,
    pub plate_barcode: String,
    pub plate_acquisition_name: String,
    pub timepoint: String,
    pub well: String,
    pub site: String,
    pub channel: String,
    pub file_meta: serde_json::Value,
    pub metadata: serde_json::Value,
}
