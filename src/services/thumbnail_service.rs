use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageReader;

use crate::error::AppError;

/// Longest edge of generated thumbnails, in pixels.
const THUMBNAIL_SIZE: u32 = 200;

/// Reads technical tags and renders thumbnails. Both may fail independently of
/// the image record being stored.
pub trait TagExtractor {
    fn extract_tags(&self, path: &Path) -> Result<serde_json::Value, AppError>;
    fn make_thumbnail(&self, src: &Path, dest: &Path) -> Result<(), AppError>;
}

/// Extractor backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageToolsExtractor;

impl TagExtractor for ImageToolsExtractor {
    fn extract_tags(&self, path: &Path) -> Result<serde_json::Value, AppError> {
        let file_size = fs::metadata(path)?.len();
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format().map(|f| format!("{f:?}"));
        let img = reader.decode()?;

        Ok(serde_json::json!({
            "width": img.width(),
            "height": img.height(),
            "color_type": format!("{:?}", img.color()),
            "format": format,
            "file_size": file_size,
        }))
    }

    fn make_thumbnail(&self, src: &Path, dest: &Path) -> Result<(), AppError> {
        let img = ImageReader::open(src)?.with_guessed_format()?.decode()?;
        let thumbnail = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        thumbnail.save_with_format(dest, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Mirrors the absolute image path below the thumbnail root.
pub fn thumbnail_path_for(thumbnail_dir: &Path, image_path: &Path) -> PathBuf {
    let relative = image_path
        .to_string_lossy()
        .trim_start_matches('/')
        .to_string();
    thumbnail_dir.join(relative)
}
