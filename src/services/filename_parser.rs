use std::path::{Component, Path};

use chrono::NaiveDate;
use regex::Regex;

use crate::models::image::{ImageMeta, ParsedFilename};

/// Turns an image path into structured metadata. Implementations must be pure.
pub trait FilenameParser {
    fn parse(&self, path: &Path) -> ParsedFilename;
}

const DATASET_ANCHOR: &str = "external-datasets";
const VALID_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg"];
const FILENAME_PATTERN: &str =
    r"^r(\d*)c(\d*)f(\d*)p(\d*)-ch(\d*)sk(\d*)fk(\d*)fl(\d*)\.(.+)$";

/// Parser for `external-datasets/<project>/<plate>/<folder>/r01c02f03p01-ch1sk1fk1fl1.tiff`.
pub struct ExternalDatasetParser {
    filename_regex: Regex,
}

impl ExternalDatasetParser {
    pub fn new() -> Self {
        Self {
            filename_regex: Regex::new(FILENAME_PATTERN).expect("valid filename pattern"),
        }
    }

    /// Project is everything between the anchor and the plate directory; the
    /// plate is the parent of the image folder.
    fn project_and_plate(path: &Path) -> Option<(String, String)> {
        let dirs: Vec<String> = path
            .parent()?
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();

        let anchor = dirs.iter().rposition(|d| d == DATASET_ANCHOR)?;
        let below = &dirs[anchor + 1..];
        // project.., plate, folder
        if below.len() < 3 {
            return None;
        }
        let plate = below[below.len() - 2].clone();
        let project = below[..below.len() - 2].join("/");
        Some((project, plate))
    }

    fn parse_meta(&self, path: &Path) -> Option<ImageMeta> {
        let (project, plate) = Self::project_and_plate(path)?;
        let filename = path.file_name()?.to_str()?;
        let caps = self.filename_regex.captures(filename)?;

        let extension = caps.get(9)?.as_str().to_string();
        let lower = extension.to_lowercase();
        if !VALID_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return None;
        }

        let row: u32 = caps.get(1)?.as_str().parse().ok()?;
        let row_letter = row.checked_add(64).and_then(char::from_u32)?;
        let well = format!("{row_letter}{}", caps.get(2)?.as_str());

        Some(ImageMeta {
            path: path.to_string_lossy().to_string(),
            filename: filename.to_string(),
            project,
            plate,
            well,
            site: caps.get(3)?.as_str().to_string(),
            channel: caps.get(5)?.as_str().to_string(),
            timepoint: caps.get(6)?.as_str().to_string(),
            extension,
            microscope: "Unknown".to_string(),
            magnification: "?x".to_string(),
            imaged: NaiveDate::from_ymd_opt(1970, 1, 1)?,
            channel_map_id: 1,
            guid: None,
            is_thumbnail: false,
        })
    }
}

impl Default for ExternalDatasetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FilenameParser for ExternalDatasetParser {
    fn parse(&self, path: &Path) -> ParsedFilename {
        match self.parse_meta(path) {
            Some(meta) => ParsedFilename::Image(meta),
            None => {
                tracing::debug!("could not parse {}", path.display());
                ParsedFilename::Unparseable
            }
        }
    }
}
