use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionStatus {
    Unfinished,
    Finished,
}

/// One imaging run, keyed by its storage folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateAcquisition {
    pub id: i64,
    pub folder: String,
    pub name: String,
    pub plate_barcode: String,
    pub project: String,
    pub imaged: NaiveDateTime,
    pub microscope: String,
    pub channel_map_id: i64,
    pub timepoint: String,
    pub finished: Option<DateTime<Utc>>,
}

impl PlateAcquisition {
    pub fn status(&self) -> AcquisitionStatus {
        match self.finished {
            Some(_) => AcquisitionStatus::Finished,
            None => AcquisitionStatus::Unfinished,
        }
    }
}
