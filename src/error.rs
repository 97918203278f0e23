#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(String),

    /// Finalizing an acquisition touched a row count other than one.
    #[error("Consistency violation: finishing {folder} updated {rows} rows, expected 1")]
    Consistency { folder: String, rows: usize },
}

impl AppError {
    /// Errors that mean the database no longer matches what the monitor
    /// believes about it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}
