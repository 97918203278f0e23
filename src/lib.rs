pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

use config::MonitorConfig;
use error::AppError;
use services::filename_parser::ExternalDatasetParser;
use services::poll_service::{PollScheduler, PollSettings};
use services::thumbnail_service::ImageToolsExtractor;
use state::MonitorState;

/// Opens the database and polls the configured roots until a fatal error or,
/// in single-pass mode, until one cycle is done.
pub fn run(config: &MonitorConfig) -> Result<(), AppError> {
    config.validate()?;
    if config.exhaustive_initial_poll {
        tracing::debug!("exhaustive_initial_poll is set but has no effect");
    }

    let conn = data::open_database(&config.database_path)?;
    tracing::info!("database: {}", config.database_path.display());

    let mut scheduler = PollScheduler::new(
        PollSettings::from(config),
        Box::new(ExternalDatasetParser::new()),
        Box::new(ImageToolsExtractor),
        MonitorState::new(&config.log_dir),
    );
    scheduler.run(&conn)
}
