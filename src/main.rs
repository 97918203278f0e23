//! imagedb-monitor
//!
//! Polls the image roots, ingests new plate acquisition images and marks
//! acquisitions finished once they go idle.
//!
//! Usage:
//!     imagedb-monitor --config monitor.toml
//!     imagedb-monitor --root-dir /share/data/external-datasets --single-pass

use std::path::PathBuf;

use clap::Parser;
use imagedb_monitor::config::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "imagedb_monitor=info";

#[derive(Parser, Debug)]
#[command(name = "imagedb-monitor", about = "Ingest plate acquisition images into the image database")]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory to poll (repeatable)
    #[arg(long = "root-dir")]
    root_dirs: Vec<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory for the fault log and blacklist snapshot
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Directory for generated thumbnails
    #[arg(long)]
    thumbnail_dir: Option<PathBuf>,

    /// Seconds to sleep between polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Directories untouched for more days than this are not polled
    #[arg(long)]
    stale_margin_days: Option<i64>,

    /// Seconds without new files before an acquisition counts as finished
    #[arg(long)]
    idle_margin_secs: Option<i64>,

    /// Keep polling until stopped
    #[arg(long, conflicts_with = "single_pass")]
    continuous: bool,

    /// Run one polling cycle and exit
    #[arg(long)]
    single_pass: bool,

    /// Legacy flag, accepted and ignored
    #[arg(long)]
    exhaustive_initial_poll: bool,

    /// Log filter, e.g. `imagedb_monitor=debug` (defaults to RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load(path)?,
            None => MonitorConfig::default(),
        };

        if !self.root_dirs.is_empty() {
            config.root_dirs = self.root_dirs;
        }
        if let Some(database) = self.database {
            config.database_path = database;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = log_dir;
        }
        if let Some(thumbnail_dir) = self.thumbnail_dir {
            config.thumbnail_dir = Some(thumbnail_dir);
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(days) = self.stale_margin_days {
            config.stale_margin_days = days;
        }
        if let Some(secs) = self.idle_margin_secs {
            config.idle_margin_secs = secs;
        }
        if self.continuous {
            config.continuous_polling = true;
        }
        if self.single_pass {
            config.continuous_polling = false;
        }
        if self.exhaustive_initial_poll {
            config.exhaustive_initial_poll = true;
        }
        Ok(config)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let config = args.into_config()?;
    tracing::info!("Starting imagedb-monitor");
    tracing::info!("  Roots: {:?}", config.root_dirs);
    tracing::info!("  Continuous: {}", config.continuous_polling);

    if let Err(e) = imagedb_monitor::run(&config) {
        if e.is_fatal() {
            tracing::error!("database inconsistent, stopping: {e}");
        } else {
            tracing::error!("monitor stopped: {e}");
        }
        return Err(e.into());
    }
    Ok(())
}
