use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_STALE_MARGIN_DAYS: i64 = 90;
const DEFAULT_IDLE_MARGIN_SECS: i64 = 600;
// `now - margin` must stay inside chrono's date range
const MAX_STALE_MARGIN_DAYS: i64 = 36_500;
const MAX_IDLE_MARGIN_SECS: i64 = MAX_STALE_MARGIN_DAYS * 86_400;

fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("se", "pharmbio", "imagedb-monitor")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub root_dirs: Vec<PathBuf>,
    pub database_path: PathBuf,
    /// Holds the fault log and the blacklist snapshot.
    pub log_dir: PathBuf,
    pub thumbnail_dir: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub stale_margin_days: i64,
    pub idle_margin_secs: i64,
    pub continuous_polling: bool,
    /// Accepted for older config files; polling ignores it.
    pub exhaustive_initial_poll: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            root_dirs: Vec::new(),
            database_path: data.join("imagedb.sqlite"),
            log_dir: data.join("logs"),
            thumbnail_dir: Some(data.join("thumbs")),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            stale_margin_days: DEFAULT_STALE_MARGIN_DAYS,
            idle_margin_secs: DEFAULT_IDLE_MARGIN_SECS,
            continuous_polling: true,
            exhaustive_initial_poll: false,
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.root_dirs.is_empty() {
            return Err(AppError::Config("no root directories configured".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(AppError::Config("poll interval must be positive".to_string()));
        }
        if self.idle_margin_secs <= 0 {
            return Err(AppError::Config("idle margin must be positive".to_string()));
        }
        if self.idle_margin_secs > MAX_IDLE_MARGIN_SECS {
            return Err(AppError::Config(format!(
                "idle margin cannot exceed {MAX_IDLE_MARGIN_SECS} seconds"
            )));
        }
        if self.stale_margin_days < 0 {
            return Err(AppError::Config("stale margin cannot be negative".to_string()));
        }
        if self.stale_margin_days > MAX_STALE_MARGIN_DAYS {
            return Err(AppError::Config(format!(
                "stale margin cannot exceed {MAX_STALE_MARGIN_DAYS} days"
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stale_margin(&self) -> chrono::Duration {
        chrono::Duration::days(self.stale_margin_days)
    }

    pub fn idle_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_margin_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.stale_margin_days, 90);
        assert_eq!(config.idle_margin_secs, 600);
        assert!(config.continuous_polling);
        assert!(!config.exhaustive_initial_poll);
        assert!(config.database_path.ends_with("imagedb.sqlite"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MonitorConfig::from_toml(
            r#"
            root_dirs = ["/share/data/external-datasets"]
            poll_interval_secs = 60
            continuous_polling = false
            exhaustive_initial_poll = true
            "#,
        )
        .unwrap();

        assert_eq!(config.root_dirs, vec![PathBuf::from("/share/data/external-datasets")]);
        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(60));
        assert!(!config.continuous_polling);
        assert_eq!(config.idle_margin(), chrono::Duration::seconds(600));
        assert_eq!(config.stale_margin(), chrono::Duration::days(90));
        config.validate().unwrap();
    }

    #[test]
    fn test_validation() {
        let config = MonitorConfig::default();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = MonitorConfig {
            root_dirs: vec![PathBuf::from("/data")],
            poll_interval_secs: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = MonitorConfig {
            root_dirs: vec![PathBuf::from("/data")],
            idle_margin_secs: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_margins_are_rejected() {
        let config = MonitorConfig::from_toml(
            "root_dirs = [\"/data\"]\nstale_margin_days = 1000000000000\n",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = MonitorConfig {
            root_dirs: vec![PathBuf::from("/data")],
            idle_margin_secs: i64::MAX,
            ..MonitorConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = MonitorConfig {
            root_dirs: vec![PathBuf::from("/data")],
            stale_margin_days: 36_500,
            idle_margin_secs: 36_500 * 86_400,
            ..MonitorConfig::default()
        };
        config.validate().unwrap();
        let _ = chrono::Utc::now() - config.stale_margin() - config.idle_margin();
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = MonitorConfig::from_toml("root_dirs = 5").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "root_dirs = [\"/a\", \"/b\"]\nidle_margin_secs = 30\n").unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.root_dirs.len(), 2);
        assert_eq!(config.idle_margin_secs, 30);
        assert!(MonitorConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
