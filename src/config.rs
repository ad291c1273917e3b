//! Configuration
//!
//! Resolves where the dataset files live and how datasets cache filters.
//! Sources, lowest precedence first: built-in defaults, a TOML file, then
//! environment variables. The library itself never reads the environment;
//! binaries resolve a [`Settings`] once and pass plain values down.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::filter::DEFAULT_CACHE_CAPACITY;

pub const DATA_PATH_ENV: &str = "MELBVIZ_DATA_PATH";
pub const CONFIG_PATH_ENV: &str = "MELBVIZ_CONFIG";

pub const COUNTS_CSV_NAME: &str = "Pedestrian_Counting_System_-_Monthly__counts_per_hour_.csv";
pub const SENSOR_CSV_NAME: &str = "Pedestrian_Counting_System_-_Sensor_Locations.csv";
pub const SNAPSHOT_NAME: &str = "melbviz.parquet";
pub const CONFIG_NAME: &str = "melbviz.toml";

/// Resolved settings for the binaries.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Overrides `<data_dir>/<COUNTS_CSV_NAME>`.
    pub counts_csv: Option<PathBuf>,

    /// Overrides `<data_dir>/<SENSOR_CSV_NAME>`.
    pub sensor_csv: Option<PathBuf>,

    /// Overrides `<data_dir>/<SNAPSHOT_NAME>`.
    pub snapshot: Option<PathBuf>,

    #[serde(default)]
    pub dataset: DatasetOptions,
}

/// How a dataset memoizes filter results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DatasetOptions {
    #[serde(default = "default_cache")]
    pub cache: bool,

    /// Maximum memoized results; `0` means unbounded.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("melbviz_data"))
        .unwrap_or_else(|| PathBuf::from("./melbviz_data"))
}

fn default_cache() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            cache: default_cache(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            counts_csv: None,
            sensor_csv: None,
            snapshot: None,
            dataset: DatasetOptions::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Defaults with environment overrides only.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    /// Look for a config file (`MELBVIZ_CONFIG`, else `<data_dir>/melbviz.toml`),
    /// falling back to environment-only settings.
    pub fn load_default() -> Self {
        let env_only = Self::from_env();
        let config_path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| env_only.data_dir.join(CONFIG_NAME));

        if !config_path.exists() {
            log::info!("Using default settings with environment overrides");
            return env_only;
        }

        match Self::load(&config_path) {
            Ok(mut settings) => {
                settings.apply_overrides(|key| std::env::var(key).ok());
                log::info!("Loaded settings from {}", config_path.display());
                settings
            }
            Err(e) => {
                log::warn!("{e}; using defaults");
                env_only
            }
        }
    }

    /// Apply `MELBVIZ_DATA_PATH` from `lookup` on top of the current values.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(DATA_PATH_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn counts_csv_path(&self) -> PathBuf {
        self.counts_csv
            .clone()
            .unwrap_or_else(|| self.data_dir.join(COUNTS_CSV_NAME))
    }

    pub fn sensor_csv_path(&self) -> PathBuf {
        self.sensor_csv
            .clone()
            .unwrap_or_else(|| self.data_dir.join(SENSOR_CSV_NAME))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot
            .clone()
            .unwrap_or_else(|| self.data_dir.join(SNAPSHOT_NAME))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_paths_live_in_data_dir() {
        let settings = Settings {
            data_dir: PathBuf::from("/data"),
            ..Settings::default()
        };
        assert_eq!(settings.snapshot_path(), PathBuf::from("/data/melbviz.parquet"));
        assert_eq!(settings.counts_csv_path(), Path::new("/data").join(COUNTS_CSV_NAME));
        assert!(settings.dataset.cache);
        assert_eq!(settings.dataset.cache_capacity, 128);
    }

    #[test]
    fn test_load_toml_overrides() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            "data_dir = \"/srv/melbviz\"\nsnapshot = \"/tmp/small.parquet\"\n\n[dataset]\ncache = false\n"
        )
        .unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/melbviz"));
        assert_eq!(settings.snapshot_path(), PathBuf::from("/tmp/small.parquet"));
        assert_eq!(
            settings.sensor_csv_path(),
            PathBuf::from("/srv/melbviz").join(SENSOR_CSV_NAME)
        );
        assert!(!settings.dataset.cache);
        assert_eq!(settings.dataset.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_env_override_data_dir() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| (key == DATA_PATH_ENV).then(|| "/env/data".to_string()));
        assert_eq!(settings.data_dir, PathBuf::from("/env/data"));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "data_dir = [").unwrap();
        assert!(matches!(Settings::load(tmp.path()), Err(ConfigError::Parse { .. })));
    }
}
