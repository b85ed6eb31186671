//! Runtime configuration. Everything has a sensible default so a first launch
//! works without a config file; `config.toml` in the data directory overrides
//! whatever it names.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".wine-cellar-manager";
/// Environment variable that relocates the data directory (handy for tests and
/// for keeping several cellars apart).
const DATA_DIR_ENV: &str = "WINE_CELLAR_HOME";
/// Optional configuration file inside the data directory.
const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_CAPACITY: usize = 20;
const DEFAULT_TEMPERATURE: f64 = 12.0;
const DEFAULT_HUMIDITY: f64 = 70.0;

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Json,
    Sqlite,
}

impl BackendKind {
    fn default_file_name(self) -> &'static str {
        match self {
            BackendKind::Json => "cellar.json",
            BackendKind::Sqlite => "cellar.sqlite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Data file location; relative paths resolve against the data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of records the cellar accepts.
    pub capacity: usize,
    /// Storage temperature in °C, shown in the header.
    pub temperature: f64,
    /// Relative humidity in percent, shown in the header.
    pub humidity: f64,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            temperature: DEFAULT_TEMPERATURE,
            humidity: DEFAULT_HUMIDITY,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load `config.toml` from `data_dir`, falling back to defaults when the
    /// file does not exist.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse configuration text.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).context("failed to parse TOML")?;
        if config.capacity == 0 {
            return Err(anyhow!("capacity must be at least 1"));
        }
        Ok(config)
    }

    /// Absolute path of the backend's data file.
    pub fn data_file(&self, data_dir: &Path) -> PathBuf {
        match &self.storage.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => data_dir.join(self.storage.backend.default_file_name()),
        }
    }
}

/// Resolve the directory holding config, data and logs.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.capacity, 20);
        assert_eq!(config.storage.backend, BackendKind::Json);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::parse(
            r#"
            capacity = 150
            temperature = 13.5

            [storage]
            backend = "sqlite"
            path = "caves/main.sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.capacity, 150);
        assert_eq!(config.temperature, 13.5);
        assert_eq!(config.humidity, 70.0);
        assert_eq!(config.storage.backend, BackendKind::Sqlite);
        assert_eq!(
            config.data_file(Path::new("/data")),
            Path::new("/data/caves/main.sqlite")
        );
    }

    #[test]
    fn default_data_file_follows_backend() {
        let mut config = Config::default();
        assert_eq!(config.data_file(Path::new("/data")), Path::new("/data/cellar.json"));
        config.storage.backend = BackendKind::Sqlite;
        assert_eq!(config.data_file(Path::new("/data")), Path::new("/data/cellar.sqlite"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::parse("capacity = 0").is_err());
        assert!(Config::parse("capacity = \"lots\"").is_err());
        assert!(Config::parse("[storage]\nbackend = \"csv\"").is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());

        fs::write(dir.path().join(CONFIG_FILE_NAME), "humidity = 65.0").unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().humidity, 65.0);
    }
}
