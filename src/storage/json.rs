use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::Backend;
use crate::codec;
use crate::models::Record;

/// Flat-file backend writing the legacy JSON document.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Backend for JsonFileBackend {
    /// A missing or unreadable file is an empty cellar, not an error.
    fn load_all(&self) -> Result<Vec<Record>> {
        let document = match fs::read_to_string(&self.path) {
            Ok(document) => document,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no cellar file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cellar file unreadable, starting empty");
                return Ok(Vec::new());
            }
        };

        let records = codec::decode(&document);
        info!(path = %self.path.display(), count = records.len(), "loaded cellar file");
        Ok(records)
    }

    /// Write to a sibling temp file, then rename over the target so a crash
    /// mid-write never leaves a truncated document behind.
    fn save_all(&self, records: &[Record]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }

        let document = codec::encode(records).context("failed to encode cellar")?;
        let temp = self.temp_path();
        fs::write(&temp, document)
            .with_context(|| format!("failed to write {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        info!(path = %self.path.display(), count = records.len(), "saved cellar file");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
