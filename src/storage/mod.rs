//! Persistence backends. Both flavours load the full record list at start and
//! rewrite it wholesale on save; the cellar never talks to storage directly.

mod json;
mod sqlite;

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::config::{BackendKind, Config};
use crate::models::Record;

pub use json::JsonFileBackend;
pub use sqlite::SqliteBackend;

/// Load/save contract every persistence backend honours.
pub trait Backend {
    /// Read every stored record. Unreadable individual records are skipped.
    fn load_all(&self) -> Result<Vec<Record>>;
    /// Replace the stored contents with `records`.
    fn save_all(&self, records: &[Record]) -> Result<()>;
    /// Short label for status messages, e.g. the file in use.
    fn describe(&self) -> String;
}

/// Build the backend the configuration asks for.
pub fn open_backend(config: &Config, data_dir: &Path) -> Result<Box<dyn Backend>> {
    let path = config.data_file(data_dir);
    info!(backend = ?config.storage.backend, path = %path.display(), "opening storage");
    let backend: Box<dyn Backend> = match config.storage.backend {
        BackendKind::Json => Box::new(JsonFileBackend::new(path)),
        BackendKind::Sqlite => Box::new(SqliteBackend::open(&path)?),
    };
    Ok(backend)
}
