use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use super::Backend;
use crate::db::{fetch_items, open_database, replace_items};
use crate::models::Record;

/// SQLite-backed storage. Unlike the JSON file, rows keep their record ids
/// between sessions.
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_database(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }
}

impl Backend for SqliteBackend {
    fn load_all(&self) -> Result<Vec<Record>> {
        let records = fetch_items(&self.conn)?;
        info!(path = %self.path.display(), count = records.len(), "loaded cellar database");
        Ok(records)
    }

    fn save_all(&self, records: &[Record]) -> Result<()> {
        replace_items(&self.conn, records)?;
        info!(path = %self.path.display(), count = records.len(), "saved cellar database");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
