use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Open (creating if needed) the SQLite file at `path` and run lazy
/// migrations. The parent directory is created first so a fresh data directory
/// works on the first launch.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create the `items` table when missing. Denomination stays unique so the
/// table mirrors the cellar's own invariant, while the surrogate id is the
/// primary key. Wine-only columns are left NULL for other item kinds.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            denomination TEXT NOT NULL UNIQUE,
            description TEXT,
            quantite INTEGER NOT NULL,
            anneeProduction INTEGER NOT NULL,
            dateAjout TEXT NOT NULL,
            prix REAL NOT NULL,
            dlc TEXT,
            image TEXT,
            position TEXT,
            phaseVieillissement TEXT,
            note REAL NOT NULL DEFAULT 0,
            cepage TEXT,
            region TEXT
        )",
        [],
    )
    .context("failed to create items table")?;

    Ok(())
}
