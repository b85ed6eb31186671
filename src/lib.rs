//! Wine cellar inventory manager.
//!
//! [`cellar::Cellar`] owns the records and enforces capacity and naming rules.
//! Storage backends in [`storage`] read and write the whole inventory, either
//! as the legacy JSON document handled by [`codec`] or as an SQLite table.
//! The [`ui`] module is a terminal front-end that observes the cellar and
//! persists after every change.
pub mod cellar;
pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod storage;
pub mod ui;

pub use cellar::{Cellar, CellarError, CellarEvent, CellarObserver, PairingSuggestion};
pub use config::{data_dir, Config};
pub use models::{ItemKind, Record, RecordId, WineDetails};
pub use storage::{open_backend, Backend};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
