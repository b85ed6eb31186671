//! Persistence helpers around the embedded SQLite database, split by concern.

mod connection;
mod items;

pub use connection::{ensure_schema, open_database};
pub use items::{fetch_items, insert_item, replace_items};
