//! Ratatui front-end: an inventory table with statistics and pairing panels,
//! plus modal dialogs for adding, editing, removing and inspecting records.

mod app;
mod forms;
mod helpers;
mod terminal;

pub use app::App;
pub use terminal::run_app;
