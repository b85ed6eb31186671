//! Binary entry point: resolve the data directory, read configuration, start
//! logging, load the inventory, then hand over to the terminal UI.
use tracing::{info, warn};
use wine_cellar_manager::{data_dir, logging, open_backend, run_app, App, Cellar, Config};

fn main() -> anyhow::Result<()> {
    let data_dir = data_dir()?;
    let config = Config::load(&data_dir)?;
    let log_path = logging::init(&data_dir)?;
    info!(data_dir = %data_dir.display(), log = %log_path.display(), "starting wine cellar manager");

    let backend = open_backend(&config, &data_dir)?;
    let mut cellar = Cellar::new(config.capacity);
    cellar.set_conditions(config.temperature, config.humidity);

    let skipped = cellar.hydrate(backend.load_all()?);
    if skipped > 0 {
        warn!(skipped, "some stored records did not fit the cellar");
    }

    let mut app = App::new(cellar, backend);
    let result = run_app(&mut app);
    if let Err(err) = &result {
        tracing::error!(error = %err, "terminal session failed");
    }
    info!("goodbye");
    result
}
