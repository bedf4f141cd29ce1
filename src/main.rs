//! Command line entry point: load a model document, report what was
//! loaded, and optionally write it back out.
//!
//! Settings come from `modelkit.toml` next to the binary, overridable
//! through `MODELKIT_*` environment variables:
//!
//! ```toml
//! input = "model.xml"        # document to load (required)
//! output = "model_out.xml"   # save the model here after loading
//! database = "model.db"     # back the store with this file; in memory if unset
//! sanitize = true            # strip illegal characters before parsing
//! ```

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

use modelkit::document::{self, LoadOptions};
use modelkit::error::{ModelkitError, Result};
use modelkit::facade::ModelDict;
use modelkit::store::PersistenceMode;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Config::builder()
        .add_source(config::File::with_name("modelkit").required(false))
        .add_source(config::Environment::with_prefix("MODELKIT"))
        .build()
        .map_err(|e| ModelkitError::Config(e.to_string()))?;

    let input = settings
        .get_string("input")
        .map_err(|_| ModelkitError::Config(String::from("no input document configured")))?;
    let mode = match settings.get_string("database") {
        Ok(path) => PersistenceMode::File(path),
        Err(_) => PersistenceMode::InMemory,
    };
    let options = LoadOptions {
        sanitize: settings.get_bool("sanitize").unwrap_or(false),
    };

    info!(%input, "loading model");
    let (store, report) = document::load_path(&input, mode, options)?;
    let dict = ModelDict::new(store)?;
    info!(
        rows = report.rows,
        elapsed_ms = report.elapsed.as_millis() as u64,
        classes = dict.classes()?.len(),
        "model ready"
    );

    if let Ok(output) = settings.get_string("output") {
        dict.save(&output)?;
        info!(%output, "model saved");
    }
    Ok(())
}
