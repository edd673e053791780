pub mod build;
pub mod dev;
pub mod inspect;
pub mod version;

use miette::{miette, Result};
use packwire_core::{ProcessEngine, ProjectConfig};

/// The bundler engine configured under `engine` in `packwire.json`.
pub(crate) fn engine_for(config: &ProjectConfig) -> Result<ProcessEngine> {
    let settings = config
        .engine
        .as_ref()
        .filter(|e| !e.program.is_empty())
        .ok_or_else(|| {
            miette!(
                help = "add {\"engine\": {\"program\": \"...\", \"args\": [...]}} to packwire.json",
                "no bundler engine configured"
            )
        })?;
    Ok(ProcessEngine::new(
        settings.program.clone(),
        settings.args.clone(),
    ))
}
