//! `packwire inspect`: print the assembled build config.

use miette::{IntoDiagnostic, Result};
use packwire_core::{
    base_config, build_dev_config, build_prod_config, BuildConfig, Environment, Mode,
    ProjectConfig,
};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InspectMode {
    Dev,
    Prod,
}

pub fn run(cwd: &Path, config: Option<&Path>, mode: InspectMode) -> Result<()> {
    let config = ProjectConfig::load(cwd, config).into_diagnostic()?;
    let env = Environment::from_process(&config).into_diagnostic()?;
    let build = assemble(&config, env, mode);
    println!("{}", serde_json::to_string_pretty(&build).into_diagnostic()?);
    Ok(())
}

fn assemble(config: &ProjectConfig, env: Environment, mode: InspectMode) -> BuildConfig {
    match mode {
        InspectMode::Dev => {
            build_dev_config(base_config(config, Mode::Development), config, &env)
        }
        InspectMode::Prod => {
            let env = env.with_node_env(Mode::Production.as_str());
            build_prod_config(base_config(config, Mode::Production), config, &env)
        }
    }
}
