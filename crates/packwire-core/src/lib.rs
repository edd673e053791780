#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod css;
pub mod dev;
pub mod emit;
pub mod engine;
pub mod env;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod style;
pub mod version;

pub use config::{ProjectConfig, CONFIG_FILE};
pub use dev::{DevServer, DevServerOptions, ServerState};
pub use emit::{finalize, load_template, AssetSet};
pub use engine::{BundlerEngine, Chunk, Compilation, EmittedAsset, ProcessEngine};
pub use env::{Environment, Mode};
pub use error::{Error, Result};
pub use pipeline::{base_config, build_dev_config, build_prod_config, BuildConfig};
pub use style::{generate_file_rules, generate_rule_set, StyleLanguage, StyleOptions};
pub use version::VERSION;
