//! Build configuration assembly.
//!
//! ```text
//! ProjectConfig + Environment
//!   → base_config()                      shared entry/output/resolve/rules
//!   → build_dev_config() / build_prod_config()   ConfigOverlay applied on top
//!   → BuildConfig                        handed to the bundler engine
//! ```

pub mod base;
pub mod build_config;
pub mod dev;
pub mod plugins;
pub mod prod;

pub use base::base_config;
pub use build_config::{
    BuildConfig, ChunkSelection, ConfigOverlay, Devtool, FileRule, OutputConfig, OutputOverlay,
    SplitChunks, TestPattern,
};
pub use dev::{build_dev_config, HOT_CLIENT_ENTRY};
pub use plugins::{
    ChunksSortMode, CompressionAlgorithm, CompressionOptions, HtmlMinify, HtmlOptions, Plugin,
    PluginLookup, PluginSet,
};
pub use prod::build_prod_config;
