//! Plugin descriptors and the [`PluginSet`] builder.
//!
//! Plugins are plain data. The bundler engine receives them in the serialized
//! config; the ones that act on emitted assets (HTML injection, CSS
//! extraction/optimization, compression, static copy, bundle report) are
//! carried out by [`crate::emit`].

use super::build_config::TestPattern;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// HTML minification switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlMinify {
    pub remove_comments: bool,
    pub collapse_whitespace: bool,
    pub remove_attribute_quotes: bool,
}

/// Order of injected chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunksSortMode {
    /// Chunk id order.
    #[default]
    Auto,
    /// Dependencies before dependents (vendor before app).
    Dependency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlOptions {
    /// Output document, relative to the output root.
    pub filename: String,
    pub template: PathBuf,
    /// Inject `<script>`/`<link>` tags.
    pub inject: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<HtmlMinify>,
    pub chunks_sort_mode: ChunksSortMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    Gzip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOptions {
    /// Sidecar name template (`[path].gz[query]`).
    pub asset: String,
    pub algorithm: CompressionAlgorithm,
    /// Assets considered for compression.
    pub test: TestPattern,
    /// Only assets strictly larger than this many bytes.
    pub threshold: u64,
    /// Keep the sidecar only when `compressed / original <= min_ratio`.
    pub min_ratio: f64,
}

/// Every plugin the assemblers know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum Plugin {
    /// Compile-time constants exposed to client code as `process.env.*`.
    Define { definitions: BTreeMap<String, String> },
    HotModuleReplacement,
    /// Skip emitting when the compilation has errors.
    NoEmitOnErrors,
    Html(HtmlOptions),
    FriendlyErrors,
    /// Pull stylesheet content into standalone files named by `filename`.
    ExtractCss { filename: String },
    /// Minify and dedupe extracted CSS.
    OptimizeCss { safe: bool },
    /// Module ids derived from module paths so vendor hashes stay stable.
    HashedModuleIds,
    /// Copy `from` into `<output>/<to>`, skipping `ignore` globs.
    CopyStatic {
        from: PathBuf,
        to: String,
        ignore: Vec<String>,
    },
    Compression(CompressionOptions),
    BundleAnalyzer,
}

impl Plugin {
    /// Stable kebab-case name, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Define { .. } => "define",
            Self::HotModuleReplacement => "hot-module-replacement",
            Self::NoEmitOnErrors => "no-emit-on-errors",
            Self::Html(_) => "html",
            Self::FriendlyErrors => "friendly-errors",
            Self::ExtractCss { .. } => "extract-css",
            Self::OptimizeCss { .. } => "optimize-css",
            Self::HashedModuleIds => "hashed-module-ids",
            Self::CopyStatic { .. } => "copy-static",
            Self::Compression(_) => "compression",
            Self::BundleAnalyzer => "bundle-analyzer",
        }
    }

    /// `Define` from an env map; values become JSON string literals.
    #[must_use]
    pub fn define_env(env: &BTreeMap<String, String>) -> Self {
        let definitions = env
            .iter()
            .map(|(k, v)| {
                (
                    format!("process.env.{k}"),
                    serde_json::Value::String(v.clone()).to_string(),
                )
            })
            .collect();
        Self::Define { definitions }
    }
}

/// Ordered plugin list built from declarative flags.
///
/// ```ignore
/// let plugins = PluginSet::new()
///     .with(Plugin::HashedModuleIds)
///     .with_if(config.build.bundle_analyzer_report, || Plugin::BundleAnalyzer)
///     .into_vec();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PluginSet {
    plugins: Vec<Plugin>,
}

impl PluginSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Add the plugin built by `make` only when `enabled`.
    #[must_use]
    pub fn with_if(self, enabled: bool, make: impl FnOnce() -> Plugin) -> Self {
        if enabled {
            self.with(make())
        } else {
            self
        }
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(Plugin::name).collect()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Plugin> {
        self.plugins
    }
}

/// Typed lookups over a plugin list.
pub trait PluginLookup {
    fn html(&self) -> Option<&HtmlOptions>;
    fn extract_css(&self) -> Option<&str>;
    fn optimize_css(&self) -> bool;
    fn compression(&self) -> Option<&CompressionOptions>;
    /// Source, destination and ignore globs of `CopyStatic`.
    fn copy_static(&self) -> Option<(&PathBuf, &str, &[String])>;
    fn has(&self, name: &str) -> bool;
}

impl PluginLookup for [Plugin] {
    fn html(&self) -> Option<&HtmlOptions> {
        self.iter().find_map(|p| match p {
            Plugin::Html(options) => Some(options),
            _ => None,
        })
    }

    fn extract_css(&self) -> Option<&str> {
        self.iter().find_map(|p| match p {
            Plugin::ExtractCss { filename } => Some(filename.as_str()),
            _ => None,
        })
    }

    fn optimize_css(&self) -> bool {
        self.iter().any(|p| matches!(p, Plugin::OptimizeCss { .. }))
    }

    fn compression(&self) -> Option<&CompressionOptions> {
        self.iter().find_map(|p| match p {
            Plugin::Compression(options) => Some(options),
            _ => None,
        })
    }

    fn copy_static(&self) -> Option<(&PathBuf, &str, &[String])> {
        self.iter().find_map(|p| match p {
            Plugin::CopyStatic { from, to, ignore } => {
                Some((from, to.as_str(), ignore.as_slice()))
            }
            _ => None,
        })
    }

    fn has(&self, name: &str) -> bool {
        self.iter().any(|p| p.name() == name)
    }
}
