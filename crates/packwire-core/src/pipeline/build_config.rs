//! Typed bundler configuration and the overlay merge.
//!
//! A [`BuildConfig`] is what the bundler engine receives. Environment-specific
//! assemblers never mutate it field by field; they describe their changes as a
//! [`ConfigOverlay`] and apply it with [`BuildConfig::overlay`]:
//!
//! - lists (`rules`, `plugins`, `resolve.extensions`, entry modules) concatenate,
//! - maps (`entry`, `resolve.alias`) merge key-wise, overlay keys winning,
//! - `Some` scalars replace the base value, `None` keeps it.

use super::plugins::Plugin;
use crate::env::Mode;
use crate::style::RuleUse;
use regex_lite::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Regex that routes files to a rule, matched against the file path.
#[derive(Debug, Clone)]
pub struct TestPattern(Regex);

impl TestPattern {
    /// Compile an arbitrary pattern.
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        Regex::new(pattern).map(Self)
    }

    /// `\.ext$`
    #[must_use]
    pub fn extension(ext: &str) -> Self {
        Self::extensions(&[ext])
    }

    /// `\.(a|b|c)$`
    #[must_use]
    pub fn extensions(exts: &[&str]) -> Self {
        let alternatives: Vec<String> = exts.iter().map(|e| regex_lite::escape(e)).collect();
        let pattern = if alternatives.len() == 1 {
            format!(r"\.{}$", alternatives[0])
        } else {
            format!(r"\.({})$", alternatives.join("|"))
        };
        Self(Regex::new(&pattern).expect("escaped extensions form a valid pattern"))
    }

    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.0.is_match(path)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for TestPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for TestPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A module rule: files matching `test` (and no `exclude` prefix) go through `rule_use`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRule {
    pub test: TestPattern,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(rename = "use")]
    pub rule_use: RuleUse,
}

impl FileRule {
    /// Whether this rule applies to `path`.
    #[must_use]
    pub fn applies_to(&self, path: &str) -> bool {
        self.test.is_match(path) && !self.exclude.iter().any(|ex| path.contains(ex.as_str()))
    }
}

/// Source map flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Devtool {
    /// Fast rebuilds, line-level maps.
    CheapModuleEvalSourceMap,
    /// Full, separate source maps.
    SourceMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub path: PathBuf,
    /// Name template for entry chunks.
    pub filename: String,
    /// Name template for non-entry chunks; `filename` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_filename: Option<String>,
    /// URL prefix of every emitted asset, ends with `/`.
    pub public_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolveConfig {
    pub extensions: Vec<String>,
    pub alias: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSelection {
    All,
    Async,
    Initial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitChunks {
    pub chunks: ChunkSelection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_chunks: Option<SplitChunks>,
}

/// Complete configuration handed to the bundler engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildConfig {
    pub mode: Mode,
    /// Directory entry modules are resolved from.
    pub context: PathBuf,
    /// Entry name → modules, loaded in order.
    pub entry: BTreeMap<String, Vec<String>>,
    pub output: OutputConfig,
    pub resolve: ResolveConfig,
    pub rules: Vec<FileRule>,
    pub devtool: Option<Devtool>,
    pub plugins: Vec<Plugin>,
    pub optimization: Optimization,
}

/// Partial output settings.
#[derive(Debug, Clone, Default)]
pub struct OutputOverlay {
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
    pub chunk_filename: Option<String>,
    pub public_path: Option<String>,
}

/// Environment-specific changes applied on top of a base [`BuildConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigOverlay {
    pub mode: Option<Mode>,
    pub entry: BTreeMap<String, Vec<String>>,
    pub output: OutputOverlay,
    pub extensions: Vec<String>,
    pub alias: BTreeMap<String, String>,
    pub rules: Vec<FileRule>,
    /// `Some(None)` turns source maps off.
    pub devtool: Option<Option<Devtool>>,
    pub plugins: Vec<Plugin>,
    pub split_chunks: Option<SplitChunks>,
}

impl BuildConfig {
    /// Apply `overlay` on top of `self`.
    #[must_use]
    pub fn overlay(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(mode) = overlay.mode {
            self.mode = mode;
        }

        for (name, modules) in overlay.entry {
            self.entry.entry(name).or_default().extend(modules);
        }

        let out = overlay.output;
        if let Some(path) = out.path {
            self.output.path = path;
        }
        if let Some(filename) = out.filename {
            self.output.filename = filename;
        }
        if let Some(chunk_filename) = out.chunk_filename {
            self.output.chunk_filename = Some(chunk_filename);
        }
        if let Some(public_path) = out.public_path {
            self.output.public_path = public_path;
        }

        self.resolve.extensions.extend(overlay.extensions);
        self.resolve.alias.extend(overlay.alias);
        self.rules.extend(overlay.rules);

        if let Some(devtool) = overlay.devtool {
            self.devtool = devtool;
        }

        self.plugins.extend(overlay.plugins);

        if let Some(split) = overlay.split_chunks {
            self.optimization.split_chunks = Some(split);
        }

        self
    }

    /// Put `module` in front of every entry's module list.
    pub fn prepend_to_entries(&mut self, module: &str) {
        for modules in self.entry.values_mut() {
            modules.insert(0, module.to_string());
        }
    }

    /// First rule that applies to `path`.
    #[must_use]
    pub fn rule_for(&self, path: &str) -> Option<&FileRule> {
        self.rules.iter().find(|r| r.applies_to(path))
    }

    /// Name template for a chunk.
    #[must_use]
    pub fn chunk_template(&self, is_entry: bool) -> &str {
        match (&self.output.chunk_filename, is_entry) {
            (Some(chunk), false) => chunk,
            _ => &self.output.filename,
        }
    }
}
