//! Style rule generation.
//!
//! Produces, for every supported style language, the ordered chain of
//! transform stages the bundler engine runs on a stylesheet. Chains are in
//! execution order: the preprocessor (if any) reads the file, `css-loader`
//! interprets the CSS, and the last stage decides where the CSS ends up.
//!
//! ```text
//! extract = false:  less-loader → css-loader → vue-style-loader   (runtime <style> injection)
//! extract = true:   Extract { less-loader → css-loader, fallback: vue-style-loader }
//! ```

use crate::pipeline::build_config::{FileRule, TestPattern};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Stage interpreting plain CSS (`@import`, `url()`).
pub const CSS_LOADER: &str = "css-loader";

/// Stage injecting styles at runtime from script.
pub const STYLE_INJECT_LOADER: &str = "vue-style-loader";

/// Supported style languages, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleLanguage {
    Css,
    Postcss,
    Less,
    /// Indented sass syntax.
    Sass,
    Scss,
    Stylus,
    Styl,
}

impl StyleLanguage {
    pub const ALL: [StyleLanguage; 7] = [
        Self::Css,
        Self::Postcss,
        Self::Less,
        Self::Sass,
        Self::Scss,
        Self::Stylus,
        Self::Styl,
    ];

    /// File extension (without the dot).
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Postcss => "postcss",
            Self::Less => "less",
            Self::Sass => "sass",
            Self::Scss => "scss",
            Self::Stylus => "stylus",
            Self::Styl => "styl",
        }
    }

    /// Preprocessor stage name and its language-specific flags.
    fn preprocessor(self) -> Option<(&'static str, Map<String, Value>)> {
        match self {
            Self::Css | Self::Postcss => None,
            Self::Less => Some(("less-loader", Map::new())),
            Self::Sass => {
                let mut flags = Map::new();
                flags.insert("indentedSyntax".to_string(), Value::Bool(true));
                Some(("sass-loader", flags))
            }
            Self::Scss => Some(("sass-loader", Map::new())),
            Self::Stylus | Self::Styl => Some(("stylus-loader", Map::new())),
        }
    }
}

/// Options for one generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleOptions {
    pub source_map: bool,
    pub extract: bool,
}

/// A single transform stage: name plus stage-specific options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderStage {
    pub loader: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl LoaderStage {
    /// Stage without options.
    pub fn new(loader: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            options: Map::new(),
        }
    }

    /// Add an option.
    #[must_use]
    pub fn option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }
}

/// Ordered stages, in execution order.
pub type LoaderChain = Vec<LoaderStage>;

/// What a rule does with matching files.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RuleUse {
    /// Run the chain; its last stage decides where output goes.
    Chain { stages: LoaderChain },
    /// Run `stages`, then pull the resulting CSS out into a standalone
    /// stylesheet. `fallback` is used where extraction is unsupported.
    Extract {
        stages: LoaderChain,
        fallback: LoaderStage,
    },
}

impl RuleUse {
    /// Stages that run in every case.
    #[must_use]
    pub fn stages(&self) -> &[LoaderStage] {
        match self {
            Self::Chain { stages } | Self::Extract { stages, .. } => stages,
        }
    }

    #[must_use]
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extract { .. })
    }
}

/// Style language → rule use. Built once per build, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet(BTreeMap<StyleLanguage, RuleUse>);

impl RuleSet {
    #[must_use]
    pub fn get(&self, language: StyleLanguage) -> Option<&RuleUse> {
        self.0.get(&language)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StyleLanguage, &RuleUse)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::Index<StyleLanguage> for RuleSet {
    type Output = RuleUse;

    fn index(&self, language: StyleLanguage) -> &RuleUse {
        &self.0[&language]
    }
}

fn rule_for(language: StyleLanguage, options: StyleOptions) -> RuleUse {
    let mut stages = LoaderChain::new();

    if let Some((loader, mut flags)) = language.preprocessor() {
        flags.insert("sourceMap".to_string(), Value::Bool(options.source_map));
        stages.push(LoaderStage {
            loader: loader.to_string(),
            options: flags,
        });
    }
    stages.push(LoaderStage::new(CSS_LOADER).option("sourceMap", options.source_map));

    if options.extract {
        RuleUse::Extract {
            stages,
            fallback: LoaderStage::new(STYLE_INJECT_LOADER),
        }
    } else {
        stages.push(LoaderStage::new(STYLE_INJECT_LOADER));
        RuleUse::Chain { stages }
    }
}

/// Build the rule set for every supported language.
#[must_use]
pub fn generate_rule_set(options: StyleOptions) -> RuleSet {
    RuleSet(
        StyleLanguage::ALL
            .iter()
            .map(|lang| (*lang, rule_for(*lang, options)))
            .collect(),
    )
}

/// One file rule per extension, so the engine can route files by extension.
#[must_use]
pub fn generate_file_rules(rule_set: &RuleSet) -> Vec<FileRule> {
    rule_set
        .iter()
        .map(|(lang, rule_use)| FileRule {
            test: TestPattern::extension(lang.extension()),
            exclude: Vec::new(),
            rule_use: rule_use.clone(),
        })
        .collect()
}
