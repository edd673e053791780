use super::build_config::{BuildConfig, ConfigOverlay, Devtool};
use super::plugins::{ChunksSortMode, HtmlOptions, Plugin, PluginSet};
use crate::config::ProjectConfig;
use crate::env::{Environment, Mode};
use crate::style::{generate_file_rules, generate_rule_set, StyleOptions};

/// Hot-reload client module placed in front of every entry in development.
pub const HOT_CLIENT_ENTRY: &str = "./build/dev-client";

/// Development configuration: runtime-injected styles, hot reload, fast source maps.
#[must_use]
pub fn build_dev_config(
    mut base: BuildConfig,
    config: &ProjectConfig,
    env: &Environment,
) -> BuildConfig {
    base.prepend_to_entries(HOT_CLIENT_ENTRY);

    let rules = generate_file_rules(&generate_rule_set(StyleOptions {
        source_map: config.dev.css_source_map,
        extract: false,
    }));

    let mut client_env = config.dev.env.clone();
    client_env.insert("NODE_ENV".to_string(), env.node_env.clone());

    let plugins = PluginSet::new()
        .with(Plugin::define_env(&client_env))
        .with(Plugin::HotModuleReplacement)
        .with(Plugin::NoEmitOnErrors)
        .with(Plugin::Html(HtmlOptions {
            filename: "index.html".to_string(),
            template: config.resolve(&config.app.template),
            inject: true,
            minify: None,
            chunks_sort_mode: ChunksSortMode::Auto,
        }))
        .with(Plugin::FriendlyErrors)
        .into_vec();

    base.overlay(ConfigOverlay {
        mode: Some(Mode::Development),
        rules,
        devtool: Some(Some(Devtool::CheapModuleEvalSourceMap)),
        plugins,
        ..Default::default()
    })
}
