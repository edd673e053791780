use super::build_config::{
    BuildConfig, ChunkSelection, ConfigOverlay, Devtool, OutputOverlay, SplitChunks, TestPattern,
};
use super::plugins::{
    ChunksSortMode, CompressionAlgorithm, CompressionOptions, HtmlMinify, HtmlOptions, Plugin,
    PluginSet,
};
use crate::config::ProjectConfig;
use crate::env::{Environment, Mode};
use crate::paths::assets_path;
use crate::style::{generate_file_rules, generate_rule_set, StyleOptions};

/// Only assets larger than this are gzipped.
pub const GZIP_THRESHOLD: u64 = 10_240;

/// A gzip sidecar is kept only when it is at most this fraction of the original.
pub const GZIP_MIN_RATIO: f64 = 0.8;

/// Production configuration: extracted and minified CSS, content-hashed names,
/// minified HTML, static copy, optional gzip and bundle report.
#[must_use]
pub fn build_prod_config(
    base: BuildConfig,
    config: &ProjectConfig,
    env: &Environment,
) -> BuildConfig {
    let build = &config.build;
    let asset = |path: &str| assets_path(config, Mode::Production, path);

    let rules = generate_file_rules(&generate_rule_set(StyleOptions {
        source_map: build.production_source_map,
        extract: true,
    }));

    let mut client_env = build.env.clone();
    client_env.insert("NODE_ENV".to_string(), env.node_env.clone());

    let index = build
        .index
        .strip_prefix(&build.assets_root)
        .unwrap_or(&build.index)
        .to_string_lossy()
        .replace('\\', "/");

    let gzip_extensions: Vec<&str> = build
        .production_gzip_extensions
        .iter()
        .map(String::as_str)
        .collect();

    let plugins = PluginSet::new()
        .with(Plugin::define_env(&client_env))
        .with(Plugin::ExtractCss {
            filename: asset("css/[name].[contenthash].css"),
        })
        .with(Plugin::OptimizeCss { safe: true })
        .with(Plugin::Html(HtmlOptions {
            filename: index,
            template: config.resolve(&config.app.template),
            inject: true,
            minify: Some(HtmlMinify {
                remove_comments: true,
                collapse_whitespace: true,
                remove_attribute_quotes: true,
            }),
            chunks_sort_mode: ChunksSortMode::Dependency,
        }))
        .with(Plugin::HashedModuleIds)
        .with(Plugin::CopyStatic {
            from: config.resolve(&config.app.static_dir),
            to: build.assets_sub_directory.clone(),
            ignore: vec![".*".to_string()],
        })
        .with_if(
            build.production_gzip && !gzip_extensions.is_empty(),
            || {
                Plugin::Compression(CompressionOptions {
                    asset: "[path].gz[query]".to_string(),
                    algorithm: CompressionAlgorithm::Gzip,
                    test: TestPattern::extensions(&gzip_extensions),
                    threshold: GZIP_THRESHOLD,
                    min_ratio: GZIP_MIN_RATIO,
                })
            },
        )
        .with_if(build.bundle_analyzer_report, || Plugin::BundleAnalyzer)
        .into_vec();

    base.overlay(ConfigOverlay {
        mode: Some(Mode::Production),
        output: OutputOverlay {
            path: Some(config.resolve(&build.assets_root)),
            filename: Some(asset("js/[name].[chunkhash].js")),
            chunk_filename: Some(asset("js/[id].[chunkhash].js")),
            public_path: None,
        },
        rules,
        devtool: Some(build.production_source_map.then_some(Devtool::SourceMap)),
        plugins,
        split_chunks: Some(SplitChunks {
            chunks: ChunkSelection::All,
        }),
        ..Default::default()
    })
}
