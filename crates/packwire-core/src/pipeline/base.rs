use super::build_config::{
    BuildConfig, FileRule, Optimization, OutputConfig, ResolveConfig, TestPattern,
};
use crate::config::ProjectConfig;
use crate::env::Mode;
use crate::paths::{assets_path, public_path};
use crate::style::{LoaderStage, RuleUse};
use std::collections::BTreeMap;

/// Assets below this size are inlined as data URLs by the engine.
const INLINE_LIMIT: u64 = 10_000;

fn single(test: TestPattern, stage: LoaderStage) -> FileRule {
    FileRule {
        test,
        exclude: Vec::new(),
        rule_use: RuleUse::Chain {
            stages: vec![stage],
        },
    }
}

/// Configuration shared by development and production.
#[must_use]
pub fn base_config(config: &ProjectConfig, mode: Mode) -> BuildConfig {
    let entry = config
        .app
        .entry
        .iter()
        .map(|(name, module)| (name.clone(), vec![module.clone()]))
        .collect();

    let src = config.resolve(&config.app.src_dir);
    let alias = BTreeMap::from([("@".to_string(), src.display().to_string())]);

    let mut script = single(TestPattern::extension("js"), LoaderStage::new("babel-loader"));
    script.exclude.push("node_modules".to_string());

    let rules = vec![
        single(TestPattern::extension("vue"), LoaderStage::new("vue-loader")),
        script,
        single(
            TestPattern::extensions(&["png", "jpg", "jpeg", "gif", "svg"]),
            LoaderStage::new("url-loader")
                .option("limit", INLINE_LIMIT)
                .option("name", assets_path(config, mode, "img/[name].[hash:7].[ext]")),
        ),
        single(
            TestPattern::extensions(&["woff", "woff2", "eot", "ttf", "otf"]),
            LoaderStage::new("url-loader")
                .option("limit", INLINE_LIMIT)
                .option(
                    "name",
                    assets_path(config, mode, "fonts/[name].[hash:7].[ext]"),
                ),
        ),
    ];

    BuildConfig {
        mode,
        context: config.root.clone(),
        entry,
        output: OutputConfig {
            path: config.resolve(&config.build.assets_root),
            filename: "[name].js".to_string(),
            chunk_filename: None,
            public_path: public_path(config, mode),
        },
        resolve: ResolveConfig {
            extensions: vec![".js".to_string(), ".vue".to_string(), ".json".to_string()],
            alias,
        },
        rules,
        devtool: None,
        plugins: Vec::new(),
        optimization: Optimization::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_base_config_shape() {
        let config = ProjectConfig::new(PathBuf::from("/proj"));
        let base = base_config(&config, Mode::Development);

        assert_eq!(base.entry["app"], ["./src/main.js"]);
        assert_eq!(base.output.path, PathBuf::from("/proj/dist"));
        assert_eq!(base.output.public_path, "/");
        assert_eq!(base.resolve.alias["@"], "/proj/src");
        assert!(base.plugins.is_empty());
    }

    #[test]
    fn test_base_rules_route_by_extension() {
        let config = ProjectConfig::new(PathBuf::from("/proj"));
        let base = base_config(&config, Mode::Production);

        let loader = |path: &str| {
            base.rule_for(path)
                .map(|r| r.rule_use.stages()[0].loader.clone())
        };
        assert_eq!(loader("src/App.vue").as_deref(), Some("vue-loader"));
        assert_eq!(loader("src/main.js").as_deref(), Some("babel-loader"));
        assert_eq!(loader("node_modules/x/index.js"), None);
        assert_eq!(loader("src/logo.jpeg").as_deref(), Some("url-loader"));
        assert_eq!(loader("fonts/a.woff2").as_deref(), Some("url-loader"));
    }

    #[test]
    fn test_image_names_use_mode_assets_dir() {
        let mut config = ProjectConfig::new(PathBuf::from("/proj"));
        config.build.assets_sub_directory = "assets".to_string();
        let base = base_config(&config, Mode::Production);

        let image = base.rule_for("a.png").unwrap();
        assert_eq!(
            image.rule_use.stages()[0].options["name"],
            "assets/img/[name].[hash:7].[ext]"
        );
    }
}
