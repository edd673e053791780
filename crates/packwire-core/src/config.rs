//! Project configuration (`packwire.json`).
//!
//! ## Format
//!
//! ```json
//! {
//!   "app":   { "entry": { "app": "./src/main.js" }, "template": "public/index.html" },
//!   "dev":   { "port": 8080, "proxyTable": { "/api": "http://localhost:3000" } },
//!   "build": { "assetsRoot": "dist", "productionGzip": true },
//!   "engine": { "program": "node", "args": ["build/engine.js"] }
//! }
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use crate::dev::proxy::ProxyTable;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file looked up in the project root when no explicit path is given.
pub const CONFIG_FILE: &str = "packwire.json";

/// Full project configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    /// Project root; every relative path in the config is resolved against it.
    #[serde(skip)]
    pub root: PathBuf,
    pub app: AppSettings,
    pub dev: DevSettings,
    pub build: BuildSettings,
    /// External bundler engine invocation.
    pub engine: Option<EngineSettings>,
}

/// Application layout shared by both modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Entry name → entry module.
    pub entry: BTreeMap<String, String>,
    /// HTML template the bundles are injected into.
    pub template: PathBuf,
    /// Directory copied verbatim (dev: served, prod: copied into the output).
    pub static_dir: PathBuf,
    /// Application sources (aliased as `@`, watched by `packwire dev`).
    pub src_dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            entry: BTreeMap::from([("app".to_string(), "./src/main.js".to_string())]),
            template: PathBuf::from("public/index.html"),
            static_dir: PathBuf::from("static"),
            src_dir: PathBuf::from("src"),
        }
    }
}

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevSettings {
    /// Values exposed to client code (`process.env.*`).
    pub env: BTreeMap<String, String>,
    pub port: u16,
    pub host: String,
    pub auto_open_browser: bool,
    pub proxy_table: ProxyTable,
    pub assets_public_path: String,
    pub assets_sub_directory: String,
    pub css_source_map: bool,
}

impl Default for DevSettings {
    fn default() -> Self {
        Self {
            env: BTreeMap::from([("NODE_ENV".to_string(), "development".to_string())]),
            port: 8080,
            host: "localhost".to_string(),
            auto_open_browser: true,
            proxy_table: ProxyTable::default(),
            assets_public_path: "/".to_string(),
            assets_sub_directory: "static".to_string(),
            css_source_map: false,
        }
    }
}

/// Production build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSettings {
    pub env: BTreeMap<String, String>,
    /// Output root directory.
    pub assets_root: PathBuf,
    pub assets_sub_directory: String,
    pub assets_public_path: String,
    /// Path of the generated HTML document.
    pub index: PathBuf,
    pub production_source_map: bool,
    pub production_gzip: bool,
    pub production_gzip_extensions: Vec<String>,
    pub bundle_analyzer_report: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            env: BTreeMap::from([("NODE_ENV".to_string(), "production".to_string())]),
            assets_root: PathBuf::from("dist"),
            assets_sub_directory: "static".to_string(),
            assets_public_path: "/".to_string(),
            index: PathBuf::from("dist/index.html"),
            production_source_map: true,
            production_gzip: false,
            production_gzip_extensions: vec!["js".to_string(), "css".to_string()],
            bundle_analyzer_report: false,
        }
    }
}

/// How to invoke the external bundler engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl ProjectConfig {
    /// Defaults rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    /// Load configuration for the project at `root`.
    ///
    /// With `explicit` set, that file must exist. Otherwise `packwire.json` in
    /// `root` is used when present and defaults apply when it is not.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => root.join(p),
            None => {
                let candidate = root.join(CONFIG_FILE);
                if !candidate.exists() {
                    return Ok(Self::new(root.to_path_buf()));
                }
                candidate
            }
        };

        let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&source).map_err(|source| Error::ConfigParse {
                path: path.clone(),
                source,
            })?;
        config.root = root.to_path_buf();
        Ok(config)
    }

    /// Resolve a config-relative path against the project root.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::proxy::ProxyEntry;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempdir().unwrap();
        let config = ProjectConfig::load(dir.path(), None).unwrap();

        assert_eq!(config.root, dir.path());
        assert_eq!(config.dev.port, 8080);
        assert_eq!(config.dev.env["NODE_ENV"], "development");
        assert_eq!(config.build.env["NODE_ENV"], "production");
        assert_eq!(config.build.assets_root, PathBuf::from("dist"));
        assert_eq!(config.app.entry["app"], "./src/main.js");
        assert!(config.dev.proxy_table.is_empty());
        assert!(config.engine.is_none());
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{
                "dev": {
                    "port": 9000,
                    "autoOpenBrowser": false,
                    "proxyTable": { "/api": "http://localhost:3000" }
                },
                "build": { "productionGzip": true, "assetsSubDirectory": "assets" },
                "engine": { "program": "node", "args": ["build/engine.js"] }
            }"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.dev.port, 9000);
        assert!(!config.dev.auto_open_browser);
        assert_eq!(config.dev.assets_sub_directory, "static");
        assert!(config.build.production_gzip);
        assert_eq!(config.build.assets_sub_directory, "assets");
        assert_eq!(config.engine.as_ref().unwrap().program, "node");

        let (context, entry) = config.dev.proxy_table.iter().next().unwrap();
        assert_eq!(context, "/api");
        assert!(matches!(entry, ProxyEntry::Target(t) if t == "http://localhost:3000"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = tempdir().unwrap();
        let err = ProjectConfig::load(dir.path(), Some(Path::new("nope.json"))).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ dev: ").unwrap();
        let err = ProjectConfig::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let config = ProjectConfig::new(PathBuf::from("/proj"));
        assert_eq!(
            config.resolve(Path::new("static")),
            PathBuf::from("/proj/static")
        );
        assert_eq!(config.resolve(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
