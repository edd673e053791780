//! Post-compile emission.
//!
//! Turns an engine [`Compilation`] into the final set of named output files:
//!
//! 1. chunk JS named by the output templates
//! 2. extracted (and optionally optimized) CSS
//! 3. engine-emitted assets, as-is
//! 4. the HTML document with injected tags
//! 5. gzip sidecars
//! 6. the bundle report
//!
//! The result is an in-memory [`AssetSet`] the dev server serves directly and
//! `packwire build` writes to disk.

pub mod compress;
pub mod filename;
pub mod html;
pub mod report;

use crate::css::optimize_css;
use crate::engine::Compilation;
use crate::error::{Error, Result};
use crate::pipeline::{BuildConfig, PluginLookup};
use filename::{render_name, NameContext};
use glob::Pattern;
use packwire_util::fs::{atomic_write, copy_dir_filtered, join_within};
use packwire_util::hash::{blake3_bytes, blake3_parts};
use report::{BundleReport, REPORT_FILE};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Named output files of one compilation.
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    assets: BTreeMap<String, Vec<u8>>,
    html: Option<String>,
    hash: String,
    scripts: Vec<String>,
    styles: Vec<String>,
    warnings: Vec<String>,
    report: Option<BundleReport>,
    copy_static: Option<StaticCopy>,
}

/// Static directory copied next to the emitted assets.
#[derive(Debug, Clone)]
struct StaticCopy {
    from: PathBuf,
    to: String,
    ignore: Vec<Pattern>,
}

impl StaticCopy {
    fn new(from: &Path, to: &str, ignore: &[String]) -> Result<Self> {
        let ignore = ignore
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| Error::other(format!("invalid copy-static ignore {p:?}: {e}")))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            from: from.to_path_buf(),
            to: to.to_string(),
            ignore,
        })
    }

    /// An ignore glob matches the relative path or any single component.
    fn ignored(&self, rel: &Path) -> bool {
        let posix = rel.to_string_lossy().replace('\\', "/");
        self.ignore.iter().any(|pattern| {
            pattern.matches(&posix)
                || rel
                    .components()
                    .any(|c| pattern.matches(&c.as_os_str().to_string_lossy()))
        })
    }
}

impl AssetSet {
    /// Asset content by output-relative name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.assets.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Compilation hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Output name of the HTML document, if one was generated.
    #[must_use]
    pub fn html_name(&self) -> Option<&str> {
        self.html.as_deref()
    }

    /// The generated HTML document.
    #[must_use]
    pub fn html_document(&self) -> Option<&[u8]> {
        self.html.as_deref().and_then(|name| self.get(name))
    }

    /// Script URLs injected into the document, in load order.
    #[must_use]
    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Stylesheet URLs injected into the document, in load order.
    #[must_use]
    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn report(&self) -> Option<&BundleReport> {
        self.report.as_ref()
    }

    /// Write every asset under `dir`, then copy the static directory.
    ///
    /// Names are resolved below `dir` even when they start with `/`; a name
    /// with a `..` component is an error. Returns the number of files written.
    pub fn write_to(&self, dir: &Path) -> Result<usize> {
        for (name, content) in &self.assets {
            atomic_write(&join_within(dir, Path::new(name))?, content)?;
        }
        let mut written = self.assets.len();

        if let Some(copy) = &self.copy_static {
            let target = join_within(dir, Path::new(&copy.to))?;
            let copied = copy_dir_filtered(&copy.from, &target, |rel| copy.ignored(rel))?;
            debug!(from = %copy.from.display(), files = copied.len(), "copied static assets");
            written += copied.len();
        }

        Ok(written)
    }
}

/// Read the HTML template named by the config's `Html` plugin.
///
/// `Ok(None)` when there is no `Html` plugin; a missing template file yields
/// [`html::DEFAULT_DOCUMENT`].
pub fn load_template(config: &BuildConfig) -> Result<Option<String>> {
    let Some(options) = config.plugins.html() else {
        return Ok(None);
    };
    match std::fs::read_to_string(&options.template) {
        Ok(template) => Ok(Some(template)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(template = %options.template.display(), "template missing, using default document");
            Ok(Some(html::DEFAULT_DOCUMENT.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the post-emit steps the config's plugins ask for.
///
/// With `NoEmitOnErrors`, a compilation carrying errors yields
/// [`Error::CompileFailed`] and nothing is emitted.
pub fn finalize(
    config: &BuildConfig,
    compilation: &Compilation,
    template: Option<&str>,
) -> Result<AssetSet> {
    let plugins = config.plugins.as_slice();

    if compilation.has_errors() && plugins.has("no-emit-on-errors") {
        return Err(Error::CompileFailed {
            errors: compilation.errors.clone(),
        });
    }

    let hash = compilation.hash();
    let mut assets = BTreeMap::new();

    // =========================================================================
    // Chunks
    // =========================================================================

    let mut js_names: BTreeMap<u32, String> = BTreeMap::new();
    let mut css_names: BTreeMap<u32, String> = BTreeMap::new();

    for chunk in &compilation.chunks {
        let chunk_hash = blake3_parts([
            chunk.js.as_slice(),
            chunk.css.as_deref().unwrap_or_default(),
        ]);
        let js_hash = blake3_bytes(&chunk.js);
        let ctx = NameContext {
            name: &chunk.name,
            id: chunk.id,
            hash: &hash,
            chunk_hash: &chunk_hash,
            content_hash: &js_hash,
        };
        let js_name = render_name(config.chunk_template(chunk.entry), &ctx);
        assets.insert(js_name.clone(), chunk.js.clone());
        js_names.insert(chunk.id, js_name);

        let (Some(template), Some(css)) = (plugins.extract_css(), &chunk.css) else {
            continue;
        };
        let css = if plugins.optimize_css() {
            optimize_css(&String::from_utf8_lossy(css), &chunk.name)?.into_bytes()
        } else {
            css.clone()
        };
        let css_hash = blake3_bytes(&css);
        let css_name = render_name(
            template,
            &NameContext {
                content_hash: &css_hash,
                ..ctx
            },
        );
        assets.insert(css_name.clone(), css);
        css_names.insert(chunk.id, css_name);
    }

    for asset in &compilation.assets {
        assets.insert(asset.name.clone(), asset.content.clone());
    }

    // =========================================================================
    // HTML
    // =========================================================================

    let mut scripts = Vec::new();
    let mut styles = Vec::new();
    let mut html_name = None;

    if let (Some(options), Some(template)) = (plugins.html(), template) {
        let public = &config.output.public_path;
        for chunk in html::injected_chunks(&compilation.chunks, options.chunks_sort_mode) {
            if let Some(css) = css_names.get(&chunk.id) {
                styles.push(format!("{public}{css}"));
            }
            if let Some(js) = js_names.get(&chunk.id) {
                scripts.push(format!("{public}{js}"));
            }
        }

        let mut document = if options.inject {
            html::inject(template, &styles, &scripts)
        } else {
            template.to_string()
        };
        if let Some(minify) = options.minify {
            document = html::minify(&document, minify);
        }

        assets.insert(options.filename.clone(), document.into_bytes());
        html_name = Some(options.filename.clone());
    }

    // =========================================================================
    // Compression and report
    // =========================================================================

    if let Some(options) = plugins.compression() {
        for (name, content) in compress::compress_assets(&assets, options)? {
            assets.insert(name, content);
        }
    }

    let report = if plugins.has("bundle-analyzer") {
        let report = BundleReport::measure(&hash, &assets)?;
        let json = serde_json::to_vec_pretty(&report)
            .map_err(|e| Error::other(format!("cannot serialize bundle report: {e}")))?;
        assets.insert(REPORT_FILE.to_string(), json);
        Some(report)
    } else {
        None
    };

    let copy_static = plugins
        .copy_static()
        .map(|(from, to, ignore)| StaticCopy::new(from, to, ignore))
        .transpose()?;

    debug!(assets = assets.len(), hash = %hash, "finalized compilation");

    Ok(AssetSet {
        assets,
        html: html_name,
        hash,
        scripts,
        styles,
        warnings: compilation.warnings.clone(),
        report,
        copy_static,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::engine::{Chunk, EmittedAsset};
    use crate::env::{Environment, Mode};
    use crate::pipeline::{base_config, build_dev_config, build_prod_config, Plugin};
    use tempfile::tempdir;

    const TEMPLATE: &str = "<html><head><title>t</title></head><body><div id=\"app\"></div></body></html>";

    fn prod(root: &Path, edit: impl FnOnce(&mut ProjectConfig)) -> BuildConfig {
        let mut config = ProjectConfig::new(root.to_path_buf());
        edit(&mut config);
        let env = Environment {
            node_env: "production".to_string(),
            port: 8080,
        };
        build_prod_config(base_config(&config, Mode::Production), &config, &env)
    }

    fn dev() -> BuildConfig {
        let config = ProjectConfig::new(PathBuf::from("/proj"));
        let env = Environment {
            node_env: "development".to_string(),
            port: 8080,
        };
        build_dev_config(base_config(&config, Mode::Development), &config, &env)
    }

    fn compilation() -> Compilation {
        Compilation {
            chunks: vec![
                Chunk::shared(0, "vendor", "vendor()"),
                Chunk::entry(1, "app", "app()")
                    .with_css(".a {\n  color: red;\n}\n")
                    .depends_on("vendor"),
                Chunk::shared(2, "lazy", "lazy()"),
            ],
            assets: vec![EmittedAsset {
                name: "static/img/logo.png".to_string(),
                content: vec![0x89, 0x50],
            }],
            ..Default::default()
        }
    }

    fn find<'a>(set: &'a AssetSet, prefix: &str) -> &'a str {
        set.names()
            .find(|n| n.starts_with(prefix))
            .unwrap_or_else(|| panic!("no asset starting with {prefix}"))
    }

    #[test]
    fn test_dev_names_and_injection() {
        let set = finalize(&dev(), &compilation(), Some(TEMPLATE)).unwrap();

        assert_eq!(set.get("app.js"), Some(b"app()".as_slice()));
        assert_eq!(set.get("vendor.js"), Some(b"vendor()".as_slice()));
        assert!(set.get("static/img/logo.png").is_some());
        assert_eq!(set.scripts(), ["/vendor.js", "/app.js"]);
        assert!(set.styles().is_empty(), "dev keeps CSS in the JS");

        let html = String::from_utf8(set.html_document().unwrap().to_vec()).unwrap();
        assert!(html.contains("<div id=\"app\"></div><script"));
        assert!(!html.contains("lazy.js"));
    }

    #[test]
    fn test_prod_hashed_names_and_extracted_css() {
        let root = tempdir().unwrap();
        let config = prod(root.path(), |_| {});
        let set = finalize(&config, &compilation(), Some(TEMPLATE)).unwrap();

        let app = find(&set, "static/js/app.");
        assert_eq!(app.len(), "static/js/app.".len() + 20 + ".js".len());
        assert!(find(&set, "static/js/2.").ends_with(".js"), "non-entry uses id");

        let css_name = find(&set, "static/css/app.");
        assert_eq!(set.get(css_name), Some(b".a{color:red}".as_slice()));

        let html = String::from_utf8(set.get("index.html").unwrap().to_vec()).unwrap();
        assert!(html.contains(&format!("<link href=/{css_name} rel=stylesheet>")));
        let vendor_at = html.find("static/js/0.").unwrap();
        let app_at = html.find(app).unwrap();
        assert!(vendor_at < app_at, "{html}");
        assert!(!html.contains("\"app\""), "attribute quotes removed");
    }

    #[test]
    fn test_names_change_with_content() {
        let root = tempdir().unwrap();
        let config = prod(root.path(), |_| {});
        let first = finalize(&config, &compilation(), None).unwrap();

        let mut changed = compilation();
        changed.chunks[1].js = b"app(2)".to_vec();
        let second = finalize(&config, &changed, None).unwrap();

        assert_ne!(find(&first, "static/js/app."), find(&second, "static/js/app."));
        assert_eq!(find(&first, "static/js/0."), find(&second, "static/js/0."));
        assert_ne!(first.hash(), second.hash());
    }

    #[test]
    fn test_no_emit_on_errors() {
        let mut broken = compilation();
        broken.errors.push("Module not found: ./missing".to_string());

        let err = finalize(&dev(), &broken, Some(TEMPLATE)).unwrap_err();
        assert!(matches!(err, Error::CompileFailed { ref errors } if errors.len() == 1));

        let root = tempdir().unwrap();
        assert!(finalize(&prod(root.path(), |_| {}), &broken, None).is_ok());
    }

    #[test]
    fn test_gzip_and_report() {
        let root = tempdir().unwrap();
        let config = prod(root.path(), |c| {
            c.build.production_gzip = true;
            c.build.bundle_analyzer_report = true;
        });
        let mut big = compilation();
        big.chunks[0].js = "var x = 1;\n".repeat(2000).into_bytes();

        let set = finalize(&config, &big, Some(TEMPLATE)).unwrap();
        let vendor = find(&set, "static/js/0.").to_string();
        assert!(set.get(&format!("{vendor}.gz")).is_some());
        assert!(set.names().filter(|n| n.ends_with(".gz")).count() == 1);

        let report = set.report().unwrap();
        assert_eq!(report.assets[0].name, vendor);
        assert!(set.get(REPORT_FILE).is_some());
    }

    #[test]
    fn test_load_template_falls_back_to_default() {
        let root = tempdir().unwrap();
        let config = prod(root.path(), |_| {});
        let template = load_template(&config).unwrap().unwrap();
        assert_eq!(template, html::DEFAULT_DOCUMENT);

        std::fs::create_dir_all(root.path().join("public")).unwrap();
        std::fs::write(root.path().join("public/index.html"), TEMPLATE).unwrap();
        assert_eq!(load_template(&config).unwrap().unwrap(), TEMPLATE);
    }

    #[test]
    fn test_write_to_copies_static_without_dotfiles() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("static/fonts")).unwrap();
        std::fs::write(root.path().join("static/fonts/a.woff"), "font").unwrap();
        std::fs::write(root.path().join("static/.gitkeep"), "").unwrap();

        let config = prod(root.path(), |_| {});
        let set = finalize(&config, &compilation(), Some(TEMPLATE)).unwrap();

        let out = tempdir().unwrap();
        let written = set.write_to(out.path()).unwrap();
        assert_eq!(written, set.len() + 1);
        assert!(out.path().join("index.html").is_file());
        assert!(out.path().join("static/img/logo.png").is_file());
        assert!(out.path().join("static/fonts/a.woff").is_file());
        assert!(!out.path().join("static/.gitkeep").exists());
    }

    #[test]
    fn test_write_to_honors_ignore_globs() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("static/raw")).unwrap();
        std::fs::write(root.path().join("static/raw/logo.psd"), "psd").unwrap();
        std::fs::write(root.path().join("static/raw/logo.svg"), "svg").unwrap();
        std::fs::write(root.path().join("static/.gitkeep"), "").unwrap();

        let mut config = prod(root.path(), |_| {});
        for plugin in &mut config.plugins {
            if let Plugin::CopyStatic { ignore, .. } = plugin {
                ignore.push("*.psd".to_string());
            }
        }
        let set = finalize(&config, &compilation(), None).unwrap();

        let out = tempdir().unwrap();
        set.write_to(out.path()).unwrap();
        assert!(out.path().join("static/raw/logo.svg").is_file());
        assert!(!out.path().join("static/raw/logo.psd").exists());
        assert!(!out.path().join("static/.gitkeep").exists());
    }

    #[test]
    fn test_invalid_ignore_glob_is_an_error() {
        let root = tempdir().unwrap();
        let mut config = prod(root.path(), |_| {});
        for plugin in &mut config.plugins {
            if let Plugin::CopyStatic { ignore, .. } = plugin {
                ignore.push("[".to_string());
            }
        }
        assert!(finalize(&config, &compilation(), None).is_err());
    }

    #[test]
    fn test_write_to_keeps_rooted_names_inside_output() {
        let root = tempdir().unwrap();
        let config = prod(root.path(), |c| {
            c.build.assets_sub_directory = "/static".to_string();
        });
        let set = finalize(&config, &compilation(), Some(TEMPLATE)).unwrap();
        assert!(set.names().any(|n| n.starts_with("/static/js/app.")));

        let out = tempdir().unwrap();
        let dist = out.path().join("dist");
        set.write_to(&dist).unwrap();

        let app = std::fs::read_dir(dist.join("static/js"))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .any(|e| e.file_name().to_string_lossy().starts_with("app."));
        assert!(app);
        let outside: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(outside, ["dist"]);
    }

    #[test]
    fn test_write_to_rejects_parent_components() {
        let mut escaping = compilation();
        escaping.assets.push(EmittedAsset {
            name: "../escape.txt".to_string(),
            content: b"x".to_vec(),
        });
        let set = finalize(&dev(), &escaping, None).unwrap();

        let out = tempdir().unwrap();
        let dist = out.path().join("dist");
        assert!(set.write_to(&dist).is_err());
        assert!(!out.path().join("escape.txt").exists());
    }
}
