//! The bundler engine seam.
//!
//! packwire never resolves modules or runs loaders itself. A [`BundlerEngine`]
//! receives the assembled [`BuildConfig`] and returns a [`Compilation`]: the
//! chunks it produced, other emitted assets, and any diagnostics. Naming,
//! HTML injection and the other post-emit steps happen in [`crate::emit`].
//!
//! ## Process engine protocol
//!
//! [`ProcessEngine`] runs an external program with:
//!
//! - `PACKWIRE_CONFIG`: path of the serialized `BuildConfig` (JSON)
//! - `PACKWIRE_OUT`: empty directory for outputs
//!
//! and expects `$PACKWIRE_OUT/manifest.json`:
//!
//! ```json
//! {
//!   "chunks": [
//!     { "id": 0, "name": "vendor", "js": "vendor.js" },
//!     { "id": 1, "name": "app", "entry": true, "js": "app.js", "css": "app.css", "dependsOn": ["vendor"] }
//!   ],
//!   "assets": [ { "name": "static/img/logo.1a2b3c4.png", "file": "logo.png" } ],
//!   "errors": [],
//!   "warnings": []
//! }
//! ```
//!
//! File references are relative to `PACKWIRE_OUT`.

use crate::error::{Error, Result};
use crate::pipeline::BuildConfig;
use packwire_util::hash::blake3_parts;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// A code chunk produced by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub id: u32,
    pub name: String,
    /// Whether this chunk is an entry point (named by `output.filename`).
    pub entry: bool,
    pub js: Vec<u8>,
    /// Stylesheet content gathered for this chunk, if any.
    pub css: Option<Vec<u8>>,
    /// Names of chunks that must load before this one.
    pub depends_on: Vec<String>,
}

impl Chunk {
    /// An entry chunk.
    pub fn entry(id: u32, name: impl Into<String>, js: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            name: name.into(),
            entry: true,
            js: js.into(),
            ..Default::default()
        }
    }

    /// A non-entry (split or async) chunk.
    pub fn shared(id: u32, name: impl Into<String>, js: impl Into<Vec<u8>>) -> Self {
        Self {
            entry: false,
            ..Self::entry(id, name, js)
        }
    }

    #[must_use]
    pub fn with_css(mut self, css: impl Into<Vec<u8>>) -> Self {
        self.css = Some(css.into());
        self
    }

    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }
}

/// A non-chunk asset the engine emitted under its final name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    pub name: String,
    pub content: Vec<u8>,
}

/// Result of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compilation {
    pub chunks: Vec<Chunk>,
    pub assets: Vec<EmittedAsset>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Compilation {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Digest over every chunk and asset; changes whenever any output changes.
    #[must_use]
    pub fn hash(&self) -> String {
        let mut parts: Vec<&[u8]> = Vec::new();
        for chunk in &self.chunks {
            parts.push(chunk.name.as_bytes());
            parts.push(&chunk.js);
            parts.push(chunk.css.as_deref().unwrap_or_default());
        }
        for asset in &self.assets {
            parts.push(asset.name.as_bytes());
            parts.push(&asset.content);
        }
        blake3_parts(parts)
    }
}

/// Something that can compile a [`BuildConfig`].
///
/// Called from a blocking thread; implementations may block.
pub trait BundlerEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run one full compilation.
    ///
    /// Compile diagnostics go in [`Compilation::errors`]; `Err` is reserved
    /// for the engine itself failing to run.
    fn compile(&self, config: &BuildConfig) -> Result<Compilation>;
}

/// Engine backed by an external program (see the module docs for the protocol).
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    chunks: Vec<ManifestChunk>,
    #[serde(default)]
    assets: Vec<ManifestAsset>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestChunk {
    id: u32,
    name: String,
    #[serde(default)]
    entry: bool,
    js: PathBuf,
    css: Option<PathBuf>,
    #[serde(default)]
    depends_on: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestAsset {
    name: String,
    file: PathBuf,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::Engine {
            program: self.program.clone(),
            message: message.into(),
        }
    }

    fn read_output(&self, out: &Path, file: &Path) -> Result<Vec<u8>> {
        std::fs::read(out.join(file))
            .map_err(|e| self.fail(format!("missing output {}: {e}", file.display())))
    }

    fn read_manifest(&self, out: &Path) -> Result<Compilation> {
        let raw = std::fs::read_to_string(out.join("manifest.json"))
            .map_err(|e| self.fail(format!("no manifest.json in output: {e}")))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| self.fail(format!("invalid manifest.json: {e}")))?;

        let mut chunks = Vec::with_capacity(manifest.chunks.len());
        for chunk in manifest.chunks {
            let css = match &chunk.css {
                Some(file) => Some(self.read_output(out, file)?),
                None => None,
            };
            chunks.push(Chunk {
                id: chunk.id,
                name: chunk.name,
                entry: chunk.entry,
                js: self.read_output(out, &chunk.js)?,
                css,
                depends_on: chunk.depends_on,
            });
        }

        let mut assets = Vec::with_capacity(manifest.assets.len());
        for asset in manifest.assets {
            assets.push(EmittedAsset {
                content: self.read_output(out, &asset.file)?,
                name: asset.name,
            });
        }

        Ok(Compilation {
            chunks,
            assets,
            errors: manifest.errors,
            warnings: manifest.warnings,
        })
    }
}

impl BundlerEngine for ProcessEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn compile(&self, config: &BuildConfig) -> Result<Compilation> {
        let work = tempfile::tempdir()?;
        let config_path = work.path().join("config.json");
        let out = work.path().join("out");
        std::fs::create_dir_all(&out)?;

        let json = serde_json::to_vec_pretty(config)
            .map_err(|e| self.fail(format!("cannot serialize config: {e}")))?;
        std::fs::write(&config_path, json)?;

        debug!(program = %self.program, args = ?self.args, "running bundler engine");
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&config.context)
            .env("PACKWIRE_CONFIG", &config_path)
            .env("PACKWIRE_OUT", &out)
            .output()
            .map_err(|e| self.fail(format!("cannot start: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(self.fail(message));
        }

        self.read_manifest(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_compilation_hash_tracks_content() {
        let a = Compilation {
            chunks: vec![Chunk::entry(0, "app", "console.log(1)")],
            ..Default::default()
        };
        let mut b = a.clone();
        assert_eq!(a.hash(), b.hash());

        b.chunks[0].js = b"console.log(2)".to_vec();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_chunk_builders() {
        let chunk = Chunk::shared(2, "vendor", "v")
            .with_css("a{}")
            .depends_on("runtime");
        assert!(!chunk.entry);
        assert_eq!(chunk.css.as_deref(), Some(b"a{}".as_slice()));
        assert_eq!(chunk.depends_on, ["runtime"]);
    }

    #[test]
    fn test_read_manifest() {
        let out = tempdir().unwrap();
        std::fs::write(out.path().join("app.js"), "app()").unwrap();
        std::fs::write(out.path().join("app.css"), ".a{}").unwrap();
        std::fs::write(out.path().join("vendor.js"), "vendor()").unwrap();
        std::fs::write(out.path().join("logo.png"), [0x89, 0x50]).unwrap();
        std::fs::write(
            out.path().join("manifest.json"),
            r#"{
                "chunks": [
                    { "id": 0, "name": "vendor", "js": "vendor.js" },
                    { "id": 1, "name": "app", "entry": true, "js": "app.js",
                      "css": "app.css", "dependsOn": ["vendor"] }
                ],
                "assets": [ { "name": "static/img/logo.png", "file": "logo.png" } ],
                "warnings": ["large bundle"]
            }"#,
        )
        .unwrap();

        let engine = ProcessEngine::new("engine", vec![]);
        let compilation = engine.read_manifest(out.path()).unwrap();

        assert_eq!(compilation.chunks.len(), 2);
        assert!(!compilation.chunks[0].entry);
        assert_eq!(compilation.chunks[1].js, b"app()");
        assert_eq!(compilation.chunks[1].depends_on, ["vendor"]);
        assert_eq!(compilation.assets[0].content, [0x89, 0x50]);
        assert_eq!(compilation.warnings, ["large bundle"]);
        assert!(!compilation.has_errors());
    }

    #[test]
    fn test_read_manifest_missing_file() {
        let out = tempdir().unwrap();
        std::fs::write(
            out.path().join("manifest.json"),
            r#"{ "chunks": [ { "id": 0, "name": "app", "js": "gone.js" } ] }"#,
        )
        .unwrap();

        let engine = ProcessEngine::new("engine", vec![]);
        let err = engine.read_manifest(out.path()).unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
        assert!(err.to_string().contains("gone.js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_engine_failure_carries_stderr() {
        use crate::config::ProjectConfig;
        use crate::env::Mode;
        use crate::pipeline::base_config;

        let dir = tempdir().unwrap();
        let config = ProjectConfig::new(dir.path().to_path_buf());
        let build = base_config(&config, Mode::Production);

        let engine = ProcessEngine::new(
            "sh",
            vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()],
        );
        let err = engine.compile(&build).unwrap_err();
        assert!(err.to_string().contains("broken"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_engine_round_trip() {
        use crate::config::ProjectConfig;
        use crate::env::Mode;
        use crate::pipeline::base_config;

        let dir = tempdir().unwrap();
        let config = ProjectConfig::new(dir.path().to_path_buf());
        let build = base_config(&config, Mode::Production);

        let script = r#"
            test -s "$PACKWIRE_CONFIG" || exit 9
            printf 'main()' > "$PACKWIRE_OUT/app.js"
            printf '{"chunks":[{"id":0,"name":"app","entry":true,"js":"app.js"}]}' \
                > "$PACKWIRE_OUT/manifest.json"
        "#;
        let engine = ProcessEngine::new("sh", vec!["-c".to_string(), script.to_string()]);
        let compilation = engine.compile(&build).unwrap();
        assert_eq!(compilation.chunks[0].js, b"main()");
    }
}
