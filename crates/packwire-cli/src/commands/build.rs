//! `packwire build` command implementation.

use super::engine_for;
use miette::{miette, IntoDiagnostic, Result};
use packwire_core::emit::report::{format_size, BundleReport};
use packwire_core::{
    base_config, build_prod_config, finalize, load_template, AssetSet, BundlerEngine, Environment,
    Mode, ProjectConfig,
};
use packwire_util::fs::join_within;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    pub cwd: PathBuf,
    pub config: Option<PathBuf>,
    /// Force `bundleAnalyzerReport` on.
    pub report: bool,
    /// Force `productionGzip` on.
    pub gzip: bool,
}

/// Result printed with `--json`.
#[derive(Serialize)]
struct BuildResultJson<'a> {
    ok: bool,
    out_dir: String,
    hash: &'a str,
    duration_ms: u64,
    total_size: u64,
    report: &'a BundleReport,
    warnings: &'a [String],
}

pub fn run(action: BuildAction, json: bool) -> Result<()> {
    let start = Instant::now();

    let mut config = ProjectConfig::load(&action.cwd, action.config.as_deref()).into_diagnostic()?;
    config.build.production_gzip |= action.gzip;
    config.build.bundle_analyzer_report |= action.report;

    let env = Environment::from_process(&config)
        .into_diagnostic()?
        .with_node_env(Mode::Production.as_str());
    let build = build_prod_config(base_config(&config, Mode::Production), &config, &env);
    let engine = engine_for(&config)?;

    let out_dir = config.resolve(&config.build.assets_root);
    clean_sub_dir(&out_dir, &config.build.assets_sub_directory).into_diagnostic()?;

    info!(engine = engine.name(), out = %out_dir.display(), "building for production");
    let compilation = engine.compile(&build).into_diagnostic()?;
    for warning in &compilation.warnings {
        warn!("{warning}");
    }
    if compilation.has_errors() {
        for error in &compilation.errors {
            eprintln!("  {error}");
        }
        return Err(miette!(
            "build failed with {} error(s)",
            compilation.errors.len()
        ));
    }

    let template = load_template(&build).into_diagnostic()?;
    let assets = finalize(&build, &compilation, template.as_deref()).into_diagnostic()?;
    let written = assets.write_to(&out_dir).into_diagnostic()?;
    let report = report_for(&assets).into_diagnostic()?;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    info!(files = written, duration_ms, "build complete");

    if json {
        let result = BuildResultJson {
            ok: true,
            out_dir: out_dir.display().to_string(),
            hash: assets.hash(),
            duration_ms,
            total_size: report.total_size(),
            report: &report,
            warnings: assets.warnings(),
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        println!();
        print!("{}", report.table());
        println!();
        println!(
            "  Build complete in {duration_ms}ms: {} assets, {} total",
            report.assets.len(),
            format_size(report.total_size())
        );
        println!("  Output: {}", out_dir.display());
        println!();
    }

    Ok(())
}

/// Remove the previous build's assets sub-directory, resolved below `out_dir`.
///
/// An empty or `/` sub-directory resolves to `out_dir` itself and is kept.
fn clean_sub_dir(out_dir: &Path, sub: &str) -> std::io::Result<Option<PathBuf>> {
    let sub_dir = join_within(out_dir, Path::new(sub))?;
    if sub_dir == out_dir || !sub_dir.exists() {
        return Ok(None);
    }
    std::fs::remove_dir_all(&sub_dir)?;
    Ok(Some(sub_dir))
}

/// The bundle report from the build, or one measured on the spot.
fn report_for(assets: &AssetSet) -> std::io::Result<BundleReport> {
    if let Some(report) = assets.report() {
        return Ok(report.clone());
    }
    let files: BTreeMap<String, Vec<u8>> = assets
        .names()
        .filter_map(|name| assets.get(name).map(|c| (name.to_string(), c.to_vec())))
        .collect();
    BundleReport::measure(assets.hash(), &files)
}
