//! `packwire dev` command implementation.
//!
//! Starts the dev server, watches the source directory and the HTML template,
//! and recompiles on change until Ctrl-C.

use super::engine_for;
use miette::{IntoDiagnostic, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use packwire_core::{DevServer, DevServerOptions, Environment, ProjectConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Changes arriving within this window trigger a single recompile.
const DEBOUNCE: Duration = Duration::from_millis(50);

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    /// Project root.
    pub cwd: PathBuf,
    /// Explicit config file path (overrides `packwire.json` discovery).
    pub config: Option<PathBuf>,
    /// Port override.
    pub port: Option<u16>,
    /// Open the browser on first readiness (still subject to the config).
    pub open: bool,
}

pub async fn run(action: DevAction) -> Result<()> {
    let mut config = ProjectConfig::load(&action.cwd, action.config.as_deref()).into_diagnostic()?;
    if !action.open {
        config.dev.auto_open_browser = false;
    }

    let mut env = Environment::from_process(&config).into_diagnostic()?;
    if let Some(port) = action.port {
        env.port = port;
    }

    let engine = Arc::new(engine_for(&config)?);
    let watch_roots = vec![
        config.resolve(&config.app.src_dir),
        config.resolve(&config.app.template),
    ];

    let server = DevServer::start(DevServerOptions::new(config, env), engine)
        .await
        .into_diagnostic()?;

    let (change_tx, mut change_rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = watch_files(&watch_roots, change_tx)?;

    let url = server.ready().await;
    println!();
    println!("  Dev server running at {url}");
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(path) = change_rx.recv() => {
                tokio::time::sleep(DEBOUNCE).await;
                let mut changed = 1;
                while change_rx.try_recv().is_ok() {
                    changed += 1;
                }
                debug!(path = %path.display(), changed, "source change");
                server.invalidate();
            }
        }
    }

    info!("shutting down dev server");
    server.close().await.into_diagnostic()?;
    Ok(())
}

/// Check if a path should be ignored by the file watcher.
fn should_ignore(path: &Path) -> bool {
    let ignored_dir = path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("node_modules" | ".git" | "dist" | "target")
        )
    });
    if ignored_dir {
        return true;
    }

    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// Watch `roots` and forward relevant changed paths to `tx`.
///
/// Missing roots are skipped. The returned watcher must be kept alive.
fn watch_files(roots: &[PathBuf], tx: mpsc::Sender<PathBuf>) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
                    return;
                }
                for path in event.paths {
                    if should_ignore(&path) {
                        continue;
                    }
                    // A full queue already holds a pending recompile.
                    let _ = tx.try_send(path);
                }
            }
            Err(e) => warn!(error = %e, "watch error"),
        },
        Config::default(),
    )
    .into_diagnostic()?;

    for root in roots {
        if !root.exists() {
            debug!(path = %root.display(), "not watching missing path");
            continue;
        }
        let mode = if root.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(root, mode).into_diagnostic()?;
        debug!(path = %root.display(), "watching");
    }

    Ok(watcher)
}
