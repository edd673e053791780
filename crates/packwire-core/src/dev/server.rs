//! The development server.
//!
//! ```text
//! request ─┬─ /__webpack_hmr ──────────────► hot event stream (SSE)
//!          ├─ proxy table match ───────────► upstream (reqwest)
//!          ├─ history fallback ─ rewrite ──┐
//!          ├─ in-memory assets ◄───────────┘ (waits for the first compile)
//!          ├─ <publicPath>/<static>/… ─────► static directory (ServeDir)
//!          └─ 404
//!
//! invalidate() ──► compile loop: building → engine → emit → swap assets → built (→ reload)
//! ```

use super::browser::{open_browser, should_open};
use super::fallback::history_rewrite;
use super::hot::{HotEvent, HotHub, HOT_PATH};
use super::proxy::{self, match_rule, ProxyRule};
use crate::config::ProjectConfig;
use crate::emit::{self, AssetSet};
use crate::engine::{BundlerEngine, Compilation};
use crate::env::{Environment, Mode};
use crate::error::{Error, Result};
use crate::paths::{posix_join, public_path};
use crate::pipeline::{base_config, build_dev_config, BuildConfig};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

/// Lifecycle of a [`DevServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Listening, first compile not started yet.
    Starting,
    Compiling,
    /// Last compile finished; assets are being served.
    Ready,
    Closed,
}

/// Everything needed to start a dev server.
#[derive(Debug, Clone)]
pub struct DevServerOptions {
    pub config: ProjectConfig,
    pub env: Environment,
    /// Assembled development build config.
    pub build: BuildConfig,
}

impl DevServerOptions {
    /// Assemble the development build config for `config` and `env`.
    #[must_use]
    pub fn new(config: ProjectConfig, env: Environment) -> Self {
        let build = build_dev_config(base_config(&config, Mode::Development), &config, &env);
        Self { config, env, build }
    }
}

/// State shared by request handlers.
struct Shared {
    assets: RwLock<Option<AssetSet>>,
    public_path: String,
    index: String,
    static_mount: String,
    static_dir: PathBuf,
    rules: Vec<ProxyRule>,
    client: reqwest::Client,
    hot: HotHub,
    ready: watch::Receiver<bool>,
}

/// State owned by the compile loop.
struct Compiler {
    shared: Arc<Shared>,
    engine: Arc<dyn BundlerEngine>,
    build: Arc<BuildConfig>,
    state: Arc<watch::Sender<ServerState>>,
    ready: watch::Sender<bool>,
    url: String,
    open_browser: bool,
}

/// A running development server.
pub struct DevServer {
    addr: SocketAddr,
    url: String,
    state: Arc<watch::Sender<ServerState>>,
    ready: watch::Receiver<bool>,
    trigger: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
    compile_loop: JoinHandle<()>,
}

impl DevServer {
    /// Bind, start serving and kick off the first compile.
    ///
    /// Returns as soon as the listener is bound; await [`DevServer::ready`]
    /// for the first compile.
    pub async fn start(options: DevServerOptions, engine: Arc<dyn BundlerEngine>) -> Result<Self> {
        let DevServerOptions { config, env, build } = options;

        let rules = config.dev.proxy_table.rules()?;
        for rule in &rules {
            info!(context = %rule.context(), target = %rule.options().target, "proxy");
        }

        let host = if config.dev.host == "localhost" {
            "127.0.0.1".to_string()
        } else {
            config.dev.host.clone()
        };
        let bind_addr = format!("{host}:{}", env.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;
        let url = format!("http://{}:{}", config.dev.host, addr.port());

        info!(engine = engine.name(), "Starting dev server...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = watch::channel(false);
        let state = Arc::new(watch::Sender::new(ServerState::Starting));

        let public = public_path(&config, Mode::Development);
        let shared = Arc::new(Shared {
            assets: RwLock::new(None),
            index: format!("{public}index.html"),
            static_mount: posix_join(&[
                &config.dev.assets_public_path,
                &config.dev.assets_sub_directory,
            ]),
            public_path: public,
            static_dir: config.resolve(&config.app.static_dir),
            rules,
            client: proxy::client()?,
            hot: HotHub::new(shutdown_rx.clone()),
            ready: ready_rx.clone(),
        });

        let app = Router::new()
            .route(HOT_PATH, get(hot_stream))
            .fallback(dispatch)
            .with_state(shared.clone());

        let mut server_shutdown = shutdown_rx.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.wait_for(|closed| *closed).await;
                })
                .await
        });

        let (trigger, triggers) = mpsc::channel(1);
        let compiler = Compiler {
            shared,
            engine,
            build: Arc::new(build),
            state: state.clone(),
            ready: ready_tx,
            url: url.clone(),
            open_browser: should_open(config.dev.auto_open_browser, &env),
        };
        let compile_loop = tokio::spawn(compiler.run(triggers, shutdown_rx));

        // First compile.
        let _ = trigger.try_send(());

        Ok(Self {
            addr,
            url,
            state,
            ready: ready_rx,
            trigger,
            shutdown: shutdown_tx,
            server,
            compile_loop,
        })
    }

    /// Resolves with the server URL once the first compile has finished,
    /// successfully or not. Later calls return immediately.
    pub async fn ready(&self) -> String {
        let mut ready = self.ready.clone();
        let _ = ready.wait_for(|done| *done).await;
        self.url.clone()
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a recompile. Requests made while one is already queued coalesce.
    pub fn invalidate(&self) {
        if self.trigger.try_send(()).is_ok() {
            debug!("recompile queued");
        }
    }

    /// Stop accepting connections, end hot streams and wait for the server.
    pub async fn close(self) -> Result<()> {
        self.shutdown.send_replace(true);
        self.state.send_replace(ServerState::Closed);

        let served = self.server.await;
        self.compile_loop.abort();
        let _ = self.compile_loop.await;

        info!("Dev server closed");
        match served {
            Ok(result) => result.map_err(Error::from),
            Err(e) => Err(Error::other(format!("dev server task failed: {e}"))),
        }
    }
}

// ============================================================================
// Compile loop
// ============================================================================

impl Compiler {
    async fn run(self, mut triggers: mpsc::Receiver<()>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                trigger = triggers.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                }
            }
            self.compile_once().await;
        }
        debug!("compile loop stopped");
    }

    async fn compile_once(&self) {
        self.set_state(ServerState::Compiling);
        self.shared.hot.publish(HotEvent::Building);

        let engine = self.engine.clone();
        let build = self.build.clone();
        let outcome = tokio::task::spawn_blocking(move || compile_and_emit(engine.as_ref(), &build))
            .await
            .unwrap_or_else(|e| Outcome::EngineFailed(format!("compile task panicked: {e}")));

        match outcome {
            Outcome::Emitted(compilation, assets) => {
                for error in &compilation.errors {
                    warn!(%error, "compile error");
                }
                for warning in &compilation.warnings {
                    warn!(%warning, "compile warning");
                }
                let html_changed = {
                    let mut current = self.shared.assets.write().await;
                    let changed = current.as_ref().and_then(AssetSet::html_document)
                        != assets.html_document();
                    *current = Some(assets);
                    changed
                };
                self.shared.hot.publish(HotEvent::Built {
                    hash: compilation.hash(),
                    errors: compilation.errors,
                    warnings: compilation.warnings,
                });
                if html_changed {
                    self.shared.hot.publish(HotEvent::Reload);
                }
            }
            Outcome::Rejected(compilation) => {
                for error in &compilation.errors {
                    warn!(%error, "compile error; keeping previous assets");
                }
                self.shared.hot.publish(HotEvent::Built {
                    hash: compilation.hash(),
                    errors: compilation.errors,
                    warnings: compilation.warnings,
                });
            }
            Outcome::EngineFailed(message) => {
                warn!(error = %message, "bundler engine failed");
                self.shared.hot.publish(HotEvent::Built {
                    hash: String::new(),
                    errors: vec![message],
                    warnings: vec![],
                });
            }
        }

        self.set_state(ServerState::Ready);
        let first = self.ready.send_if_modified(|done| !std::mem::replace(done, true));
        if first {
            info!(url = %self.url, "Listening at {}", self.url);
            if self.open_browser {
                if let Err(e) = open_browser(&self.url) {
                    warn!(error = %e, "could not open browser");
                }
            }
        }
    }

    fn set_state(&self, next: ServerState) {
        self.state.send_if_modified(|state| {
            if *state == ServerState::Closed || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

enum Outcome {
    Emitted(Compilation, AssetSet),
    /// Compiled with errors; nothing emitted.
    Rejected(Compilation),
    EngineFailed(String),
}

fn compile_and_emit(engine: &dyn BundlerEngine, build: &BuildConfig) -> Outcome {
    let compilation = match engine.compile(build) {
        Ok(compilation) => compilation,
        Err(e) => return Outcome::EngineFailed(e.to_string()),
    };
    let template = match emit::load_template(build) {
        Ok(template) => template,
        Err(e) => return Outcome::EngineFailed(e.to_string()),
    };
    match emit::finalize(build, &compilation, template.as_deref()) {
        Ok(assets) => Outcome::Emitted(compilation, assets),
        Err(Error::CompileFailed { .. }) => Outcome::Rejected(compilation),
        Err(e) => Outcome::EngineFailed(e.to_string()),
    }
}

// ============================================================================
// Request handling
// ============================================================================

async fn hot_stream(State(shared): State<Arc<Shared>>) -> impl IntoResponse {
    shared.hot.sse()
}

async fn dispatch(State(shared): State<Arc<Shared>>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    debug!(method = %req.method(), %path, "request");

    if let Some(rule) = match_rule(&shared.rules, &path) {
        return proxy::forward(&shared.client, rule, req).await;
    }

    let path = history_rewrite(req.method(), req.headers(), &path, &shared.index).unwrap_or(path);

    if let Some(response) = serve_asset(&shared, req.method(), &path).await {
        return response;
    }

    if let Some(rest) = strip_mount(&path, &shared.static_mount) {
        return serve_static(&shared, req, rest).await;
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Asset name for `path` below the public path; directories map to `index.html`.
/// In-memory asset name for a request path: percent-decoded, public path
/// stripped, directories mapped to their `index.html`.
fn asset_name(path: &str, public_path: &str) -> Option<String> {
    let decoded = urlencoding::decode(path).ok()?;
    let name = decoded.strip_prefix(public_path)?;
    if name.is_empty() || name.ends_with('/') {
        Some(format!("{name}index.html"))
    } else {
        Some(name.to_string())
    }
}

async fn serve_asset(shared: &Shared, method: &Method, path: &str) -> Option<Response> {
    if method != Method::GET && method != Method::HEAD {
        return None;
    }
    let name = asset_name(path, &shared.public_path)?;

    let mut ready = shared.ready.clone();
    let _ = ready.wait_for(|done| *done).await;

    let assets = shared.assets.read().await;
    let content = assets.as_ref()?.get(&name)?.to_vec();

    let mut response = Response::new(if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(content)
    });
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type(&name)),
    );
    Some(response)
}

fn strip_mount<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(mount.trim_end_matches('/'))?;
    rest.starts_with('/').then_some(rest)
}

async fn serve_static(shared: &Shared, req: Request, rest: &str) -> Response {
    let (mut parts, body) = req.into_parts();
    let rewritten = match parts.uri.query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_string(),
    };
    parts.uri = match rewritten.parse::<Uri>() {
        Ok(uri) => uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let req = Request::from_parts(parts, body);
    match ServeDir::new(&shared.static_dir).oneshot(req).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

fn content_type(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("");
    match ext {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
