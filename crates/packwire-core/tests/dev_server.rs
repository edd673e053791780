//! Integration tests for the dev server.
//!
//! A stub engine stands in for the bundler; an axum app plays the backend the
//! proxy table points at.

use axum::routing::get;
use axum::Router;
use packwire_core::dev::ProxyEntry;
use packwire_core::{
    BuildConfig, BundlerEngine, Chunk, Compilation, DevServer, DevServerOptions, Environment,
    ProjectConfig, ServerState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TEMPLATE: &str = "<!DOCTYPE html><html><head><title>demo</title></head>\
                        <body><div id=\"app\"></div></body></html>";

/// Counts compiles; each compile yields an entry chunk tagged with the count.
#[derive(Default)]
struct StubEngine {
    compiles: AtomicUsize,
    errors: Vec<String>,
}

impl StubEngine {
    fn failing(error: &str) -> Self {
        Self {
            errors: vec![error.to_string()],
            ..Default::default()
        }
    }

    fn count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl BundlerEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn compile(&self, _config: &BuildConfig) -> packwire_core::Result<Compilation> {
        let n = self.compiles.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Compilation {
            chunks: vec![Chunk::entry(0, "app", format!("app({n})"))],
            errors: self.errors.clone(),
            ..Default::default()
        })
    }
}

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("public")).unwrap();
    std::fs::write(dir.path().join("public/index.html"), TEMPLATE).unwrap();
    std::fs::create_dir_all(dir.path().join("static")).unwrap();
    std::fs::write(dir.path().join("static/robots.txt"), "User-agent: *").unwrap();
    dir
}

fn options(dir: &TempDir, edit: impl FnOnce(&mut ProjectConfig)) -> DevServerOptions {
    let mut config = ProjectConfig::new(dir.path().to_path_buf());
    config.dev.auto_open_browser = false;
    config.dev.host = "127.0.0.1".to_string();
    edit(&mut config);
    let env = Environment {
        node_env: "testing".to_string(),
        port: 0,
    };
    DevServerOptions::new(config, env)
}

async fn start(dir: &TempDir, engine: Arc<StubEngine>) -> DevServer {
    DevServer::start(options(dir, |_| {}), engine).await.unwrap()
}

#[tokio::test]
async fn test_ready_resolves_once_and_serves_assets() {
    let dir = project();
    let engine = Arc::new(StubEngine::default());
    let server = start(&dir, engine.clone()).await;

    let url = server.ready().await;
    assert_eq!(server.state(), ServerState::Ready);
    assert_eq!(engine.count(), 1);
    assert_eq!(server.ready().await, url);
    assert_eq!(engine.count(), 1);

    let resp = reqwest::get(format!("{url}/app.js")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/javascript"));
    assert_eq!(resp.text().await.unwrap(), "app(1)");

    let encoded = reqwest::get(format!("{url}/%61pp.js")).await.unwrap();
    assert_eq!(encoded.status(), 200);

    let index = reqwest::get(format!("{url}/")).await.unwrap();
    assert_eq!(index.status(), 200);
    let html = index.text().await.unwrap();
    assert!(html.contains("<script type=\"text/javascript\" src=\"/app.js\"></script>"));

    let missing = reqwest::get(format!("{url}/missing.js")).await.unwrap();
    assert_eq!(missing.status(), 404);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_history_fallback_and_static_files() {
    let dir = project();
    let server = start(&dir, Arc::new(StubEngine::default())).await;
    let url = server.ready().await;
    let client = reqwest::Client::new();

    let route = client
        .get(format!("{url}/users/42"))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(route.status(), 200);
    assert!(route.text().await.unwrap().contains("<title>demo</title>"));

    let json = client
        .get(format!("{url}/users/42"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(json.status(), 404);

    let robots = client
        .get(format!("{url}/static/robots.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(robots.status(), 200);
    assert_eq!(robots.text().await.unwrap(), "User-agent: *");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_proxy_forwards_and_reports_bad_gateway() {
    let upstream = Router::new().route("/api/hello", get(|| async { "from upstream" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    // Bind and drop to get a port nothing listens on.
    let dead_port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };

    let dir = project();
    let options = options(&dir, |config| {
        config.dev.proxy_table.insert(
            "/api",
            ProxyEntry::Target(format!("http://{upstream_addr}")),
        );
        config.dev.proxy_table.insert(
            "/down",
            ProxyEntry::Target(format!("http://127.0.0.1:{dead_port}")),
        );
    });
    let server = DevServer::start(options, Arc::new(StubEngine::default()))
        .await
        .unwrap();
    let url = server.ready().await;

    let resp = reqwest::get(format!("{url}/api/hello")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "from upstream");

    let down = reqwest::get(format!("{url}/down/x")).await.unwrap();
    assert_eq!(down.status(), 502);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_template_change_publishes_reload() {
    let dir = project();
    let engine = Arc::new(StubEngine::default());
    let server = start(&dir, engine.clone()).await;
    let url = server.ready().await;

    let mut events = reqwest::get(format!("{url}/__webpack_hmr")).await.unwrap();
    assert_eq!(events.status(), 200);
    assert!(events.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    std::fs::write(
        dir.path().join("public/index.html"),
        TEMPLATE.replace("demo", "changed"),
    )
    .unwrap();
    server.invalidate();

    let mut seen = String::new();
    let outcome = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(chunk) = events.chunk().await.unwrap() {
            seen.push_str(&String::from_utf8_lossy(&chunk));
            if seen.contains(r#""action":"reload""#) {
                return;
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "timed out; got {seen}");
    assert!(seen.contains(r#""action":"reload""#), "{seen}");
    assert!(seen.contains(r#""action":"building""#));
    assert!(seen.contains(r#""action":"built""#));
    assert_eq!(engine.count(), 2);

    let html = reqwest::get(format!("{url}/index.html"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("<title>changed</title>"));

    drop(events);
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_first_compile_still_becomes_ready() {
    let dir = project();
    let engine = Arc::new(StubEngine::failing("Module not found: ./missing"));
    let server = start(&dir, engine.clone()).await;

    let url = server.ready().await;
    assert_eq!(server.state(), ServerState::Ready);
    assert_eq!(engine.count(), 1);

    // Nothing emitted, nothing served.
    let resp = reqwest::get(format!("{url}/app.js")).await.unwrap();
    assert_eq!(resp.status(), 404);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_close_refuses_connections() {
    let dir = project();
    let server = start(&dir, Arc::new(StubEngine::default())).await;
    let url = server.ready().await;
    assert!(reqwest::get(format!("{url}/app.js")).await.is_ok());

    server.close().await.unwrap();

    let after = reqwest::Client::new()
        .get(format!("{url}/app.js"))
        .timeout(Duration::from_secs(5))
        .send()
        .await;
    assert!(after.is_err());
}
