//! `minivite dev` command implementation.
//!
//! Serves a project directory as native ES modules and pushes change
//! notifications to connected pages:
//!
//! ```text
//! GET /                  → index.html (HMR client injected)
//! GET /<hmr path>        → WebSocket upgrade (hand-rolled handshake)
//! GET /__livereload      → SSE stream, `data: reload` per full reload
//! GET /livereload.js     → SSE client script
//! GET /@hmr-client       → WebSocket client script
//! GET /__graph.json      → module graph snapshot
//! GET /@modules/<pkg>... → resolved package module
//! GET /<path>            → project file (rewritten, wrapped or static)
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use hyper_util::rt::TokioIo;
use miette::{IntoDiagnostic, Result};
use minivite_core::dev::{
    hmr_client_script, livereload_client_script, HMR_CLIENT_PATH, JS_CONTENT_TYPE,
    LIVERELOAD_CLIENT_PATH, LIVERELOAD_PATH,
};
use minivite_core::hmr::{run_watch_loop, DirWatcher};
use minivite_core::transport::validate_handshake;
use minivite_core::{load_config, DevService, Error};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    /// Directory to serve.
    pub root: PathBuf,
    /// Port override.
    pub port: Option<u16>,
    /// Host override.
    pub host: Option<String>,
    /// Explicit config file path (overrides auto-discovery).
    pub config: Option<PathBuf>,
    /// Debounce window override, in milliseconds.
    pub debounce_ms: Option<u64>,
}

/// Run the dev server until Ctrl+C.
pub async fn run(action: DevAction) -> Result<()> {
    let root = action.root.canonicalize().into_diagnostic()?;

    let mut config = load_config(&root, action.config.as_deref()).into_diagnostic()?;
    if let Some(path) = &config.config_file {
        let rel = path.strip_prefix(&root).unwrap_or(path);
        println!("  Loaded config from {}", rel.display());
    }
    if let Some(port) = action.port {
        config = config.with_port(port);
    }
    if let Some(host) = action.host {
        config = config.with_host(host);
    }
    if let Some(ms) = action.debounce_ms {
        config = config.with_debounce_ms(ms);
    }

    let service = Arc::new(DevService::new(config).into_diagnostic()?);
    let config = service.config();

    match DirWatcher::start(service.root()) {
        Ok((watcher, events)) => {
            let notifier = service.spawn_notifier();
            tokio::spawn(run_watch_loop(watcher, events, notifier));
        }
        Err(e) => warn!(error = %e, "File watching disabled"),
    }

    let host_ip = if config.host == "localhost" {
        "127.0.0.1"
    } else {
        config.host.as_str()
    };
    let addr: SocketAddr = format!("{host_ip}:{}", config.port)
        .parse()
        .into_diagnostic()?;

    println!();
    println!("  Dev server running at http://{}:{}", config.host, config.port);
    println!("  Serving {}", service.root().display());
    println!("  HMR on ws://{}:{}{}", config.host, config.port, config.hmr_path);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    info!(%addr, "Listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    Ok(())
}

/// Build the HTTP surface over `service`.
pub fn router(service: Arc<DevService>) -> Router {
    let hmr_path = service.config().hmr_path.clone();

    Router::new()
        .route("/", get(serve_file))
        .route(&hmr_path, get(hmr_upgrade))
        .route(LIVERELOAD_PATH, get(livereload_stream))
        .route(LIVERELOAD_CLIENT_PATH, get(serve_livereload_client))
        .route(HMR_CLIENT_PATH, get(serve_hmr_client))
        .route("/__graph.json", get(serve_graph))
        .route("/*path", get(serve_file))
        .with_state(service)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Serve a package module or project file.
///
/// The path is percent-decoded; the query is only checked for `raw`.
async fn serve_file(State(service): State<Arc<DevService>>, uri: Uri) -> Response {
    let Ok(path) = urlencoding::decode(uri.path()) else {
        return (StatusCode::BAD_REQUEST, "Malformed request path").into_response();
    };
    let raw = uri.query().is_some_and(has_raw_flag);

    match service.serve(&path, raw).await {
        Ok(file) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, file.content_type),
                (header::CACHE_CONTROL, "no-store"),
            ],
            file.body,
        )
            .into_response(),
        Err(e) => error_response(&path, &e),
    }
}

fn has_raw_flag(query: &str) -> bool {
    query
        .split('&')
        .any(|pair| pair == "raw" || pair.starts_with("raw="))
}

fn error_response(path: &str, error: &Error) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::NOT_FOUND {
        debug!(path, "Not found");
    } else {
        warn!(path, error = %error, "Request failed");
    }
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        error.to_string(),
    )
        .into_response()
}

/// Complete the WebSocket handshake and hand the upgraded socket to the hub.
///
/// A missing key or a version other than 13 is never upgraded. The handler
/// cannot drop the TCP connection itself, so the rejection is a bodiless 400
/// with `Connection: close`, after which the server closes the socket.
async fn hmr_upgrade(State(service): State<Arc<DevService>>, mut req: Request) -> Response {
    let headers = req.headers();
    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .and_then(|v| v.to_str().ok());
    let version = headers
        .get(header::SEC_WEBSOCKET_VERSION)
        .and_then(|v| v.to_str().ok());

    let accept = match validate_handshake(key, version) {
        Ok(accept) => accept,
        Err(e) => {
            debug!(error = %e, "Rejected upgrade");
            return (StatusCode::BAD_REQUEST, [(header::CONNECTION, "close")]).into_response();
        }
    };

    let on_upgrade = hyper::upgrade::on(&mut req);
    let hub = Arc::clone(service.sockets());
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let (reader, writer) = tokio::io::split(TokioIo::new(upgraded));
                hub.attach(reader, writer);
            }
            Err(e) => debug!(error = %e, "Upgrade did not complete"),
        }
    });

    (
        StatusCode::SWITCHING_PROTOCOLS,
        [
            (header::UPGRADE, "websocket"),
            (header::CONNECTION, "Upgrade"),
            (header::SEC_WEBSOCKET_ACCEPT, accept.as_str()),
        ],
    )
        .into_response()
}

/// Long-lived SSE stream; leaves the broadcast set when the client goes away.
async fn livereload_stream(State(service): State<Arc<DevService>>) -> Response {
    let stream = service
        .sse()
        .subscribe()
        .into_stream()
        .map(Ok::<_, Infallible>);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn serve_livereload_client() -> Response {
    (
        [
            (header::CONTENT_TYPE, JS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        livereload_client_script(),
    )
        .into_response()
}

async fn serve_hmr_client(State(service): State<Arc<DevService>>) -> Response {
    (
        [
            (header::CONTENT_TYPE, JS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        hmr_client_script(&service.config().hmr_path),
    )
        .into_response()
}

async fn serve_graph(State(service): State<Arc<DevService>>) -> Response {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(service.graph_snapshot()),
    )
        .into_response()
}
