//! The dev server's request pipeline and shared state.
//!
//! ```text
//! GET /@modules/<pkg>[/<sub>] → resolve → read → rewrite (package base) → record edges
//!                              (.css / .json sub-paths are wrapped like source files)
//! GET /<path>.js|.mjs|.ts     → read → rewrite (bare only)               → record edges
//! GET /<path>.json            → wrap as default export
//! GET /<path>.css             → wrap as style injector (or raw text with ?raw)
//! GET /index.html             → inject the HMR client
//! ```
//!
//! The module graph, socket set and SSE set are process-wide and live here,
//! each behind its own lock. No lock is held across an `.await`. Path probing
//! and manifest reads are blocking, so they run on tokio's blocking pool.

use super::client::inject_hmr_client;
use super::graph::{GraphSnapshot, ModuleGraph};
use super::rewrite::{rewrite_imports, wrap_css_as_js, wrap_json_as_js, RewriteContext};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hmr::Notifier;
use crate::resolver::{PackageResolver, StampedPkgJsonCache, PROBE_EXTENSIONS};
use crate::transport::{SocketHub, SseHub};
use bytes::Bytes;
use minivite_util::fs::probe_extensions;
use minivite_util::path::{normalize, safe_join};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Content type of every module response.
pub const JS_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "ts", "jsx", "tsx"];

/// A response body ready to send.
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub body: Bytes,
    pub content_type: &'static str,
    /// File the body was produced from.
    pub file: PathBuf,
}

impl ServedFile {
    fn module(code: String, file: PathBuf) -> Self {
        Self {
            body: Bytes::from(code),
            content_type: JS_CONTENT_TYPE,
            file,
        }
    }
}

/// Owns everything a running dev server shares between requests.
#[derive(Debug)]
pub struct DevService {
    config: Config,
    root: PathBuf,
    resolver: Arc<PackageResolver>,
    graph: Mutex<ModuleGraph>,
    sockets: Arc<SocketHub>,
    sse: Arc<SseHub>,
}

impl DevService {
    /// Build the service for `config`. The root must exist.
    pub fn new(config: Config) -> Result<Self> {
        let root = dunce::canonicalize(&config.root)?;
        let resolver = Arc::new(PackageResolver::new(
            config.node_modules_dir(),
            config.namespace.clone(),
            Box::new(StampedPkgJsonCache::new()),
        ));
        let graph = ModuleGraph::new(config.namespace.clone());

        Ok(Self {
            config,
            root,
            resolver,
            graph: Mutex::new(graph),
            sockets: Arc::new(SocketHub::new()),
            sse: Arc::new(SseHub::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Canonical served root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn sockets(&self) -> &Arc<SocketHub> {
        &self.sockets
    }

    #[must_use]
    pub fn sse(&self) -> &Arc<SseHub> {
        &self.sse
    }

    /// Start a [`Notifier`] pushing to this service's connections.
    #[must_use]
    pub fn spawn_notifier(&self) -> Notifier {
        Notifier::spawn(
            self.root.clone(),
            self.config.debounce(),
            Arc::clone(&self.sockets),
            Arc::clone(&self.sse),
        )
    }

    /// Whether `url_path` names a package under the namespace.
    #[must_use]
    pub fn is_package_request(&self, url_path: &str) -> bool {
        url_path.starts_with(self.resolver.namespace())
    }

    /// Serve any request path, package or source.
    pub async fn serve(&self, url_path: &str, raw: bool) -> Result<ServedFile> {
        if self.is_package_request(url_path) {
            self.serve_package(url_path, raw).await
        } else {
            self.serve_source(url_path, raw).await
        }
    }

    /// Resolve, read and rewrite a package file.
    ///
    /// Relative imports inside it are pinned to the package's URL directory,
    /// and its edges are recorded under the request path. Stylesheets and
    /// JSON inside a package are wrapped the same way project files are.
    pub async fn serve_package(&self, url_path: &str, raw: bool) -> Result<ServedFile> {
        let resolver = Arc::clone(&self.resolver);
        let request = url_path.to_string();
        let resolved = run_blocking(move || resolver.resolve_request(&request)).await?;
        let source = read_text(&resolved.file).await?;
        let url = normalize(url_path);

        let served = match extension_of(&resolved.file).as_str() {
            "css" if raw => ServedFile {
                body: Bytes::from(source),
                content_type: "text/css; charset=utf-8",
                file: resolved.file,
            },
            "css" => {
                self.graph().ensure(&url);
                ServedFile::module(wrap_css_as_js(&source, &url), resolved.file)
            }
            "json" => {
                self.graph().ensure(&url);
                ServedFile::module(wrap_json_as_js(&source), resolved.file)
            }
            _ => {
                let ctx = RewriteContext::package(&self.config.namespace, &resolved.base);
                let code = rewrite_imports(&source, &ctx);
                self.graph().record_from_code(&url, &code);
                ServedFile::module(code, resolved.file)
            }
        };

        debug!(url = %url, file = %served.file.display(), "Served package module");
        Ok(served)
    }

    /// Serve a file under the root.
    ///
    /// `raw` returns stylesheets as plain CSS instead of a style module.
    pub async fn serve_source(&self, url_path: &str, raw: bool) -> Result<ServedFile> {
        let mut url = normalize(url_path);
        if !url.starts_with('/') {
            url.insert(0, '/');
        }
        if url.ends_with('/') {
            url.push_str("index.html");
        }

        let root = self.root.clone();
        let target = url.clone();
        let file = run_blocking(move || locate(&root, &target)).await?;
        let ext = extension_of(&file);

        let served = match ext.as_str() {
            e if SCRIPT_EXTENSIONS.contains(&e) => {
                let source = read_text(&file).await?;
                let code = rewrite_imports(&source, &RewriteContext::source(&self.config.namespace));
                self.graph().record_from_code(&url, &code);
                ServedFile::module(code, file)
            }
            "json" => {
                let json = read_text(&file).await?;
                self.graph().ensure(&url);
                ServedFile::module(wrap_json_as_js(&json), file)
            }
            "css" if raw => ServedFile {
                body: Bytes::from(read_text(&file).await?),
                content_type: "text/css; charset=utf-8",
                file,
            },
            "css" => {
                let css = read_text(&file).await?;
                self.graph().ensure(&url);
                ServedFile::module(wrap_css_as_js(&css, &url), file)
            }
            "html" => ServedFile {
                body: Bytes::from(inject_hmr_client(&read_text(&file).await?)),
                content_type: "text/html; charset=utf-8",
                file,
            },
            other => ServedFile {
                body: Bytes::from(tokio::fs::read(&file).await?),
                content_type: content_type_for(other),
                file,
            },
        };

        debug!(url = %url, content_type = served.content_type, "Served source file");
        Ok(served)
    }

    /// Snapshot of the module graph.
    #[must_use]
    pub fn graph_snapshot(&self) -> GraphSnapshot {
        self.graph().snapshot()
    }

    /// Run `f` against the current graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&ModuleGraph) -> R) -> R {
        f(&self.graph())
    }

    fn graph(&self) -> MutexGuard<'_, ModuleGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a request path to an existing file under `root`, probing script
/// extensions for extension-less paths.
fn locate(root: &Path, url: &str) -> Result<PathBuf> {
    let file = safe_join(root, url);
    if file.is_file() {
        return Ok(file);
    }
    if file.extension().is_none() {
        if let Some(found) = probe_extensions(&file, PROBE_EXTENSIONS) {
            return Ok(found);
        }
    }
    Err(Error::NotFound(url.to_string()))
}

/// Run filesystem-bound work off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::other(format!("Blocking task failed: {e}")))?
}

fn extension_of(file: &Path) -> String {
    file.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

async fn read_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Content type for static files by extension.
#[must_use]
pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => JS_CONTENT_TYPE,
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
