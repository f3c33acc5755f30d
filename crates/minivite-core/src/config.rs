//! Dev server configuration.
//!
//! Loaded from an optional `minivite.config.json` in the served root:
//!
//! ```json
//! {
//!   "server": { "port": 3000, "host": "localhost" },
//!   "hmr": { "path": "/__hmr", "debounceMs": 30 },
//!   "resolve": { "namespace": "/@modules/", "nodeModules": "node_modules" }
//! }
//! ```
//!
//! Every key is optional. CLI flags override file values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "minivite.config.json";

/// Default namespace that bare package requests are rewritten under.
pub const DEFAULT_NAMESPACE: &str = "/@modules/";

/// Default reserved path for the HMR WebSocket.
pub const DEFAULT_HMR_PATH: &str = "/__hmr";

/// Default debounce window for file change bursts.
pub const DEFAULT_DEBOUNCE_MS: u64 = 30;

/// Runtime configuration for the dev server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory served at `/`.
    pub root: PathBuf,

    /// Port to listen on.
    pub port: u16,

    /// Host to bind to.
    pub host: String,

    /// Reserved path for the WebSocket upgrade.
    pub hmr_path: String,

    /// Window used to coalesce file change bursts.
    pub debounce_ms: u64,

    /// Request prefix for bare package imports (always `/`-delimited).
    pub namespace: String,

    /// Installed-package tree, relative to `root`.
    pub node_modules: PathBuf,

    /// Config file this value was loaded from, if any.
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            port: 3000,
            host: "localhost".to_string(),
            hmr_path: DEFAULT_HMR_PATH.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            namespace: DEFAULT_NAMESPACE.to_string(),
            node_modules: PathBuf::from("node_modules"),
            config_file: None,
        }
    }
}

impl Config {
    /// Create a new config serving the given root.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    /// Set the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the debounce window in milliseconds.
    #[must_use]
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Debounce window as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Absolute path of the installed-package tree.
    #[must_use]
    pub fn node_modules_dir(&self) -> PathBuf {
        if self.node_modules.is_absolute() {
            self.node_modules.clone()
        } else {
            self.root.join(&self.node_modules)
        }
    }

    /// Overlay values from a parsed config file.
    fn apply(&mut self, file: ConfigFile) {
        if let Some(port) = file.server.port {
            self.port = port;
        }
        if let Some(host) = file.server.host {
            self.host = host;
        }
        if let Some(path) = file.hmr.path {
            self.hmr_path = if path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            };
        }
        if let Some(ms) = file.hmr.debounce_ms {
            self.debounce_ms = ms;
        }
        if let Some(ns) = file.resolve.namespace {
            self.namespace = normalize_namespace(&ns);
        }
        if let Some(dir) = file.resolve.node_modules {
            self.node_modules = dir;
        }
    }
}

/// Force a namespace into `/name/` form.
fn normalize_namespace(ns: &str) -> String {
    let trimmed = ns.trim_matches('/');
    if trimmed.is_empty() {
        DEFAULT_NAMESPACE.to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// On-disk shape of `minivite.config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    hmr: HmrSection,
    #[serde(default)]
    resolve: ResolveSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    port: Option<u16>,
    host: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HmrSection {
    path: Option<String>,
    debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveSection {
    namespace: Option<String>,
    node_modules: Option<PathBuf>,
}

/// Find the config file in `root`.
#[must_use]
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    let path = root.join(CONFIG_FILE);
    path.is_file().then_some(path)
}

/// Load configuration for `root`.
///
/// If `config_path` is `Some`, that file must exist. Otherwise the default
/// file name is looked up in `root` and defaults are used when it is absent.
pub fn load_config(root: &Path, config_path: Option<&Path>) -> Result<Config> {
    let mut config = Config::new(root.to_path_buf());

    let path = match config_path {
        Some(p) => {
            let abs = if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            };
            if !abs.is_file() {
                return Err(Error::ConfigRead {
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "config file does not exist",
                    ),
                    path: abs,
                });
            }
            abs
        }
        None => match find_config_file(root) {
            Some(p) => p,
            None => return Ok(config),
        },
    };

    let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
        path: path.clone(),
        source,
    })?;
    let file: ConfigFile = serde_json::from_str(&source).map_err(|source| Error::ConfigParse {
        path: path.clone(),
        source,
    })?;

    config.apply(file);
    config.config_file = Some(path);
    Ok(config)
}
