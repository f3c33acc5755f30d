use super::pkg_json_cache::PkgJsonCache;
use crate::error::{Error, Result};
use minivite_util::fs::{probe_extensions, read_to_string_lossy};
use minivite_util::path::{dirname, safe_join};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions tried, in order, for a sub-path without one.
pub const PROBE_EXTENSIONS: &[&str] = &[".js", ".mjs", ".ts"];

/// A package request split into name and sub-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    /// Package name, including the scope for scoped packages.
    pub name: String,
    /// Path inside the package, if any.
    pub sub_path: Option<String>,
}

/// Split `/@modules/<name>[/<sub-path>]` into its parts.
///
/// A first segment starting with `@` is a scope and takes the next segment
/// with it as the package name.
pub fn parse_module_request(url_path: &str, namespace: &str) -> Result<ModuleRequest> {
    let rest = url_path
        .strip_prefix(namespace)
        .ok_or_else(|| Error::resolution(format!("Invalid package request: {url_path}")))?;

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(Error::resolution(format!("Invalid package request: {url_path}")));
    }

    let name_len = if segments[0].starts_with('@') { 2 } else { 1 };
    let split = name_len.min(segments.len());
    let name = segments[..split].join("/");
    let sub_path = (segments.len() > split).then(|| segments[split..].join("/"));

    Ok(ModuleRequest { name, sub_path })
}

/// Pick the manifest entry for a package root.
///
/// Precedence: string `exports`, string `exports["."]`, `module`, string
/// `browser`, `main`, then a literal `index.js`. Returns the field that won
/// and its value.
#[must_use]
pub fn entry_field(manifest: &Value) -> (&'static str, String) {
    let exports = manifest.get("exports");
    let candidates = [
        ("exports", exports.and_then(Value::as_str)),
        (
            "exports[\".\"]",
            exports
                .filter(|e| e.is_object())
                .and_then(|e| e.get("."))
                .and_then(Value::as_str),
        ),
        ("module", manifest.get("module").and_then(Value::as_str)),
        ("browser", manifest.get("browser").and_then(Value::as_str)),
        ("main", manifest.get("main").and_then(Value::as_str)),
    ];

    candidates
        .into_iter()
        .find_map(|(field, value)| {
            value
                .filter(|v| !v.is_empty())
                .map(|v| (field, v.to_string()))
        })
        .unwrap_or(("index.js", "index.js".to_string()))
}

/// A package file ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Package name.
    pub name: String,
    /// Concrete file on disk.
    pub file: PathBuf,
    /// Canonical request path of `file` (e.g. `/@modules/lodash-es/lodash.js`).
    pub url: String,
    /// URL directory that relative imports inside `file` resolve against.
    pub base: String,
}

/// Resolves package requests against an installed-package tree.
#[derive(Debug)]
pub struct PackageResolver {
    node_modules: PathBuf,
    namespace: String,
    cache: Box<dyn PkgJsonCache>,
}

impl PackageResolver {
    /// Create a resolver over `node_modules` that answers `namespace` requests.
    #[must_use]
    pub fn new(
        node_modules: PathBuf,
        namespace: impl Into<String>,
        cache: Box<dyn PkgJsonCache>,
    ) -> Self {
        Self {
            node_modules,
            namespace: namespace.into(),
            cache,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolve a full `/@modules/...` request path.
    pub fn resolve_request(&self, url_path: &str) -> Result<ResolvedPackage> {
        let request = parse_module_request(url_path, &self.namespace)?;
        self.resolve(&request.name, request.sub_path.as_deref())
    }

    /// Resolve `name` and an optional sub-path to the file to serve.
    pub fn resolve(&self, name: &str, sub_path: Option<&str>) -> Result<ResolvedPackage> {
        let pkg_dir = safe_join(&self.node_modules, name);
        let manifest_path = pkg_dir.join("package.json");
        if !manifest_path.is_file() {
            return Err(Error::resolution(format!(
                "Cannot find package.json for {name}"
            )));
        }
        let manifest = self.read_manifest(&manifest_path, name)?;

        let file = match sub_path.filter(|s| !s.is_empty()) {
            Some(sub) => {
                let target = safe_join(&pkg_dir, sub);
                if target.extension().is_some() {
                    target
                } else {
                    probe_extensions(&target, PROBE_EXTENSIONS).ok_or_else(|| {
                        Error::resolution(format!(
                            "Cannot resolve {name}/{sub}: no {} file",
                            PROBE_EXTENSIONS.join(", ")
                        ))
                    })?
                }
            }
            None => {
                let (field, entry) = entry_field(&manifest);
                debug!(package = name, field, entry = %entry, "Package entry selected");
                resolve_entry_file(&safe_join(&pkg_dir, &entry)).ok_or_else(|| {
                    Error::resolution(format!(
                        "Entry \"{entry}\" ({field}) of {name} does not exist"
                    ))
                })?
            }
        };

        let url = self.file_url(name, &pkg_dir, &file);
        let base = dirname(&url).to_string();
        Ok(ResolvedPackage {
            name: name.to_string(),
            file,
            url,
            base,
        })
    }

    fn read_manifest(&self, path: &Path, name: &str) -> Result<Value> {
        if let Some(value) = self.cache.get(path) {
            return Ok(value);
        }
        let text = read_to_string_lossy(path)?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| Error::resolution(format!("Invalid package.json for {name}: {e}")))?;
        self.cache.set(path, value.clone());
        Ok(value)
    }

    fn file_url(&self, name: &str, pkg_dir: &Path, file: &Path) -> String {
        let mut url = format!("{}{name}", self.namespace);
        if let Ok(rel) = file.strip_prefix(pkg_dir) {
            for component in rel.components() {
                url.push('/');
                url.push_str(&component.as_os_str().to_string_lossy());
            }
        }
        url
    }
}

/// Entry points may omit the extension or name a directory.
fn resolve_entry_file(target: &Path) -> Option<PathBuf> {
    if target.is_file() {
        return Some(target.to_path_buf());
    }
    if target.is_dir() {
        let index = target.join("index.js");
        return index.is_file().then_some(index);
    }
    if target.extension().is_none() {
        return probe_extensions(target, PROBE_EXTENSIONS);
    }
    None
}
