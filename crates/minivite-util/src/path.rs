//! POSIX-style URL path helpers.
//!
//! Request paths and import specifiers always use `/` separators regardless of
//! the host platform, so these helpers work on plain strings instead of
//! [`std::path::Path`].

use std::path::{Path, PathBuf};

/// Normalize a `/`-separated path: collapse repeated separators, drop `.`
/// segments and resolve `..` against the preceding segment.
///
/// Absolute paths never climb above `/`. Relative paths keep leading `..`
/// segments. A trailing separator is preserved. An empty result is `"."`.
#[must_use]
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut out = segments.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if out.is_empty() {
        out.push('.');
    }
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Join `spec` onto `base` and normalize the result.
#[must_use]
pub fn join(base: &str, spec: &str) -> String {
    if base.is_empty() {
        return normalize(spec);
    }
    normalize(&format!("{base}/{spec}"))
}

/// Directory part of a `/`-separated path.
///
/// `"/src/main.js"` → `"/src"`, `"/main.js"` → `"/"`, `"main.js"` → `"."`.
#[must_use]
pub fn dirname(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None if path.starts_with('/') => "/",
        None => ".",
    }
}

/// Join a request path onto `root` without ever escaping it.
///
/// The path is normalized, backslashes are treated as separators and leading
/// `..` segments are stripped before each remaining segment is appended to
/// `root`.
#[must_use]
pub fn safe_join(root: &Path, url_path: &str) -> PathBuf {
    let normalized = normalize(&url_path.replace('\\', "/"));
    let mut rest = normalized.as_str();
    while let Some(stripped) = rest.strip_prefix("../") {
        rest = stripped;
    }
    if rest == ".." {
        rest = "";
    }

    let mut out = root.to_path_buf();
    for segment in rest.split('/') {
        if !segment.is_empty() && segment != "." {
            out.push(segment);
        }
    }
    out
}

/// Render a path relative to `root` as a request path (`/src/main.js`).
///
/// Returns `None` when `path` is not under `root`.
#[must_use]
pub fn to_url_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut url = String::new();
    for component in rel.components() {
        url.push('/');
        url.push_str(&component.as_os_str().to_string_lossy());
    }
    if url.is_empty() {
        url.push('/');
    }
    Some(url)
}
