//! Unbundled development serving.
//!
//! Serves project sources and installed packages as native ES modules,
//! rewriting import specifiers on the way out and recording every import edge
//! in a [`ModuleGraph`].

pub mod client;
pub mod graph;
pub mod rewrite;
pub mod service;

pub use client::{
    hmr_client_script, inject_hmr_client, livereload_client_script, HMR_CLIENT_PATH,
    LIVERELOAD_CLIENT_PATH, LIVERELOAD_PATH,
};
pub use graph::{GraphSnapshot, ModuleGraph, ModuleNode, NodeSnapshot};
pub use rewrite::{
    classify, normalize_import, rewrite_imports, rewrite_specifier, wrap_css_as_js,
    wrap_json_as_js, RewriteContext, SpecifierKind, STYLE_TAG_ATTR,
};
pub use service::{content_type_for, DevService, ServedFile, JS_CONTENT_TYPE};
