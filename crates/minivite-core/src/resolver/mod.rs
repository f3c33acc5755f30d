//! Package resolver for bare imports.
//!
//! Maps `/@modules/<name>[/<sub-path>]` requests onto files inside the
//! installed-package tree, choosing ESM-friendly manifest entries first.

mod package;
mod pkg_json_cache;

pub use package::{
    entry_field, parse_module_request, ModuleRequest, PackageResolver, ResolvedPackage,
    PROBE_EXTENSIONS,
};
pub use pkg_json_cache::{
    CachedPkgJson, NoPkgJsonCache, PkgJsonCache, PkgJsonStamp, StampedPkgJsonCache,
};
