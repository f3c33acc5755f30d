#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Core of the minivite dev server: import scanning and rewriting, package
//! resolution, the module graph, change notification and the push transports.

pub mod config;
pub mod dev;
pub mod error;
pub mod hmr;
pub mod imports;
pub mod resolver;
pub mod transport;

pub use config::{load_config, Config};
pub use dev::{DevService, GraphSnapshot, ModuleGraph, ServedFile};
pub use error::{Error, Result};
pub use hmr::{DirWatcher, HmrPayload, Notifier, UpdateEntry, UpdateKind};
pub use imports::{scan_imports, ImportKind, ImportSpec};
pub use resolver::{PackageResolver, ResolvedPackage};
pub use transport::{SocketHub, SseHub};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
