//! Import specifier scanning.
//!
//! Lexical extraction of static, side-effect, re-export and dynamic import
//! specifiers without building an AST.

mod scan;

pub use scan::{scan_imports, scan_occurrences, ImportKind, ImportSpec};
