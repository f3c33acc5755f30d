//! Import specifier scanner.
//!
//! Recognizes four forms with regular expressions:
//!
//! - `import ... from '<spec>'`
//! - `import '<spec>'`
//! - `export ... from '<spec>'`
//! - `import('<spec>')`
//!
//! This is a lexical approximation. Import-like text inside strings, comments
//! or template literals is reported like real code, and a `from` clause is only
//! found when no quote or semicolon sits between the keyword and `from`.

use regex_lite::Regex;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

/// Syntactic form an import specifier was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from '<spec>'`
    Static,
    /// `import '<spec>'`
    SideEffect,
    /// `export ... from '<spec>'`
    ReExport,
    /// `import('<spec>')`
    Dynamic,
}

/// One occurrence of a specifier in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Specifier exactly as written, without quotes.
    pub specifier: String,
    /// Form it appeared in.
    pub kind: ImportKind,
    /// Byte range of the specifier text (inside the quotes).
    pub span: Range<usize>,
}

const FROM_PATTERN: &str = r#"\b(import|export)\s+[^'";]*?\bfrom\s*(?:'([^']+)'|"([^"]+)")"#;
const SIDE_EFFECT_PATTERN: &str = r#"\bimport\s*(?:'([^']+)'|"([^"]+)")"#;
const DYNAMIC_PATTERN: &str = r#"\bimport\s*\(\s*(?:'([^']+)'|"([^"]+)")\s*\)"#;

struct Patterns {
    from: Regex,
    side_effect: Regex,
    dynamic: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                from: Regex::new(FROM_PATTERN).ok()?,
                side_effect: Regex::new(SIDE_EFFECT_PATTERN).ok()?,
                dynamic: Regex::new(DYNAMIC_PATTERN).ok()?,
            })
        })
        .as_ref()
}

/// Scan source code for every specifier occurrence, ordered by position.
///
/// Duplicates are kept so callers can rewrite each occurrence in place.
#[must_use]
pub fn scan_occurrences(source: &str) -> Vec<ImportSpec> {
    let Some(p) = patterns() else {
        return Vec::new();
    };

    let mut found = Vec::new();

    for caps in p.from.captures_iter(source) {
        let kind = match caps.get(1).map(|m| m.as_str()) {
            Some("export") => ImportKind::ReExport,
            _ => ImportKind::Static,
        };
        if let Some(m) = caps.get(2).or_else(|| caps.get(3)) {
            found.push(ImportSpec {
                specifier: m.as_str().to_string(),
                kind,
                span: m.range(),
            });
        }
    }

    for (re, kind) in [
        (&p.side_effect, ImportKind::SideEffect),
        (&p.dynamic, ImportKind::Dynamic),
    ] {
        for caps in re.captures_iter(source) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                found.push(ImportSpec {
                    specifier: m.as_str().to_string(),
                    kind,
                    span: m.range(),
                });
            }
        }
    }

    found.sort_by_key(|spec| spec.span.start);

    // Drop occurrences nested in an earlier match.
    let mut out: Vec<ImportSpec> = Vec::with_capacity(found.len());
    for spec in found {
        if out.last().is_some_and(|prev| spec.span.start < prev.span.end) {
            continue;
        }
        out.push(spec);
    }
    out
}

/// Scan source code for distinct import specifiers.
///
/// Returns specifiers in first-appearance order, deduplicated.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    scan_occurrences(source)
        .into_iter()
        .filter(|spec| seen.insert(spec.specifier.clone()))
        .map(|spec| spec.specifier)
        .collect()
}
