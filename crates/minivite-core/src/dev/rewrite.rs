//! Import rewriting for unbundled dev serving.
//!
//! Classifies each specifier found by the scanner and rewrites:
//! - Bare specifiers (`lodash-es`) → `/@modules/lodash-es`
//! - Relative specifiers inside a served package file (`./chunk.js`) →
//!   `/@modules/<pkg>/<dir>/chunk.js`
//!
//! Root-absolute and remote specifiers are left untouched, and so are
//! relative specifiers in project sources: the browser resolves those against
//! the module URL on its own.

use crate::imports::scan_occurrences;
use minivite_util::path;

/// Classification of an import specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// Starts with `/`.
    RootAbsolute,
    /// Starts with `./` or `../`.
    Relative,
    /// `http://` or `https://` URL.
    Remote,
    /// A package name, optionally followed by a sub-path.
    Bare,
}

/// Classify a specifier into exactly one [`SpecifierKind`].
#[must_use]
pub fn classify(spec: &str) -> SpecifierKind {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        SpecifierKind::Remote
    } else if spec.starts_with('/') {
        SpecifierKind::RootAbsolute
    } else if spec.starts_with("./") || spec.starts_with("../") {
        SpecifierKind::Relative
    } else {
        SpecifierKind::Bare
    }
}

/// Where the module being rewritten is served from.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Package namespace prefix, e.g. `/@modules/`.
    pub namespace: &'a str,
    /// URL directory of the module when it is a resolved package file.
    pub package_base: Option<&'a str>,
}

impl<'a> RewriteContext<'a> {
    /// Context for a project source file.
    #[must_use]
    pub fn source(namespace: &'a str) -> Self {
        Self {
            namespace,
            package_base: None,
        }
    }

    /// Context for a file re-served under a package URL base.
    #[must_use]
    pub fn package(namespace: &'a str, base: &'a str) -> Self {
        Self {
            namespace,
            package_base: Some(base),
        }
    }
}

/// Rewrite a single specifier.
///
/// Already-canonical specifiers are root-absolute, so rewriting is idempotent.
#[must_use]
pub fn rewrite_specifier(spec: &str, ctx: &RewriteContext<'_>) -> String {
    match classify(spec) {
        SpecifierKind::Relative => match ctx.package_base {
            Some(base) => {
                let joined = path::join(base, spec);
                if joined.starts_with('/') {
                    joined
                } else {
                    format!("/{joined}")
                }
            }
            None => spec.to_string(),
        },
        SpecifierKind::Bare => format!("{}{spec}", ctx.namespace),
        SpecifierKind::RootAbsolute | SpecifierKind::Remote => spec.to_string(),
    }
}

/// Rewrite every import specifier in `code`.
///
/// Only the text between the quotes changes; surrounding syntax is preserved.
#[must_use]
pub fn rewrite_imports(code: &str, ctx: &RewriteContext<'_>) -> String {
    let mut result = String::with_capacity(code.len() + 64);
    let mut cursor = 0;

    for occurrence in scan_occurrences(code) {
        let rewritten = rewrite_specifier(&occurrence.specifier, ctx);
        if rewritten == occurrence.specifier {
            continue;
        }
        result.push_str(&code[cursor..occurrence.span.start]);
        result.push_str(&rewritten);
        cursor = occurrence.span.end;
    }

    result.push_str(&code[cursor..]);
    result
}

/// Canonical graph path for a specifier imported by `importer`.
///
/// Returns `None` for remote specifiers, which never become graph edges.
#[must_use]
pub fn normalize_import(spec: &str, importer: &str, namespace: &str) -> Option<String> {
    match classify(spec) {
        SpecifierKind::Remote => None,
        SpecifierKind::RootAbsolute => Some(spec.to_string()),
        SpecifierKind::Relative => {
            let joined = path::join(path::dirname(importer), spec);
            Some(if joined.starts_with('/') {
                joined
            } else {
                format!("/{joined}")
            })
        }
        SpecifierKind::Bare => Some(format!("{namespace}{spec}")),
    }
}

/// Quote `s` as a JavaScript string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Wrap JSON text as an ES module with a default export.
#[must_use]
pub fn wrap_json_as_js(json: &str) -> String {
    format!("export default {};\n", json.trim_end())
}

/// Attribute marking style elements injected for a stylesheet path.
pub const STYLE_TAG_ATTR: &str = "data-minivite-href";

/// Wrap a stylesheet as an ES module that injects it into `<head>`.
///
/// The `<style>` element is tagged with `id`; evaluating the module again
/// for the same id reuses the existing element instead of appending another.
#[must_use]
pub fn wrap_css_as_js(css: &str, id: &str) -> String {
    let css = js_string(css);
    let id = js_string(id);
    format!(
        r"const css = {css};
const id = {id};
let style = document.querySelector('style[{STYLE_TAG_ATTR}=' + JSON.stringify(id) + ']');
if (!style) {{
  style = document.createElement('style');
  style.setAttribute('type', 'text/css');
  if (id) style.setAttribute('{STYLE_TAG_ATTR}', id);
  document.head.appendChild(style);
}}
style.textContent = css;
export default css;
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "/@modules/";

    #[test]
    fn test_classify() {
        assert_eq!(classify("/src/a.js"), SpecifierKind::RootAbsolute);
        assert_eq!(classify("./a.js"), SpecifierKind::Relative);
        assert_eq!(classify("../a.js"), SpecifierKind::Relative);
        assert_eq!(classify("https://esm.sh/react"), SpecifierKind::Remote);
        assert_eq!(classify("http://cdn/x.js"), SpecifierKind::Remote);
        assert_eq!(classify("lodash-es"), SpecifierKind::Bare);
        assert_eq!(classify("@scope/pkg/sub"), SpecifierKind::Bare);
    }

    #[test]
    fn test_rewrite_bare_specifier() {
        let ctx = RewriteContext::source(NS);
        let out = rewrite_imports("import { shuffle } from 'lodash-es';", &ctx);
        assert_eq!(out, "import { shuffle } from '/@modules/lodash-es';");
    }

    #[test]
    fn test_bare_rewrite_is_idempotent() {
        let ctx = RewriteContext::source(NS);
        for spec in ["lodash-es", "@scope/pkg", "vue/dist/vue.esm.js"] {
            let once = rewrite_specifier(spec, &ctx);
            assert!(once.starts_with(NS));
            assert_eq!(rewrite_specifier(&once, &ctx), once);
        }

        let code = "import a from 'a';\nexport * from 'b';\nimport('c');\nimport 'd';";
        let once = rewrite_imports(code, &ctx);
        assert_eq!(rewrite_imports(&once, &ctx), once);
    }

    #[test]
    fn test_relative_left_alone_in_sources() {
        let ctx = RewriteContext::source(NS);
        let code = "import './style.css';\nimport data from '../data.json';";
        assert_eq!(rewrite_imports(code, &ctx), code);
    }

    #[test]
    fn test_relative_joined_against_package_base() {
        let ctx = RewriteContext::package(NS, "/@modules/lodash-es");
        let out = rewrite_imports("export { default as chunk } from './chunk.js';", &ctx);
        assert_eq!(out, "export { default as chunk } from '/@modules/lodash-es/chunk.js';");

        let ctx = RewriteContext::package(NS, "/@modules/@scope/pkg/dist/esm");
        assert_eq!(
            rewrite_specifier("../../shared/util.js", &ctx),
            "/@modules/@scope/pkg/shared/util.js"
        );
    }

    #[test]
    fn test_remote_and_absolute_untouched() {
        let ctx = RewriteContext::package(NS, "/@modules/x");
        let code = "import a from 'https://esm.sh/a';\nimport b from '/src/b.js';";
        assert_eq!(rewrite_imports(code, &ctx), code);
    }

    #[test]
    fn test_rewrite_dynamic_and_side_effect() {
        let ctx = RewriteContext::source(NS);
        let out = rewrite_imports("import \"nprogress/nprogress.css\";\nconst m = import(\"dayjs\");", &ctx);
        assert_eq!(
            out,
            "import \"/@modules/nprogress/nprogress.css\";\nconst m = import(\"/@modules/dayjs\");"
        );
    }

    #[test]
    fn test_normalize_import_relative() {
        assert_eq!(
            normalize_import("../lib/a.js", "/src/pages/home.js", NS).as_deref(),
            Some("/src/lib/a.js")
        );
        assert_eq!(
            normalize_import("./style.css", "/main.js", NS).as_deref(),
            Some("/style.css")
        );
        assert_eq!(
            normalize_import("../../../up.js", "/src/main.js", NS).as_deref(),
            Some("/up.js")
        );
    }

    #[test]
    fn test_normalize_import_other_kinds() {
        assert_eq!(normalize_import("https://cdn/x.js", "/main.js", NS), None);
        assert_eq!(normalize_import("/abs.js", "/main.js", NS).as_deref(), Some("/abs.js"));
        assert_eq!(
            normalize_import("react", "/main.js", NS).as_deref(),
            Some("/@modules/react")
        );
    }

    #[test]
    fn test_wrap_json() {
        assert_eq!(wrap_json_as_js("{\"a\": 1}\n"), "export default {\"a\": 1};\n");
    }

    #[test]
    fn test_wrap_css_guards_duplicates() {
        let js = wrap_css_as_js("body { color: \"red\" }", "/src/style.css");
        assert!(js.contains(r#"const css = "body { color: \"red\" }";"#));
        assert!(js.contains(r#"const id = "/src/style.css";"#));
        assert!(js.contains("document.querySelector('style[data-minivite-href='"));
        assert!(js.contains("if (!style) {"));
        assert_eq!(js.matches("appendChild").count(), 1);
        assert!(js.contains("export default css;"));
    }
}
