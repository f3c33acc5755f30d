//! Browser-side scripts served by the dev server.

use super::rewrite::STYLE_TAG_ATTR;

/// Request path of the HMR client module.
pub const HMR_CLIENT_PATH: &str = "/@hmr-client";

/// Request path of the SSE live-reload stream.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Request path of the live-reload client script.
pub const LIVERELOAD_CLIENT_PATH: &str = "/livereload.js";

/// HMR client connecting to the WebSocket at `hmr_path`.
///
/// Style updates re-fetch the stylesheet with `?raw=1` and swap the text of
/// the matching `<style>` element; anything else reloads the page.
#[must_use]
pub fn hmr_client_script(hmr_path: &str) -> String {
    HMR_CLIENT_RUNTIME
        .replace("__HMR_PATH__", hmr_path)
        .replace("__STYLE_ATTR__", STYLE_TAG_ATTR)
}

/// Live-reload client listening on the SSE stream.
#[must_use]
pub fn livereload_client_script() -> String {
    LIVERELOAD_RUNTIME.replace("__LIVERELOAD_PATH__", LIVERELOAD_PATH)
}

/// Insert the HMR client `<script>` into an HTML page.
///
/// Goes before `</head>`, else before `</body>`, else at the end. Pages that
/// already reference the client are returned unchanged.
#[must_use]
pub fn inject_hmr_client(html: &str) -> String {
    if html.contains(HMR_CLIENT_PATH) {
        return html.to_string();
    }
    let tag = format!(r#"<script type="module" src="{HMR_CLIENT_PATH}"></script>"#);
    let mut out = html.to_string();
    if let Some(pos) = out.find("</head>").or_else(|| out.find("</body>")) {
        out.insert_str(pos, &format!("  {tag}\n  "));
    } else {
        out.push('\n');
        out.push_str(&tag);
        out.push('\n');
    }
    out
}

const HMR_CLIENT_RUNTIME: &str = r"
const proto = location.protocol === 'https:' ? 'wss:' : 'ws:';
const ws = new WebSocket(proto + '//' + location.host + '__HMR_PATH__');

ws.addEventListener('open', () => console.log('[minivite] HMR connected'));
ws.addEventListener('close', () => console.log('[minivite] HMR disconnected'));

async function updateStyle(path, timestamp) {
  try {
    const sep = path.includes('?') ? '&' : '?';
    const res = await fetch(path + sep + 'raw=1&t=' + timestamp, { cache: 'no-cache' });
    if (!res.ok) throw new Error(res.status + ' ' + res.statusText);
    const css = await res.text();
    const selector = 'style[__STYLE_ATTR__=' + JSON.stringify(path) + ']';
    const existing = document.querySelectorAll(selector);
    if (existing.length) {
      existing.forEach((el) => (el.textContent = css));
    } else {
      const el = document.createElement('style');
      el.setAttribute('type', 'text/css');
      el.setAttribute('__STYLE_ATTR__', path);
      el.textContent = css;
      document.head.appendChild(el);
    }
    console.log('[minivite] style updated', path);
  } catch (err) {
    console.warn('[minivite] style update failed, reloading', err);
    location.reload();
  }
}

ws.addEventListener('message', (event) => {
  let msg;
  try {
    msg = JSON.parse(event.data);
  } catch (err) {
    console.warn('[minivite] invalid HMR message', event.data);
    return;
  }

  if (msg.type === 'full-reload') {
    location.reload();
    return;
  }

  if (msg.type === 'update' && Array.isArray(msg.updates)) {
    for (const update of msg.updates) {
      if (update.type === 'style') {
        updateStyle(update.path, update.timestamp);
      } else {
        location.reload();
        return;
      }
    }
  }
});

export {};
";

const LIVERELOAD_RUNTIME: &str = r"
const es = new EventSource(location.origin + '__LIVERELOAD_PATH__');
es.addEventListener('message', (e) => {
  if (e.data === 'reload') {
    console.log('[minivite] reloading');
    location.reload();
  }
});
es.addEventListener('open', () => console.log('[minivite] live reload connected'));
es.addEventListener('error', () => console.log('[minivite] live reload disconnected'));
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmr_client_uses_configured_path() {
        let script = hmr_client_script("/__hot");
        assert!(script.contains("location.host + '/__hot'"));
        assert!(script.contains("data-minivite-href"));
        assert!(!script.contains("__HMR_PATH__"));
    }

    #[test]
    fn test_livereload_client_targets_stream() {
        assert!(livereload_client_script().contains("'/__livereload'"));
    }

    #[test]
    fn test_inject_before_head_close() {
        let html = "<html><head><title>x</title></head><body></body></html>";
        let out = inject_hmr_client(html);
        let script = out.find("/@hmr-client").unwrap();
        assert!(script < out.find("</head>").unwrap());
    }

    #[test]
    fn test_inject_without_head_or_body() {
        let out = inject_hmr_client("<p>hi</p>");
        assert!(out.starts_with("<p>hi</p>\n<script"));
    }

    #[test]
    fn test_inject_is_idempotent() {
        let once = inject_hmr_client("<head></head>");
        assert_eq!(inject_hmr_client(&once), once);
    }
}
