//! Hot module replacement: change classification, debouncing, directory
//! watching and dispatch to connected browsers.
//!
//! ```text
//! notify event ─▶ DirWatcher ─▶ Notifier::handle_event
//!                                   ├─ style/script ─▶ UpdateBatcher ─▶ {"type":"update"} (WebSocket)
//!                                   └─ anything else ─▶ ReloadLatch ─▶ {"type":"full-reload"} (WebSocket + SSE)
//! ```

mod classify;
mod debounce;
mod notifier;
mod payload;
mod watcher;

pub use classify::{change_kind, classify, is_ignored_path, ChangeKind, Classified, IGNORED_DIRS};
pub use debounce::{spawn_debouncer, Coalesce, PendingUpdate, ReloadLatch, UpdateBatcher};
pub use notifier::{run_watch_loop, Notifier};
pub use payload::{now_ms, HmrPayload, UpdateEntry, UpdateKind};
pub use watcher::DirWatcher;
