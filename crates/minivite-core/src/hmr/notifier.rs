//! Turn filesystem events into browser notifications.
//!
//! Style and script updates are coalesced per path on one debouncer; reload
//! triggers are coalesced on another. The two never wait on each other.
//! Update batches go to WebSocket clients only. Full reloads go to every
//! WebSocket and SSE client.

use super::classify::{change_kind, classify, is_ignored_path, ChangeKind, Classified};
use super::debounce::{spawn_debouncer, PendingUpdate, ReloadLatch, UpdateBatcher};
use super::payload::{now_ms, HmrPayload, UpdateEntry};
use super::watcher::DirWatcher;
use crate::transport::{SocketHub, SseHub};
use minivite_util::path::{safe_join, to_url_path};
use notify::Event;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Entry point for classified changes.
#[derive(Debug, Clone)]
pub struct Notifier {
    root: PathBuf,
    updates: mpsc::UnboundedSender<PendingUpdate>,
    reloads: mpsc::UnboundedSender<()>,
}

impl Notifier {
    /// Start both debouncers and their dispatch tasks.
    ///
    /// `root` must be the canonical directory event paths are reported under.
    #[must_use]
    pub fn spawn(
        root: PathBuf,
        window: Duration,
        sockets: Arc<SocketHub>,
        sse: Arc<SseHub>,
    ) -> Self {
        let (updates, update_rx) = mpsc::unbounded_channel();
        let (batch_tx, mut batch_rx) = mpsc::unbounded_channel::<Vec<PendingUpdate>>();
        spawn_debouncer(window, UpdateBatcher::new(), update_rx, batch_tx);

        let (reloads, reload_rx) = mpsc::unbounded_channel();
        let (flush_tx, mut flush_rx) = mpsc::unbounded_channel::<()>();
        spawn_debouncer(window, ReloadLatch::default(), reload_rx, flush_tx);

        {
            let root = root.clone();
            let sockets = Arc::clone(&sockets);
            let sse = Arc::clone(&sse);
            tokio::spawn(async move {
                while let Some(batch) = batch_rx.recv().await {
                    dispatch_updates(&root, batch, &sockets, &sse).await;
                }
            });
        }

        tokio::spawn(async move {
            while flush_rx.recv().await.is_some() {
                broadcast_full_reload(&sockets, &sse);
            }
        });

        Self {
            root,
            updates,
            reloads,
        }
    }

    /// Queue the right notification for one changed path.
    pub fn notify(&self, path: &Path, kind: ChangeKind) {
        match classify(&self.root, path, kind) {
            Classified::Update(update_kind) => match to_url_path(&self.root, path) {
                Some(url) => {
                    debug!(path = %url, kind = ?update_kind, "Queued update");
                    let update = PendingUpdate {
                        kind: update_kind,
                        path: url,
                        timestamp: now_ms(),
                    };
                    if self.updates.send(update).is_err() {
                        debug!("Update debouncer stopped");
                    }
                }
                None => self.full_reload(),
            },
            Classified::FullReload => {
                debug!(path = %path.display(), ?kind, "Queued full reload");
                self.full_reload();
            }
        }
    }

    /// Queue a full reload.
    pub fn full_reload(&self) {
        if self.reloads.send(()).is_err() {
            debug!("Reload debouncer stopped");
        }
    }

    /// Handle one raw watcher event.
    ///
    /// New directories are added to `watcher` rather than reported. Removed
    /// directories are forgotten so the same path can be watched again once
    /// it is recreated. An event that names more than one path is treated as
    /// ambiguous.
    pub fn handle_event(&self, watcher: &DirWatcher, event: &Event) {
        let Some(kind) = change_kind(&event.kind) else {
            return;
        };

        let paths: Vec<&PathBuf> = event
            .paths
            .iter()
            .filter(|p| !is_ignored_path(&self.root, p))
            .collect();
        if paths.is_empty() {
            return;
        }

        if kind == ChangeKind::DirCreated {
            for dir in paths {
                watcher.watch_tree(dir);
            }
            return;
        }

        let kind = if paths.len() > 1 {
            ChangeKind::Ambiguous
        } else {
            kind
        };

        for path in paths {
            match kind {
                ChangeKind::Changed if path.is_dir() => {
                    watcher.watch_tree(path);
                    continue;
                }
                ChangeKind::Removed | ChangeKind::Ambiguous => {
                    watcher.forget(path);
                    // Recreated before this event was seen.
                    if path.is_dir() {
                        watcher.watch_tree(path);
                    }
                }
                _ => {}
            }
            self.notify(path, kind);
        }
    }
}

/// Feed watcher events into `notifier` until the watcher goes away.
pub async fn run_watch_loop(
    watcher: DirWatcher,
    mut events: mpsc::UnboundedReceiver<Event>,
    notifier: Notifier,
) {
    while let Some(event) = events.recv().await {
        notifier.handle_event(&watcher, &event);
    }
    debug!("Watch event channel closed");
}

/// Push an update batch, or a reload if any file in it is gone.
async fn dispatch_updates(
    root: &Path,
    batch: Vec<PendingUpdate>,
    sockets: &SocketHub,
    sse: &SseHub,
) {
    for update in &batch {
        if let Err(e) = tokio::fs::metadata(safe_join(root, &update.path)).await {
            warn!(path = %update.path, error = %e, "Changed file unreadable, reloading instead");
            broadcast_full_reload(sockets, sse);
            return;
        }
    }

    let count = batch.len();
    let updates: Vec<UpdateEntry> = batch.into_iter().map(UpdateEntry::from).collect();
    let clients = sockets.broadcast(&HmrPayload::Update { updates });
    info!(updates = count, clients, "HMR update sent");
}

fn broadcast_full_reload(sockets: &SocketHub, sse: &SseHub) {
    let ws = sockets.broadcast(&HmrPayload::FullReload);
    let es = sse.broadcast_reload();
    info!(websocket = ws, sse = es, "Full reload sent");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmr::UpdateKind;
    use crate::transport::websocket::read_text_frame;
    use crate::transport::RELOAD_EVENT;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind};
    use notify::EventKind;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tokio::io::{duplex, split, DuplexStream};
    use tokio::time::timeout;

    const WINDOW: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(5);

    fn connect(hub: &Arc<SocketHub>) -> DuplexStream {
        let (client, server) = duplex(8192);
        let (r, w) = split(server);
        hub.attach(r, w);
        client
    }

    async fn next_payload(client: &mut DuplexStream) -> HmrPayload {
        let text = timeout(WAIT, read_text_frame(client)).await.unwrap().unwrap();
        HmrPayload::from_json(&text).unwrap()
    }

    #[tokio::test]
    async fn test_style_burst_is_one_update() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.css"), "a{}").unwrap();
        fs::write(root.join("src/b.css"), "b{}").unwrap();

        let sockets = Arc::new(SocketHub::new());
        let sse = Arc::new(SseHub::new());
        let mut client = connect(&sockets);
        let notifier = Notifier::spawn(root.clone(), WINDOW, sockets, sse);

        for _ in 0..3 {
            notifier.notify(&root.join("src/a.css"), ChangeKind::Changed);
        }
        notifier.notify(&root.join("src/b.css"), ChangeKind::Changed);

        match next_payload(&mut client).await {
            HmrPayload::Update { updates } => {
                let paths: Vec<_> = updates.iter().map(|u| u.path.as_str()).collect();
                assert_eq!(paths, vec!["/src/a.css", "/src/b.css"]);
                assert!(updates.iter().all(|u| u.kind == UpdateKind::Style));
            }
            HmrPayload::FullReload => panic!("expected update"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_degrades_to_reload() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();

        let sockets = Arc::new(SocketHub::new());
        let sse = Arc::new(SseHub::new());
        let mut client = connect(&sockets);
        let mut events = sse.subscribe();
        let notifier = Notifier::spawn(root.clone(), WINDOW, sockets, Arc::clone(&sse));

        notifier.notify(&root.join("gone.css"), ChangeKind::Changed);

        assert_eq!(next_payload(&mut client).await, HmrPayload::FullReload);
        let chunk = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(chunk, RELOAD_EVENT.as_bytes());
    }

    #[tokio::test]
    async fn test_reloads_reach_both_channels_once() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();

        let sockets = Arc::new(SocketHub::new());
        let sse = Arc::new(SseHub::new());
        let mut client = connect(&sockets);
        let mut events = sse.subscribe();
        let notifier = Notifier::spawn(root.clone(), WINDOW, sockets, Arc::clone(&sse));

        notifier.notify(&root.join("index.html"), ChangeKind::Changed);
        notifier.notify(&root.join("src/a.css"), ChangeKind::Removed);
        notifier.full_reload();

        assert_eq!(next_payload(&mut client).await, HmrPayload::FullReload);
        let chunk = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(chunk, RELOAD_EVENT.as_bytes());

        // Nothing else queued behind the coalesced reload.
        assert!(timeout(WINDOW * 5, events.recv()).await.is_err());
    }

    /// Forward every frame a client receives onto a channel.
    fn frames(mut client: DuplexStream) -> mpsc::UnboundedReceiver<HmrPayload> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok(text) = read_text_frame(&mut client).await {
                if tx.send(HmrPayload::from_json(&text).unwrap()).is_err() {
                    break;
                }
            }
        });
        rx
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        watcher: DirWatcher,
        events: mpsc::UnboundedReceiver<Event>,
        notifier: Notifier,
        payloads: mpsc::UnboundedReceiver<HmrPayload>,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.css"), "a{}").unwrap();
        fs::write(root.join("src/b.css"), "b{}").unwrap();

        let sockets = Arc::new(SocketHub::new());
        let sse = Arc::new(SseHub::new());
        let payloads = frames(connect(&sockets));
        let (watcher, events) = DirWatcher::start(&root).unwrap();
        let notifier = Notifier::spawn(root.clone(), WINDOW, sockets, sse);

        Fixture {
            _dir: dir,
            root,
            watcher,
            events,
            notifier,
            payloads,
        }
    }

    fn event(kind: EventKind, paths: &[PathBuf]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.clone()))
    }

    fn content_change() -> EventKind {
        EventKind::Modify(ModifyKind::Data(DataChange::Content))
    }

    async fn assert_silent(payloads: &mut mpsc::UnboundedReceiver<HmrPayload>) {
        assert!(timeout(WINDOW * 10, payloads.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_created_directory_is_watched() {
        let mut fx = fixture();
        fs::create_dir_all(fx.root.join("src/new/deep")).unwrap();

        let created = event(EventKind::Create(CreateKind::Folder), &[fx.root.join("src/new")]);
        fx.notifier.handle_event(&fx.watcher, &created);

        assert!(fx.watcher.is_watching(&fx.root.join("src/new")));
        assert!(fx.watcher.is_watching(&fx.root.join("src/new/deep")));
        assert_silent(&mut fx.payloads).await;
    }

    #[tokio::test]
    async fn test_changed_directory_is_watched_not_reported() {
        let mut fx = fixture();
        fs::create_dir_all(fx.root.join("src/moved")).unwrap();

        let changed = event(content_change(), &[fx.root.join("src/moved")]);
        fx.notifier.handle_event(&fx.watcher, &changed);

        assert!(fx.watcher.is_watching(&fx.root.join("src/moved")));
        assert_silent(&mut fx.payloads).await;
    }

    #[tokio::test]
    async fn test_single_style_event_is_an_update() {
        let mut fx = fixture();

        let changed = event(content_change(), &[fx.root.join("src/a.css")]);
        fx.notifier.handle_event(&fx.watcher, &changed);

        match timeout(WAIT, fx.payloads.recv()).await.unwrap().unwrap() {
            HmrPayload::Update { updates } => {
                assert_eq!(updates.len(), 1);
                assert_eq!(updates[0].path, "/src/a.css");
                assert_eq!(updates[0].kind, UpdateKind::Style);
            }
            HmrPayload::FullReload => panic!("expected update"),
        }
    }

    #[tokio::test]
    async fn test_multi_path_event_is_full_reload() {
        let mut fx = fixture();

        let both = event(
            content_change(),
            &[fx.root.join("src/a.css"), fx.root.join("src/b.css")],
        );
        fx.notifier.handle_event(&fx.watcher, &both);

        let first = timeout(WAIT, fx.payloads.recv()).await.unwrap().unwrap();
        assert_eq!(first, HmrPayload::FullReload);
        assert_silent(&mut fx.payloads).await;
    }

    #[tokio::test]
    async fn test_ignored_paths_are_dropped() {
        let mut fx = fixture();
        fs::create_dir_all(fx.root.join("node_modules/pkg")).unwrap();
        fs::write(fx.root.join("node_modules/pkg/index.js"), "").unwrap();
        fs::write(fx.root.join(".env"), "").unwrap();

        for path in [fx.root.join("node_modules/pkg/index.js"), fx.root.join(".env")] {
            fx.notifier.handle_event(&fx.watcher, &event(content_change(), &[path]));
        }
        let created = event(EventKind::Create(CreateKind::Folder), &[fx.root.join("node_modules/pkg")]);
        fx.notifier.handle_event(&fx.watcher, &created);

        assert!(!fx.watcher.is_watching(&fx.root.join("node_modules/pkg")));
        assert_silent(&mut fx.payloads).await;
    }

    #[tokio::test]
    async fn test_access_and_metadata_events_are_filtered() {
        let mut fx = fixture();
        let css = fx.root.join("src/a.css");

        fx.notifier.handle_event(
            &fx.watcher,
            &event(EventKind::Access(AccessKind::Any), &[css.clone()]),
        );
        fx.notifier.handle_event(
            &fx.watcher,
            &event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), &[css]),
        );

        assert_silent(&mut fx.payloads).await;
    }

    #[tokio::test]
    async fn test_removed_directory_can_be_watched_again() {
        let mut fx = fixture();
        let src = fx.root.join("src");
        assert!(fx.watcher.is_watching(&src));

        fs::remove_dir_all(&src).unwrap();
        fx.notifier
            .handle_event(&fx.watcher, &event(EventKind::Remove(RemoveKind::Folder), &[src.clone()]));
        assert_eq!(fx.watcher.watched_count(), 1);
        let reload = timeout(WAIT, fx.payloads.recv()).await.unwrap().unwrap();
        assert_eq!(reload, HmrPayload::FullReload);

        fs::create_dir_all(&src).unwrap();
        fx.notifier
            .handle_event(&fx.watcher, &event(EventKind::Create(CreateKind::Folder), &[src.clone()]));
        assert!(fx.watcher.is_watching(&src));
    }

    #[tokio::test]
    async fn test_removal_seen_after_recreate_rewatches() {
        let fx = fixture();
        let src = fx.root.join("src");

        fs::remove_dir_all(&src).unwrap();
        fs::create_dir_all(src.join("inner")).unwrap();
        fx.notifier
            .handle_event(&fx.watcher, &event(EventKind::Remove(RemoveKind::Folder), &[src.clone()]));

        assert!(fx.watcher.is_watching(&src));
        assert!(fx.watcher.is_watching(&src.join("inner")));
    }

    /// Write `file` until the watch loop reports it as a style update.
    async fn write_until_update(
        file: &Path,
        url: &str,
        payloads: &mut mpsc::UnboundedReceiver<HmrPayload>,
    ) {
        for attempt in 0..50 {
            fs::write(file, format!("a{{ order: {attempt} }}")).unwrap();
            let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
            while let Ok(Some(payload)) = tokio::time::timeout_at(deadline, payloads.recv()).await {
                if let HmrPayload::Update { updates } = payload {
                    if updates.iter().any(|u| u.path == url && u.kind == UpdateKind::Style) {
                        return;
                    }
                }
            }
        }
        panic!("no update for {url}");
    }

    #[tokio::test]
    async fn test_watch_loop_delivers_style_update() {
        let Fixture {
            _dir,
            root,
            watcher,
            events,
            notifier,
            mut payloads,
        } = fixture();
        tokio::spawn(run_watch_loop(watcher, events, notifier));

        write_until_update(&root.join("src/a.css"), "/src/a.css", &mut payloads).await;
    }

    #[tokio::test]
    async fn test_watch_loop_follows_recreated_directory() {
        let Fixture {
            _dir,
            root,
            watcher,
            events,
            notifier,
            mut payloads,
        } = fixture();
        tokio::spawn(run_watch_loop(watcher, events, notifier));

        let src = root.join("src");
        fs::remove_dir_all(&src).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::create_dir_all(&src).unwrap();

        write_until_update(&src.join("a.css"), "/src/a.css", &mut payloads).await;
    }
}
