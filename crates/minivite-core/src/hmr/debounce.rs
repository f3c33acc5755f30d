//! Event coalescing.
//!
//! A debouncer waits for the first event, then keeps absorbing events until
//! the channel has been quiet for one full window, and only then hands the
//! coalesced batch on. Every received event restarts the window.

use super::payload::{UpdateEntry, UpdateKind};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Accumulates events between flushes.
pub trait Coalesce: Send + 'static {
    type Item: Send + 'static;
    type Batch: Send + 'static;

    /// Absorb one event.
    fn push(&mut self, item: Self::Item);

    /// Drain the accumulated state, `None` when nothing is pending.
    fn take(&mut self) -> Option<Self::Batch>;
}

/// One coalesced change, keyed by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub kind: UpdateKind,
    pub path: String,
    pub timestamp: u64,
}

impl From<PendingUpdate> for UpdateEntry {
    fn from(update: PendingUpdate) -> Self {
        Self {
            kind: update.kind,
            path: update.path,
            timestamp: update.timestamp,
        }
    }
}

/// Keeps one [`PendingUpdate`] per path; the newest timestamp wins.
#[derive(Debug, Default)]
pub struct UpdateBatcher {
    pending: BTreeMap<String, PendingUpdate>,
}

impl UpdateBatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Coalesce for UpdateBatcher {
    type Item = PendingUpdate;
    type Batch = Vec<PendingUpdate>;

    fn push(&mut self, item: PendingUpdate) {
        match self.pending.get(&item.path) {
            Some(existing) if existing.timestamp > item.timestamp => {}
            _ => {
                self.pending.insert(item.path.clone(), item);
            }
        }
    }

    fn take(&mut self) -> Option<Vec<PendingUpdate>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending).into_values().collect())
    }
}

/// Collapses any number of reload triggers into one.
#[derive(Debug, Default)]
pub struct ReloadLatch {
    armed: bool,
}

impl Coalesce for ReloadLatch {
    type Item = ();
    type Batch = ();

    fn push(&mut self, (): ()) {
        self.armed = true;
    }

    fn take(&mut self) -> Option<()> {
        std::mem::take(&mut self.armed).then_some(())
    }
}

/// Run `coalescer` on its own task between `rx` and `tx`.
///
/// The task ends when either channel closes; anything pending when `rx`
/// closes is flushed first.
pub fn spawn_debouncer<C: Coalesce>(
    window: Duration,
    coalescer: C,
    rx: mpsc::UnboundedReceiver<C::Item>,
    tx: mpsc::UnboundedSender<C::Batch>,
) -> JoinHandle<()> {
    tokio::spawn(debounce(window, coalescer, rx, tx))
}

async fn debounce<C: Coalesce>(
    window: Duration,
    mut coalescer: C,
    mut rx: mpsc::UnboundedReceiver<C::Item>,
    tx: mpsc::UnboundedSender<C::Batch>,
) {
    while let Some(first) = rx.recv().await {
        coalescer.push(first);
        let mut closed = false;

        loop {
            match tokio::time::timeout(window, rx.recv()).await {
                Ok(Some(item)) => coalescer.push(item),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        if let Some(batch) = coalescer.take() {
            trace!("Debounce window closed");
            if tx.send(batch).is_err() {
                return;
            }
        }
        if closed {
            return;
        }
    }
}
