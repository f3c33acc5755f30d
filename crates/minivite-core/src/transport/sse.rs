//! Server-Sent Events reload channel.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Sent once on connect: reconnect after one second.
pub const RETRY_DIRECTIVE: &str = "retry: 1000\n\n";

/// Sent on every full reload.
pub const RELOAD_EVENT: &str = "data: reload\n\n";

/// Broadcast set of open event streams.
#[derive(Debug, Default)]
pub struct SseHub {
    next_id: AtomicU64,
    clients: Mutex<HashMap<u64, mpsc::UnboundedSender<Bytes>>>,
}

impl SseHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a stream. It leaves the set when the subscription is dropped.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>) -> SseSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        debug!(id, "SSE client connected");
        SseSubscription {
            id,
            hub: Arc::clone(self),
            rx,
        }
    }

    /// Push a reload event to every stream. Returns how many received it.
    pub fn broadcast_reload(&self) -> usize {
        let event = Bytes::from_static(RELOAD_EVENT.as_bytes());
        let mut clients = self.lock();
        clients.retain(|_, tx| tx.send(event.clone()).is_ok());
        clients.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            debug!(id, "SSE client disconnected");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<Bytes>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One open event stream.
#[derive(Debug)]
pub struct SseSubscription {
    id: u64,
    hub: Arc<SseHub>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl SseSubscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event chunk, `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Body stream: the retry directive, then one chunk per broadcast.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send + 'static {
        let retry = stream::once(async { Bytes::from_static(RETRY_DIRECTIVE.as_bytes()) });
        let events = stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|chunk| (chunk, sub))
        });
        retry.chain(events)
    }
}

impl Drop for SseSubscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}
