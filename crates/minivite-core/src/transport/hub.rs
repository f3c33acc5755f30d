//! Live WebSocket connections.

use super::websocket::encode_text_frame;
use crate::error::Error;
use crate::hmr::HmrPayload;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Broadcast set of upgraded sockets.
///
/// Each socket gets a writer task fed through an unbounded channel, so frames
/// reach one socket in the order they were broadcast. A reader task drains and
/// discards whatever the client sends. Whichever task ends first removes the
/// socket from the set.
#[derive(Debug, Default)]
pub struct SocketHub {
    next_id: AtomicU64,
    peers: Mutex<HashMap<u64, mpsc::UnboundedSender<Bytes>>>,
}

impl SocketHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an upgraded connection split into its halves.
    pub fn attach<R, W>(self: &Arc<Self>, reader: R, writer: W) -> u64
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        debug!(id, "WebSocket connected");

        let hub = Arc::clone(self);
        tokio::spawn(async move {
            write_frames(id, writer, rx).await;
            hub.remove(id);
        });

        let hub = Arc::clone(self);
        tokio::spawn(async move {
            drain(reader).await;
            hub.remove(id);
        });

        id
    }

    /// Send `payload` to every live socket. Returns how many were queued.
    pub fn broadcast(&self, payload: &HmrPayload) -> usize {
        match payload.to_json() {
            Ok(text) => self.broadcast_text(&text),
            Err(e) => {
                warn!(error = %e, "Cannot serialize HMR payload");
                0
            }
        }
    }

    /// Send raw text to every live socket as one frame each.
    pub fn broadcast_text(&self, text: &str) -> usize {
        let frame = encode_text_frame(text.as_bytes());
        let mut peers = self.lock();
        let before = peers.len();
        peers.retain(|_, tx| tx.send(frame.clone()).is_ok());
        if peers.len() < before {
            debug!(dropped = before - peers.len(), "Dropped closed sockets");
        }
        peers.len()
    }

    /// Number of live sockets.
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
            debug!(id, "WebSocket disconnected");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<Bytes>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn write_frames<W>(id: u64, mut writer: W, mut rx: mpsc::UnboundedReceiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let written = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            debug!(error = %e, "{}", Error::TransportWrite(id));
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn drain<R>(mut reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}
