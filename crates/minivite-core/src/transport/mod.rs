//! Push channels to the browser: a hand-rolled WebSocket server side and an
//! SSE fallback that only carries reloads.

mod hub;
mod sse;
pub mod websocket;

pub use hub::SocketHub;
pub use sse::{SseHub, SseSubscription, RELOAD_EVENT, RETRY_DIRECTIVE};
pub use websocket::{accept_key, encode_text_frame, validate_handshake, WS_GUID, WS_VERSION};
