//! Messages pushed to connected browsers.
//!
//! ```json
//! {"type":"full-reload"}
//! {"type":"update","updates":[{"type":"style","path":"/src/app.css","timestamp":1700000000000}]}
//! ```

use serde::{Deserialize, Serialize};

/// What a hot update asks the client to re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// A stylesheet; the client swaps its `<style>` text in place.
    Style,
    /// A script module.
    Script,
}

/// One entry of an update batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Request path of the changed file (e.g. `/src/app.css`).
    pub path: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// A message on the HMR socket. Unknown `type` tags fail to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrPayload {
    FullReload,
    Update { updates: Vec<UpdateEntry> },
}

impl HmrPayload {
    /// Serialize to the JSON text carried in one WebSocket frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a payload, rejecting unknown tags.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
