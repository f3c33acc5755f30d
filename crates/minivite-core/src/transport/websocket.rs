//! WebSocket handshake and outbound framing (RFC 6455 subset).
//!
//! Only what the server needs to push text: accept-token computation,
//! handshake validation and unmasked single-frame text encoding. Inbound
//! frames are never decoded.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

/// GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version accepted.
pub const WS_VERSION: &str = "13";

/// FIN bit set, opcode 0x1 (text).
const FIN_TEXT: u8 = 0x81;

/// `base64(sha1(key + GUID))`.
#[must_use]
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Check the upgrade headers and return the accept token.
///
/// A missing or empty key, or any version other than 13, is a
/// [`Error::Protocol`]; no partial handshake is attempted.
pub fn validate_handshake(key: Option<&str>, version: Option<&str>) -> Result<String> {
    let key = key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::Protocol("missing Sec-WebSocket-Key".into()))?;

    match version.map(str::trim) {
        Some(WS_VERSION) => Ok(accept_key(key)),
        Some(other) => Err(Error::Protocol(format!(
            "unsupported Sec-WebSocket-Version {other}"
        ))),
        None => Err(Error::Protocol("missing Sec-WebSocket-Version".into())),
    }
}

/// Encode `payload` as one unmasked text frame.
///
/// Header is 2 bytes below 126, 4 bytes (16-bit length) below 65536 and
/// 10 bytes (64-bit length) otherwise.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_text_frame(payload: &[u8]) -> Bytes {
    let len = payload.len();
    let mut frame = BytesMut::with_capacity(len + 10);
    frame.put_u8(FIN_TEXT);

    if len < 126 {
        frame.put_u8(len as u8);
    } else if len < 65_536 {
        frame.put_u8(126);
        frame.put_u16(len as u16);
    } else {
        frame.put_u8(127);
        frame.put_u64(len as u64);
    }

    frame.put_slice(payload);
    frame.freeze()
}

/// Read one unmasked text frame as written by [`encode_text_frame`].
#[cfg(test)]
pub(crate) async fn read_text_frame<R>(reader: &mut R) -> std::io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut head = [0u8; 2];
    reader.read_exact(&mut head).await?;
    assert_eq!(head[0], FIN_TEXT);

    let len = match head[1] {
        126 => usize::from(reader.read_u16().await?),
        127 => usize::try_from(reader.read_u64().await?).unwrap_or(usize::MAX),
        n => usize::from(n),
    };
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    String::from_utf8(payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
