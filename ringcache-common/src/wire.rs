//! Wire contract between a front-end/client and a peer's RPC listener, and
//! the framing used to carry it over a `TcpStream`.
//!
//! Framing is a 1-byte message-type tag, a big-endian `u32` payload length,
//! then a `bincode`-encoded payload of the type the tag names. This is the
//! one place the abstract request/response contract becomes concrete bytes
//! on the wire.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};

/// Request to fetch `key` from `group`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub group: String,
    pub key: String,
}

/// Response carrying the value bytes, if present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub value: Vec<u8>,
}

/// Request to store `value` for `key` in `group`.
///
/// `expire` is a Unix timestamp in seconds. `is_hot` selects the hot tier
/// (a replicated value this node does not own) over the main tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRequest {
    pub group: String,
    pub key: String,
    pub value: Vec<u8>,
    pub expire: i64,
    pub is_hot: bool,
}

/// Acknowledgement of a `Set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetResponse {
    pub ok: bool,
}

/// Carries a failed `Get`/`Set` back to the caller.
///
/// This hand-rolled frame protocol has no out-of-band status-code channel,
/// so a dedicated error frame fills the gap, tagged so the
/// `PeerUnreachable`/`NotFound`/etc. distinction survives the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

/// Mirrors `ringcache_common::Error`'s taxonomy without depending on it
/// directly, keeping the wire type plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    PeerUnreachable,
    PeerRejected,
    Internal,
}

/// The one-byte tag prefixing every frame, identifying how to decode the
/// payload that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    Get = 1,
    GetResponse = 2,
    Set = 3,
    SetResponse = 4,
    ErrorFrame = 5,
}

impl MessageTag {
    fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(MessageTag::Get),
            2 => Ok(MessageTag::GetResponse),
            3 => Ok(MessageTag::Set),
            4 => Ok(MessageTag::SetResponse),
            5 => Ok(MessageTag::ErrorFrame),
            other => Err(Error::Internal(format!("unknown message tag {other}"))),
        }
    }
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::InvalidArgument => ErrorKind::InvalidArgument,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::PeerUnreachable(_) => ErrorKind::PeerUnreachable,
            Error::PeerRejected(_) => ErrorKind::PeerRejected,
            Error::Internal(_) => ErrorKind::Internal,
        };
        ErrorResponse {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<ErrorResponse> for Error {
    fn from(resp: ErrorResponse) -> Self {
        match resp.kind {
            ErrorKind::InvalidArgument => Error::InvalidArgument,
            ErrorKind::NotFound => Error::NotFound(resp.message),
            ErrorKind::PeerUnreachable => Error::PeerUnreachable(resp.message),
            ErrorKind::PeerRejected => Error::PeerRejected(resp.message),
            ErrorKind::Internal => Error::Internal(resp.message),
        }
    }
}

/// Largest payload a peer will accept, guarding against a malformed length
/// prefix turning into an unbounded allocation.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Writes `tag` followed by the bincode-encoded `payload`, length-prefixed.
pub async fn write_frame<W, T>(writer: &mut W, tag: MessageTag, payload: &T) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let body = bincode::serialize(payload)?;
    let len = u32::try_from(body.len())
        .map_err(|_| Error::Internal("payload too large to frame".to_string()))?;
    writer.write_u8(tag as u8).await?;
    writer.write_u32(len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame, returning its tag and the raw (still-encoded) payload.
pub async fn read_frame<R>(reader: &mut R) -> Result<(MessageTag, Vec<u8>)>
where
    R: AsyncReadExt + Unpin,
{
    let tag = MessageTag::from_u8(reader.read_u8().await?)?;
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(Error::Internal(format!(
            "frame length {len} exceeds maximum {MAX_FRAME_LEN}"
        )));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok((tag, body))
}

/// Decodes a frame body as `T`.
pub fn decode<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_request_round_trips_over_a_frame() {
        let req = GetRequest {
            group: "scores".to_string(),
            key: "Tom".to_string(),
        };
        let mut buf: Vec<u8> = Vec::new();
        write_frame(&mut buf, MessageTag::Get, &req).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let (tag, body) = read_frame(&mut cursor).await.unwrap();
        assert_eq!(tag, MessageTag::Get);
        let decoded: GetRequest = decode(&body).unwrap();
        assert_eq!(decoded.group, "scores");
        assert_eq!(decoded.key, "Tom");
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.push(MessageTag::Get as u8);
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
