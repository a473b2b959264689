//! Size-prefixed Kafka frames.
//!
//! Every message on the wire is:
//!
//! ```text
//! +-----------+----------------------------------------+
//! | size: i32 | header | body                          |
//! +-----------+----------------------------------------+
//! ```
//!
//! Request headers (v1) carry `api_key`, `api_version`, `correlation_id` and a
//! nullable `client_id`. Response headers (v0) carry only `correlation_id`.

use crate::error::ProtocolError;
use crate::message::ApiKey;
use crate::wire::{get_i16, get_i32, get_nullable_string, put_nullable_string};
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Length of the `size` prefix.
pub const SIZE_PREFIX_LEN: usize = 4;

/// Header sent in front of every request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl RequestHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i16(self.api_key);
        buf.put_i16(self.api_version);
        buf.put_i32(self.correlation_id);
        put_nullable_string(buf, self.client_id.as_deref());
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            api_key: get_i16(buf)?,
            api_version: get_i16(buf)?,
            correlation_id: get_i32(buf)?,
            client_id: get_nullable_string(buf)?,
        })
    }

    pub fn api(&self) -> Result<ApiKey, ProtocolError> {
        ApiKey::from_code(self.api_key)
    }
}

/// A response frame with its header stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub correlation_id: i32,
    pub body: Bytes,
}

impl ResponseFrame {
    /// Splits the correlation id off a frame payload.
    pub fn parse(mut payload: Bytes) -> Result<Self, ProtocolError> {
        let correlation_id = get_i32(&mut payload)?;
        Ok(Self {
            correlation_id,
            body: payload,
        })
    }
}

/// A request frame with its header parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub header: RequestHeader,
    pub body: Bytes,
}

impl RequestFrame {
    pub fn parse(mut payload: Bytes) -> Result<Self, ProtocolError> {
        let header = RequestHeader::decode(&mut payload)?;
        Ok(Self {
            header,
            body: payload,
        })
    }
}

/// Writes one size-prefixed frame whose contents are produced by `write`.
pub fn write_frame<F>(buf: &mut BytesMut, write: F) -> Result<(), ProtocolError>
where
    F: FnOnce(&mut BytesMut),
{
    let start = buf.len();
    buf.put_i32(0);
    write(buf);

    let size = buf.len() - start - SIZE_PREFIX_LEN;
    if size > MAX_FRAME_SIZE {
        buf.truncate(start);
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    buf[start..start + SIZE_PREFIX_LEN].copy_from_slice(&(size as i32).to_be_bytes());
    Ok(())
}

/// Splits one complete frame payload off the front of `buf`.
///
/// Returns `Ok(None)` if more data is needed. The size prefix is validated
/// before the payload arrives, so an oversized frame fails fast.
pub fn read_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
    if buf.len() < SIZE_PREFIX_LEN {
        return Ok(None);
    }

    let size = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if size < 0 {
        return Err(ProtocolError::InvalidFrameSize(size));
    }
    let size = size as usize;
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }

    if buf.len() < SIZE_PREFIX_LEN + size {
        return Ok(None);
    }

    buf.advance(SIZE_PREFIX_LEN);
    Ok(Some(buf.split_to(size).freeze()))
}
