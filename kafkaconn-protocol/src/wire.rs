//! Primitive Kafka wire types.
//!
//! All integers are big-endian. Strings carry an `i16` length prefix, byte
//! blobs and arrays an `i32` prefix, with `-1` meaning null. Record fields use
//! zig-zag varints.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A type with a fixed Kafka wire representation.
pub trait WireFormat: Sized {
    /// Appends the wire representation to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Consumes one value from the front of `buf`.
    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError>;
}

fn ensure(buf: &Bytes, len: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < len {
        return Err(ProtocolError::UnexpectedEof {
            needed: len - buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_i8(buf: &mut Bytes) -> Result<i8, ProtocolError> {
    ensure(buf, 1)?;
    Ok(buf.get_i8())
}

pub fn get_i16(buf: &mut Bytes) -> Result<i16, ProtocolError> {
    ensure(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn get_i32(buf: &mut Bytes) -> Result<i32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn get_u32(buf: &mut Bytes) -> Result<u32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub fn get_i64(buf: &mut Bytes) -> Result<i64, ProtocolError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

/// Splits `len` bytes off the front of `buf` without copying.
pub fn get_slice(buf: &mut Bytes, len: usize) -> Result<Bytes, ProtocolError> {
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

fn to_string(raw: Bytes) -> Result<String, ProtocolError> {
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

pub fn get_string(buf: &mut Bytes) -> Result<String, ProtocolError> {
    get_nullable_string(buf)?.ok_or(ProtocolError::InvalidLength(-1))
}

pub fn get_nullable_string(buf: &mut Bytes) -> Result<Option<String>, ProtocolError> {
    let len = get_i16(buf)?;
    match len {
        -1 => Ok(None),
        len if len < 0 => Err(ProtocolError::InvalidLength(len as i64)),
        len => get_slice(buf, len as usize).and_then(to_string).map(Some),
    }
}

pub fn get_nullable_bytes(buf: &mut Bytes) -> Result<Option<Bytes>, ProtocolError> {
    let len = get_i32(buf)?;
    match len {
        -1 => Ok(None),
        len if len < 0 => Err(ProtocolError::InvalidLength(len as i64)),
        len => get_slice(buf, len as usize).map(Some),
    }
}

/// Decodes an `i32`-prefixed array; a null array decodes as empty.
pub fn get_array<T, F>(buf: &mut Bytes, mut f: F) -> Result<Vec<T>, ProtocolError>
where
    F: FnMut(&mut Bytes) -> Result<T, ProtocolError>,
{
    let len = get_i32(buf)?;
    if len == -1 {
        return Ok(Vec::new());
    }
    // Every element takes at least one byte, which bounds hostile lengths.
    if len < 0 || len as usize > buf.remaining() {
        return Err(ProtocolError::InvalidLength(len as i64));
    }
    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        items.push(f(buf)?);
    }
    Ok(items)
}

pub fn get_vec<T: WireFormat>(buf: &mut Bytes) -> Result<Vec<T>, ProtocolError> {
    get_array(buf, T::decode)
}

pub fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_i16(value.len() as i16);
    buf.put_slice(value.as_bytes());
}

pub fn put_nullable_string(buf: &mut BytesMut, value: Option<&str>) {
    match value {
        Some(s) => put_string(buf, s),
        None => buf.put_i16(-1),
    }
}

pub fn put_nullable_bytes(buf: &mut BytesMut, value: Option<&[u8]>) {
    match value {
        Some(b) => {
            buf.put_i32(b.len() as i32);
            buf.put_slice(b);
        }
        None => buf.put_i32(-1),
    }
}

pub fn put_array<T, F>(buf: &mut BytesMut, items: &[T], mut f: F)
where
    F: FnMut(&mut BytesMut, &T),
{
    buf.put_i32(items.len() as i32);
    for item in items {
        f(buf, item);
    }
}

pub fn put_vec<T: WireFormat>(buf: &mut BytesMut, items: &[T]) {
    put_array(buf, items, |buf, item| item.encode(buf));
}

impl WireFormat for i32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(*self);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        get_i32(buf)
    }
}

impl WireFormat for String {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, self);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        get_string(buf)
    }
}

// Varints (record format).

pub fn put_varint(buf: &mut BytesMut, value: i32) {
    put_unsigned_varint(buf, ((value << 1) ^ (value >> 31)) as u32 as u64);
}

pub fn put_varlong(buf: &mut BytesMut, value: i64) {
    put_unsigned_varint(buf, ((value << 1) ^ (value >> 63)) as u64);
}

fn put_unsigned_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn get_unsigned_varint(buf: &mut Bytes, max_bytes: usize) -> Result<u64, ProtocolError> {
    let mut value = 0u64;
    for i in 0..max_bytes {
        ensure(buf, 1)?;
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolError::VarintOverflow)
}

pub fn get_varint(buf: &mut Bytes) -> Result<i32, ProtocolError> {
    let raw = get_unsigned_varint(buf, 5)? as u32;
    Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
}

pub fn get_varlong(buf: &mut Bytes) -> Result<i64, ProtocolError> {
    let raw = get_unsigned_varint(buf, 10)?;
    Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
}

/// Reads a varint-prefixed byte blob; a negative length means null.
pub fn get_varint_bytes(buf: &mut Bytes) -> Result<Option<Bytes>, ProtocolError> {
    let len = get_varint(buf)?;
    if len < 0 {
        return Ok(None);
    }
    get_slice(buf, len as usize).map(Some)
}

pub fn put_varint_bytes(buf: &mut BytesMut, value: Option<&[u8]>) {
    match value {
        Some(b) => {
            put_varint(buf, b.len() as i32);
            buf.put_slice(b);
        }
        None => put_varint(buf, -1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_string() {
        let mut buf = BytesMut::new();
        put_nullable_string(&mut buf, Some("orders"));
        put_nullable_string(&mut buf, None);

        let mut bytes = buf.freeze();
        assert_eq!(
            get_nullable_string(&mut bytes).unwrap().as_deref(),
            Some("orders")
        );
        assert_eq!(get_nullable_string(&mut bytes).unwrap(), None);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_short_read_reports_missing_bytes() {
        let mut bytes = Bytes::from_static(&[0x00, 0x01]);
        let err = get_i32(&mut bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof { needed: 2 }));
    }

    #[test]
    fn test_string_length_past_end() {
        let mut bytes = Bytes::from_static(&[0x00, 0x05, b'a', b'b']);
        assert!(matches!(
            get_string(&mut bytes),
            Err(ProtocolError::UnexpectedEof { needed: 3 })
        ));
    }

    #[test]
    fn test_hostile_array_length_rejected() {
        let mut bytes = Bytes::from_static(&[0x7F, 0xFF, 0xFF, 0xFF, 0x00]);
        let result: Result<Vec<i32>, _> = get_vec(&mut bytes);
        assert!(matches!(result, Err(ProtocolError::InvalidLength(_))));
    }

    #[test]
    fn test_null_array_is_empty() {
        let mut bytes = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let items: Vec<i32> = get_vec(&mut bytes).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_varint_zigzag() {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, -1);
        assert_eq!(&buf[..], &[0x01]);

        buf.clear();
        put_varint(&mut buf, 300);
        assert_eq!(&buf[..], &[0xD8, 0x04]);

        let mut bytes = buf.freeze();
        assert_eq!(get_varint(&mut bytes).unwrap(), 300);
    }

    #[test]
    fn test_varint_overflow() {
        let mut bytes = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(
            get_varint(&mut bytes),
            Err(ProtocolError::VarintOverflow)
        ));
    }

    #[test]
    fn test_varlong_negative() {
        let mut buf = BytesMut::new();
        put_varlong(&mut buf, -1_000_000_000_000);
        let mut bytes = buf.freeze();
        assert_eq!(get_varlong(&mut bytes).unwrap(), -1_000_000_000_000);
    }
}
