//! Record batches (message format v2).
//!
//! Batch layout:
//!
//! ```text
//! base_offset: i64 | batch_length: i32 | partition_leader_epoch: i32 | magic: i8
//! crc: u32 | attributes: i16 | last_offset_delta: i32 | first_timestamp: i64
//! max_timestamp: i64 | producer_id: i64 | producer_epoch: i16 | base_sequence: i32
//! records: [Record]
//! ```
//!
//! `batch_length` counts everything after itself; the CRC-32C covers everything
//! after the CRC field.

use crate::error::ProtocolError;
use crate::wire::{
    get_i16, get_i32, get_i64, get_i8, get_slice, get_u32, get_varint, get_varint_bytes,
    get_varlong, put_varint, put_varint_bytes, put_varlong,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Serialize, Serializer};

/// Record batch magic byte supported by this codec.
pub const RECORD_BATCH_MAGIC: i8 = 2;

/// Bytes from `base_offset` through `batch_length`.
const BATCH_LOG_OVERHEAD: usize = 12;

/// Bytes from `partition_leader_epoch` through the CRC field.
const BATCH_CRC_PREFIX: usize = 9;

const COMPRESSION_MASK: i16 = 0x07;
const CONTROL_FLAG: i16 = 0x20;

/// A single message read from or written to a partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Message {
    pub offset: i64,
    pub timestamp: i64,
    #[serde(serialize_with = "lossy_utf8")]
    pub key: Option<Bytes>,
    #[serde(serialize_with = "lossy_utf8")]
    pub value: Option<Bytes>,
}

impl Message {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

fn lossy_utf8<S: Serializer>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(b) => serializer.serialize_some(&String::from_utf8_lossy(b)),
        None => serializer.serialize_none(),
    }
}

/// Encodes `messages` as one uncompressed batch.
///
/// Offsets are written relative to the first message's offset, so messages
/// built for a produce request can leave every offset at zero.
pub fn encode_batch(buf: &mut BytesMut, messages: &[Message]) {
    let Some(first) = messages.first() else {
        return;
    };
    let base_offset = first.offset;
    let first_timestamp = first.timestamp;
    let max_timestamp = messages
        .iter()
        .map(|m| m.timestamp)
        .max()
        .unwrap_or(first_timestamp);

    let offset_deltas: Vec<i32> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            if m.offset > base_offset {
                (m.offset - base_offset) as i32
            } else {
                i as i32
            }
        })
        .collect();
    let last_offset_delta = offset_deltas.iter().copied().max().unwrap_or(0);

    let mut records = BytesMut::new();
    for (message, offset_delta) in messages.iter().zip(&offset_deltas) {
        encode_record(
            &mut records,
            message,
            *offset_delta,
            message.timestamp - first_timestamp,
        );
    }

    let mut body = BytesMut::with_capacity(40 + records.len());
    body.put_i16(0); // attributes: no compression, create time
    body.put_i32(last_offset_delta);
    body.put_i64(first_timestamp);
    body.put_i64(max_timestamp);
    body.put_i64(-1); // producer id
    body.put_i16(-1); // producer epoch
    body.put_i32(-1); // base sequence
    body.put_i32(messages.len() as i32);
    body.put_slice(&records);

    let crc = crc32c::crc32c(&body);
    buf.put_i64(base_offset);
    buf.put_i32((BATCH_CRC_PREFIX + body.len()) as i32);
    buf.put_i32(-1); // partition leader epoch
    buf.put_i8(RECORD_BATCH_MAGIC);
    buf.put_u32(crc);
    buf.put_slice(&body);
}

fn encode_record(buf: &mut BytesMut, message: &Message, offset_delta: i32, timestamp_delta: i64) {
    let mut body = BytesMut::new();
    body.put_i8(0); // attributes
    put_varlong(&mut body, timestamp_delta);
    put_varint(&mut body, offset_delta);
    put_varint_bytes(&mut body, message.key.as_deref());
    put_varint_bytes(&mut body, message.value.as_deref());
    put_varint(&mut body, 0); // headers

    put_varint(buf, body.len() as i32);
    buf.put_slice(&body);
}

/// Decodes every complete batch in a partition's record set.
///
/// Brokers cut record sets at `max_bytes`, so a trailing partial batch is
/// silently dropped. Control batches (transaction markers) are skipped.
pub fn decode_batches(mut records: Bytes) -> Result<Vec<Message>, ProtocolError> {
    let mut messages = Vec::new();
    while records.remaining() >= BATCH_LOG_OVERHEAD {
        let batch_length = i32::from_be_bytes([records[8], records[9], records[10], records[11]]);
        if batch_length < 0 {
            return Err(ProtocolError::InvalidLength(batch_length as i64));
        }
        if records.remaining() < BATCH_LOG_OVERHEAD + batch_length as usize {
            break;
        }
        let mut batch = records.split_to(BATCH_LOG_OVERHEAD + batch_length as usize);
        decode_batch(&mut batch, &mut messages)?;
    }
    Ok(messages)
}

fn decode_batch(batch: &mut Bytes, out: &mut Vec<Message>) -> Result<(), ProtocolError> {
    let base_offset = get_i64(batch)?;
    let _batch_length = get_i32(batch)?;
    let _partition_leader_epoch = get_i32(batch)?;
    let magic = get_i8(batch)?;
    if magic != RECORD_BATCH_MAGIC {
        return Err(ProtocolError::UnsupportedMagic(magic));
    }
    let expected = get_u32(batch)?;
    let actual = crc32c::crc32c(&batch[..]);
    if expected != actual {
        return Err(ProtocolError::CrcMismatch { expected, actual });
    }

    let attributes = get_i16(batch)?;
    let compression = attributes & COMPRESSION_MASK;
    if compression != 0 {
        return Err(ProtocolError::UnsupportedCompression(compression));
    }
    if attributes & CONTROL_FLAG != 0 {
        return Ok(());
    }

    let _last_offset_delta = get_i32(batch)?;
    let first_timestamp = get_i64(batch)?;
    let _max_timestamp = get_i64(batch)?;
    let _producer_id = get_i64(batch)?;
    let _producer_epoch = get_i16(batch)?;
    let _base_sequence = get_i32(batch)?;
    let count = get_i32(batch)?;
    if count < 0 {
        return Err(ProtocolError::InvalidLength(count as i64));
    }

    for _ in 0..count {
        let len = get_varint(batch)?;
        if len < 0 {
            return Err(ProtocolError::InvalidLength(len as i64));
        }
        let mut record = get_slice(batch, len as usize)?;
        let _attributes = get_i8(&mut record)?;
        let timestamp_delta = get_varlong(&mut record)?;
        let offset_delta = get_varint(&mut record)?;
        let key = get_varint_bytes(&mut record)?;
        let value = get_varint_bytes(&mut record)?;
        // Headers are not surfaced.
        let headers = get_varint(&mut record)?;
        for _ in 0..headers.max(0) {
            let _ = get_varint_bytes(&mut record)?;
            let _ = get_varint_bytes(&mut record)?;
        }
        out.push(Message {
            offset: base_offset.wrapping_add(offset_delta as i64),
            timestamp: first_timestamp.wrapping_add(timestamp_delta),
            key,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_bytes(messages: &[Message]) -> Bytes {
        let mut buf = BytesMut::new();
        encode_batch(&mut buf, messages);
        buf.freeze()
    }

    #[test]
    fn test_batch_offsets_and_timestamps() {
        let messages = vec![
            Message::new("a").with_offset(40).with_timestamp(1_000),
            Message::new("b").with_offset(41).with_timestamp(1_005),
            Message::new("c")
                .with_key("k")
                .with_offset(44)
                .with_timestamp(1_002),
        ];
        let decoded = decode_batches(batch_bytes(&messages)).unwrap();

        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_produce_batch_assigns_sequential_deltas() {
        let messages = vec![Message::new("x"), Message::new("y"), Message::new("z")];
        let decoded = decode_batches(batch_bytes(&messages)).unwrap();
        let offsets: Vec<i64> = decoded.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
    }

    #[test]
    fn test_trailing_partial_batch_dropped() {
        let first = batch_bytes(&[Message::new("one").with_offset(0)]);
        let second = batch_bytes(&[Message::new("two").with_offset(1)]);

        let mut set = BytesMut::new();
        set.put_slice(&first);
        set.put_slice(&second[..second.len() - 3]);

        let decoded = decode_batches(set.freeze()).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].value.as_deref(), Some(&b"one"[..]));
    }

    #[test]
    fn test_crc_mismatch() {
        let mut raw = BytesMut::from(&batch_bytes(&[Message::new("payload")])[..]);
        let last = raw.len() - 2;
        raw[last] ^= 0xFF;

        let result = decode_batches(raw.freeze());
        assert!(matches!(result, Err(ProtocolError::CrcMismatch { .. })));
    }

    #[test]
    fn test_compressed_batch_rejected() {
        let mut raw = BytesMut::from(&batch_bytes(&[Message::new("gz")])[..]);
        // attributes sit right after the CRC; set codec 1 and recompute the CRC.
        raw[21] = 0;
        raw[22] = 1;
        let crc = crc32c::crc32c(&raw[21..]);
        raw[17..21].copy_from_slice(&crc.to_be_bytes());

        let result = decode_batches(raw.freeze());
        assert!(matches!(
            result,
            Err(ProtocolError::UnsupportedCompression(1))
        ));
    }

    #[test]
    fn test_control_batch_skipped() {
        let mut raw = BytesMut::from(&batch_bytes(&[Message::new("marker")])[..]);
        raw[21] = 0;
        raw[22] = CONTROL_FLAG as u8;
        let crc = crc32c::crc32c(&raw[21..]);
        raw[17..21].copy_from_slice(&crc.to_be_bytes());

        assert!(decode_batches(raw.freeze()).unwrap().is_empty());
    }

    #[test]
    fn test_old_magic_rejected() {
        let mut raw = BytesMut::from(&batch_bytes(&[Message::new("v1")])[..]);
        raw[16] = 1;
        assert!(matches!(
            decode_batches(raw.freeze()),
            Err(ProtocolError::UnsupportedMagic(1))
        ));
    }

    #[test]
    fn test_empty_record_set() {
        assert!(decode_batches(Bytes::new()).unwrap().is_empty());
        let mut buf = BytesMut::new();
        encode_batch(&mut buf, &[]);
        assert!(buf.is_empty());
    }
}
