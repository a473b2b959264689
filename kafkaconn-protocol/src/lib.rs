//! # kafkaconn-protocol
//!
//! Kafka wire protocol support for kafkaconn.
//!
//! This crate provides:
//! - Size-prefixed framing with request (v1) and response (v0) headers
//! - Primitive wire types and zig-zag varints
//! - Record batch (magic 2) encoding and decoding with CRC-32C validation
//! - Request/response bodies for metadata, produce, fetch, offsets, group
//!   coordinator lookup and consumer offset commit/fetch
//! - Broker error codes

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod records;
pub mod wire;

pub use codec::{decode_body, Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::{RequestFrame, RequestHeader, ResponseFrame};
pub use message::*;
pub use records::Message;
pub use wire::WireFormat;

/// Default Kafka broker port.
pub const DEFAULT_PORT: u16 = 9092;

/// Largest frame accepted or produced (100 MiB).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;
