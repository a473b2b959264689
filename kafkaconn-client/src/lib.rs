//! # kafkaconn-client
//!
//! A single-connection, request-multiplexing Kafka client.
//!
//! This crate provides:
//! - One TCP (or any duplex) stream per [`Connection`], shared by any number
//!   of concurrent callers
//! - Correlation ID issuing and response demultiplexing
//! - First-error-wins shutdown: once a connection fails or is closed, every
//!   caller sees the same error
//! - One request method per Kafka API: metadata, produce, fetch, offset
//!   lookup, group coordinator, offset commit and offset fetch

pub mod client;
pub mod connection;
mod correlation;
pub mod error;

#[cfg(test)]
mod testing;

pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use kafkaconn_protocol as protocol;
