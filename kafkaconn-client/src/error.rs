//! Client error types.

use kafkaconn_protocol::ProtocolError;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Client errors.
///
/// `Clone` so that the first terminal error of a connection can be latched
/// once and handed to every caller that observes it afterwards.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    #[error("protocol error: {0}")]
    Protocol(Arc<ProtocolError>),

    #[error("connection closed")]
    Closed,

    #[error("correlation id {0} already has a pending request")]
    CorrelationConflict(i32),

    #[error("request timeout")]
    Timeout,

    #[error("failed to connect to {addr}: {message}")]
    Dial { addr: String, message: String },
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        ClientError::Io(Arc::new(err))
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        ClientError::Protocol(Arc::new(err))
    }
}

impl ClientError {
    /// Returns whether retrying on a fresh connection may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::Closed => true,
            ClientError::Dial { .. } => true,
            ClientError::Protocol(_) => false,
            ClientError::CorrelationConflict(_) => false,
        }
    }

    /// Returns whether this error always means the connection is unusable.
    ///
    /// A `Protocol` error is terminal only when raised by the read path; the
    /// connection's `is_closed()` tells the two cases apart.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::Closed)
    }

    /// Returns the I/O error kind, if this is an I/O error.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ClientError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}
