//! Protocol error types and broker error codes.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors raised while framing, encoding or decoding Kafka messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid frame size: {0}")]
    InvalidFrameSize(i32),

    #[error("unexpected end of data: need {needed} more bytes")]
    UnexpectedEof { needed: usize },

    #[error("invalid length prefix: {0}")]
    InvalidLength(i64),

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("record batch CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("unsupported record batch magic: {0}")]
    UnsupportedMagic(i8),

    #[error("unsupported compression codec: {0}")]
    UnsupportedCompression(i16),

    #[error("varint is too long")]
    VarintOverflow,

    #[error("unknown API key: {0}")]
    UnknownApiKey(i16),

    #[error("invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: i64 },
}

/// Error codes carried inside broker responses.
///
/// Codes not listed here are preserved as [`ErrorCode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCode {
    #[default]
    None,
    UnknownServerError,
    OffsetOutOfRange,
    CorruptMessage,
    UnknownTopicOrPartition,
    InvalidFetchSize,
    LeaderNotAvailable,
    NotLeaderForPartition,
    RequestTimedOut,
    BrokerNotAvailable,
    ReplicaNotAvailable,
    MessageTooLarge,
    StaleControllerEpoch,
    OffsetMetadataTooLarge,
    NetworkException,
    CoordinatorLoadInProgress,
    CoordinatorNotAvailable,
    NotCoordinator,
    InvalidTopic,
    RecordListTooLarge,
    NotEnoughReplicas,
    NotEnoughReplicasAfterAppend,
    InvalidRequiredAcks,
    IllegalGeneration,
    InconsistentGroupProtocol,
    InvalidGroupId,
    UnknownMemberId,
    InvalidSessionTimeout,
    RebalanceInProgress,
    InvalidCommitOffsetSize,
    TopicAuthorizationFailed,
    GroupAuthorizationFailed,
    ClusterAuthorizationFailed,
    InvalidTimestamp,
    UnsupportedSaslMechanism,
    IllegalSaslState,
    UnsupportedVersion,
    Unknown(i16),
}

impl ErrorCode {
    /// Maps a wire value to an error code.
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => ErrorCode::None,
            -1 => ErrorCode::UnknownServerError,
            1 => ErrorCode::OffsetOutOfRange,
            2 => ErrorCode::CorruptMessage,
            3 => ErrorCode::UnknownTopicOrPartition,
            4 => ErrorCode::InvalidFetchSize,
            5 => ErrorCode::LeaderNotAvailable,
            6 => ErrorCode::NotLeaderForPartition,
            7 => ErrorCode::RequestTimedOut,
            8 => ErrorCode::BrokerNotAvailable,
            9 => ErrorCode::ReplicaNotAvailable,
            10 => ErrorCode::MessageTooLarge,
            11 => ErrorCode::StaleControllerEpoch,
            12 => ErrorCode::OffsetMetadataTooLarge,
            13 => ErrorCode::NetworkException,
            14 => ErrorCode::CoordinatorLoadInProgress,
            15 => ErrorCode::CoordinatorNotAvailable,
            16 => ErrorCode::NotCoordinator,
            17 => ErrorCode::InvalidTopic,
            18 => ErrorCode::RecordListTooLarge,
            19 => ErrorCode::NotEnoughReplicas,
            20 => ErrorCode::NotEnoughReplicasAfterAppend,
            21 => ErrorCode::InvalidRequiredAcks,
            22 => ErrorCode::IllegalGeneration,
            23 => ErrorCode::InconsistentGroupProtocol,
            24 => ErrorCode::InvalidGroupId,
            25 => ErrorCode::UnknownMemberId,
            26 => ErrorCode::InvalidSessionTimeout,
            27 => ErrorCode::RebalanceInProgress,
            28 => ErrorCode::InvalidCommitOffsetSize,
            29 => ErrorCode::TopicAuthorizationFailed,
            30 => ErrorCode::GroupAuthorizationFailed,
            31 => ErrorCode::ClusterAuthorizationFailed,
            32 => ErrorCode::InvalidTimestamp,
            33 => ErrorCode::UnsupportedSaslMechanism,
            34 => ErrorCode::IllegalSaslState,
            35 => ErrorCode::UnsupportedVersion,
            other => ErrorCode::Unknown(other),
        }
    }

    /// Returns the wire value of this error code.
    pub fn code(&self) -> i16 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::UnknownServerError => -1,
            ErrorCode::OffsetOutOfRange => 1,
            ErrorCode::CorruptMessage => 2,
            ErrorCode::UnknownTopicOrPartition => 3,
            ErrorCode::InvalidFetchSize => 4,
            ErrorCode::LeaderNotAvailable => 5,
            ErrorCode::NotLeaderForPartition => 6,
            ErrorCode::RequestTimedOut => 7,
            ErrorCode::BrokerNotAvailable => 8,
            ErrorCode::ReplicaNotAvailable => 9,
            ErrorCode::MessageTooLarge => 10,
            ErrorCode::StaleControllerEpoch => 11,
            ErrorCode::OffsetMetadataTooLarge => 12,
            ErrorCode::NetworkException => 13,
            ErrorCode::CoordinatorLoadInProgress => 14,
            ErrorCode::CoordinatorNotAvailable => 15,
            ErrorCode::NotCoordinator => 16,
            ErrorCode::InvalidTopic => 17,
            ErrorCode::RecordListTooLarge => 18,
            ErrorCode::NotEnoughReplicas => 19,
            ErrorCode::NotEnoughReplicasAfterAppend => 20,
            ErrorCode::InvalidRequiredAcks => 21,
            ErrorCode::IllegalGeneration => 22,
            ErrorCode::InconsistentGroupProtocol => 23,
            ErrorCode::InvalidGroupId => 24,
            ErrorCode::UnknownMemberId => 25,
            ErrorCode::InvalidSessionTimeout => 26,
            ErrorCode::RebalanceInProgress => 27,
            ErrorCode::InvalidCommitOffsetSize => 28,
            ErrorCode::TopicAuthorizationFailed => 29,
            ErrorCode::GroupAuthorizationFailed => 30,
            ErrorCode::ClusterAuthorizationFailed => 31,
            ErrorCode::InvalidTimestamp => 32,
            ErrorCode::UnsupportedSaslMechanism => 33,
            ErrorCode::IllegalSaslState => 34,
            ErrorCode::UnsupportedVersion => 35,
            ErrorCode::Unknown(code) => *code,
        }
    }

    /// Returns whether the code signals success.
    pub fn is_ok(&self) -> bool {
        matches!(self, ErrorCode::None)
    }

    /// Returns whether the broker considers this error transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::CorruptMessage
                | ErrorCode::UnknownTopicOrPartition
                | ErrorCode::LeaderNotAvailable
                | ErrorCode::NotLeaderForPartition
                | ErrorCode::RequestTimedOut
                | ErrorCode::NetworkException
                | ErrorCode::CoordinatorLoadInProgress
                | ErrorCode::CoordinatorNotAvailable
                | ErrorCode::NotCoordinator
                | ErrorCode::NotEnoughReplicas
                | ErrorCode::NotEnoughReplicasAfterAppend
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::None => write!(f, "NONE"),
            ErrorCode::UnknownServerError => write!(f, "UNKNOWN_SERVER_ERROR"),
            ErrorCode::OffsetOutOfRange => write!(f, "OFFSET_OUT_OF_RANGE"),
            ErrorCode::CorruptMessage => write!(f, "CORRUPT_MESSAGE"),
            ErrorCode::UnknownTopicOrPartition => write!(f, "UNKNOWN_TOPIC_OR_PARTITION"),
            ErrorCode::InvalidFetchSize => write!(f, "INVALID_FETCH_SIZE"),
            ErrorCode::LeaderNotAvailable => write!(f, "LEADER_NOT_AVAILABLE"),
            ErrorCode::NotLeaderForPartition => write!(f, "NOT_LEADER_FOR_PARTITION"),
            ErrorCode::RequestTimedOut => write!(f, "REQUEST_TIMED_OUT"),
            ErrorCode::BrokerNotAvailable => write!(f, "BROKER_NOT_AVAILABLE"),
            ErrorCode::ReplicaNotAvailable => write!(f, "REPLICA_NOT_AVAILABLE"),
            ErrorCode::MessageTooLarge => write!(f, "MESSAGE_TOO_LARGE"),
            ErrorCode::StaleControllerEpoch => write!(f, "STALE_CONTROLLER_EPOCH"),
            ErrorCode::OffsetMetadataTooLarge => write!(f, "OFFSET_METADATA_TOO_LARGE"),
            ErrorCode::NetworkException => write!(f, "NETWORK_EXCEPTION"),
            ErrorCode::CoordinatorLoadInProgress => write!(f, "COORDINATOR_LOAD_IN_PROGRESS"),
            ErrorCode::CoordinatorNotAvailable => write!(f, "COORDINATOR_NOT_AVAILABLE"),
            ErrorCode::NotCoordinator => write!(f, "NOT_COORDINATOR"),
            ErrorCode::InvalidTopic => write!(f, "INVALID_TOPIC_EXCEPTION"),
            ErrorCode::RecordListTooLarge => write!(f, "RECORD_LIST_TOO_LARGE"),
            ErrorCode::NotEnoughReplicas => write!(f, "NOT_ENOUGH_REPLICAS"),
            ErrorCode::NotEnoughReplicasAfterAppend => {
                write!(f, "NOT_ENOUGH_REPLICAS_AFTER_APPEND")
            }
            ErrorCode::InvalidRequiredAcks => write!(f, "INVALID_REQUIRED_ACKS"),
            ErrorCode::IllegalGeneration => write!(f, "ILLEGAL_GENERATION"),
            ErrorCode::InconsistentGroupProtocol => write!(f, "INCONSISTENT_GROUP_PROTOCOL"),
            ErrorCode::InvalidGroupId => write!(f, "INVALID_GROUP_ID"),
            ErrorCode::UnknownMemberId => write!(f, "UNKNOWN_MEMBER_ID"),
            ErrorCode::InvalidSessionTimeout => write!(f, "INVALID_SESSION_TIMEOUT"),
            ErrorCode::RebalanceInProgress => write!(f, "REBALANCE_IN_PROGRESS"),
            ErrorCode::InvalidCommitOffsetSize => write!(f, "INVALID_COMMIT_OFFSET_SIZE"),
            ErrorCode::TopicAuthorizationFailed => write!(f, "TOPIC_AUTHORIZATION_FAILED"),
            ErrorCode::GroupAuthorizationFailed => write!(f, "GROUP_AUTHORIZATION_FAILED"),
            ErrorCode::ClusterAuthorizationFailed => write!(f, "CLUSTER_AUTHORIZATION_FAILED"),
            ErrorCode::InvalidTimestamp => write!(f, "INVALID_TIMESTAMP"),
            ErrorCode::UnsupportedSaslMechanism => write!(f, "UNSUPPORTED_SASL_MECHANISM"),
            ErrorCode::IllegalSaslState => write!(f, "ILLEGAL_SASL_STATE"),
            ErrorCode::UnsupportedVersion => write!(f, "UNSUPPORTED_VERSION"),
            ErrorCode::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
