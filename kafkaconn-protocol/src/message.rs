//! Request and response bodies for the APIs the connection speaks.
//!
//! Each request type fixes one API version; the matching response type is
//! exposed through [`KafkaRequest::Response`].

use crate::error::{ErrorCode, ProtocolError};
use crate::records::{decode_batches, encode_batch, Message};
use crate::wire::{
    get_array, get_i16, get_i32, get_i64, get_i8, get_nullable_bytes, get_nullable_string,
    get_string, get_vec, put_array, put_nullable_bytes, put_nullable_string, put_string, put_vec,
    WireFormat,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Replica id sent by ordinary clients (as opposed to follower brokers).
pub const CLIENT_REPLICA_ID: i32 = -1;

/// Offset-lookup timestamp asking for the next offset to be written.
pub const LATEST_OFFSET: i64 = -1;

/// Offset-lookup timestamp asking for the oldest retained offset.
pub const EARLIEST_OFFSET: i64 = -2;

/// Kafka API keys used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ApiKey {
    Produce,
    Fetch,
    ListOffsets,
    Metadata,
    OffsetCommit,
    OffsetFetch,
    FindCoordinator,
}

impl ApiKey {
    pub fn code(&self) -> i16 {
        match self {
            ApiKey::Produce => 0,
            ApiKey::Fetch => 1,
            ApiKey::ListOffsets => 2,
            ApiKey::Metadata => 3,
            ApiKey::OffsetCommit => 8,
            ApiKey::OffsetFetch => 9,
            ApiKey::FindCoordinator => 10,
        }
    }

    pub fn from_code(code: i16) -> Result<Self, ProtocolError> {
        match code {
            0 => Ok(ApiKey::Produce),
            1 => Ok(ApiKey::Fetch),
            2 => Ok(ApiKey::ListOffsets),
            3 => Ok(ApiKey::Metadata),
            8 => Ok(ApiKey::OffsetCommit),
            9 => Ok(ApiKey::OffsetFetch),
            10 => Ok(ApiKey::FindCoordinator),
            other => Err(ProtocolError::UnknownApiKey(other)),
        }
    }
}

/// A request body with a fixed API key and version.
pub trait KafkaRequest: WireFormat {
    const API_KEY: ApiKey;
    const API_VERSION: i16;

    /// Body type of the broker's answer.
    type Response: WireFormat;
}

impl WireFormat for ErrorCode {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i16(self.code());
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        get_i16(buf).map(ErrorCode::from_code)
    }
}

fn put_messages(buf: &mut BytesMut, messages: &[Message]) {
    let mut records = BytesMut::new();
    encode_batch(&mut records, messages);
    put_nullable_bytes(buf, Some(&records[..]));
}

fn get_messages(buf: &mut Bytes) -> Result<Vec<Message>, ProtocolError> {
    match get_nullable_bytes(buf)? {
        Some(records) => decode_batches(records),
        None => Ok(Vec::new()),
    }
}

/// Returns the entry named `name`, appending one built by `make` if absent.
fn entry<'a, T>(
    items: &'a mut Vec<T>,
    name: &str,
    name_of: impl Fn(&T) -> &str,
    make: impl FnOnce() -> T,
) -> &'a mut T {
    let index = match items.iter().position(|t| name_of(t) == name) {
        Some(index) => index,
        None => {
            items.push(make());
            items.len() - 1
        }
    };
    &mut items[index]
}

// ============================================================================
// Metadata (v0)
// ============================================================================

/// Asks for cluster metadata. An empty topic list means "all topics".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRequest {
    pub topics: Vec<String>,
}

impl MetadataRequest {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }
}

impl WireFormat for MetadataRequest {
    fn encode(&self, buf: &mut BytesMut) {
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            topics: get_vec(buf)?,
        })
    }
}

impl KafkaRequest for MetadataRequest {
    const API_KEY: ApiKey = ApiKey::Metadata;
    const API_VERSION: i16 = 0;
    type Response = MetadataResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataResponse {
    pub brokers: Vec<Broker>,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Broker {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMetadata {
    pub error_code: ErrorCode,
    pub name: String,
    pub partitions: Vec<PartitionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionMetadata {
    pub error_code: ErrorCode,
    pub partition: i32,
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

impl WireFormat for MetadataResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_vec(buf, &self.brokers);
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            brokers: get_vec(buf)?,
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for Broker {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.node_id);
        put_string(buf, &self.host);
        buf.put_i32(self.port);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            node_id: get_i32(buf)?,
            host: get_string(buf)?,
            port: get_i32(buf)?,
        })
    }
}

impl WireFormat for TopicMetadata {
    fn encode(&self, buf: &mut BytesMut) {
        self.error_code.encode(buf);
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            error_code: ErrorCode::decode(buf)?,
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for PartitionMetadata {
    fn encode(&self, buf: &mut BytesMut) {
        self.error_code.encode(buf);
        buf.put_i32(self.partition);
        buf.put_i32(self.leader);
        put_vec(buf, &self.replicas);
        put_vec(buf, &self.isr);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            error_code: ErrorCode::decode(buf)?,
            partition: get_i32(buf)?,
            leader: get_i32(buf)?,
            replicas: get_vec(buf)?,
            isr: get_vec(buf)?,
        })
    }
}

// ============================================================================
// Produce (v3)
// ============================================================================

/// Acknowledgement level requested from the partition leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RequiredAcks {
    /// The broker sends no response at all.
    None,
    /// The leader has written the batch to its log.
    #[default]
    Leader,
    /// Every in-sync replica has the batch.
    All,
}

impl RequiredAcks {
    pub fn code(&self) -> i16 {
        match self {
            RequiredAcks::None => 0,
            RequiredAcks::Leader => 1,
            RequiredAcks::All => -1,
        }
    }

    pub fn from_code(code: i16) -> Result<Self, ProtocolError> {
        match code {
            0 => Ok(RequiredAcks::None),
            1 => Ok(RequiredAcks::Leader),
            -1 => Ok(RequiredAcks::All),
            other => Err(ProtocolError::InvalidField {
                field: "required_acks",
                value: other as i64,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceRequest {
    pub transactional_id: Option<String>,
    pub required_acks: RequiredAcks,
    pub timeout_ms: i32,
    pub topics: Vec<ProduceTopic>,
}

impl Default for ProduceRequest {
    fn default() -> Self {
        Self {
            transactional_id: None,
            required_acks: RequiredAcks::Leader,
            timeout_ms: 30_000,
            topics: Vec::new(),
        }
    }
}

impl ProduceRequest {
    pub fn new(required_acks: RequiredAcks) -> Self {
        Self {
            required_acks,
            ..Default::default()
        }
    }

    /// Appends messages for one partition.
    pub fn with_messages(mut self, topic: &str, partition: i32, messages: Vec<Message>) -> Self {
        let entry = entry(
            &mut self.topics,
            topic,
            |t| t.name.as_str(),
            || ProduceTopic {
                name: topic.to_string(),
                partitions: Vec::new(),
            },
        );
        entry.partitions.push(ProducePartition {
            partition,
            messages,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceTopic {
    pub name: String,
    pub partitions: Vec<ProducePartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducePartition {
    pub partition: i32,
    pub messages: Vec<Message>,
}

impl WireFormat for ProduceRequest {
    fn encode(&self, buf: &mut BytesMut) {
        put_nullable_string(buf, self.transactional_id.as_deref());
        buf.put_i16(self.required_acks.code());
        buf.put_i32(self.timeout_ms);
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            transactional_id: get_nullable_string(buf)?,
            required_acks: RequiredAcks::from_code(get_i16(buf)?)?,
            timeout_ms: get_i32(buf)?,
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for ProduceTopic {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for ProducePartition {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        put_messages(buf, &self.messages);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            messages: get_messages(buf)?,
        })
    }
}

impl KafkaRequest for ProduceRequest {
    const API_KEY: ApiKey = ApiKey::Produce;
    const API_VERSION: i16 = 3;
    type Response = ProduceResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProduceResponse {
    pub topics: Vec<ProduceTopicResponse>,
    pub throttle_time_ms: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProduceTopicResponse {
    pub name: String,
    pub partitions: Vec<ProducePartitionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducePartitionResponse {
    pub partition: i32,
    pub error_code: ErrorCode,
    pub base_offset: i64,
    pub log_append_time: i64,
}

impl WireFormat for ProduceResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_vec(buf, &self.topics);
        buf.put_i32(self.throttle_time_ms);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            topics: get_vec(buf)?,
            throttle_time_ms: get_i32(buf)?,
        })
    }
}

impl WireFormat for ProduceTopicResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for ProducePartitionResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        self.error_code.encode(buf);
        buf.put_i64(self.base_offset);
        buf.put_i64(self.log_append_time);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            error_code: ErrorCode::decode(buf)?,
            base_offset: get_i64(buf)?,
            log_append_time: get_i64(buf)?,
        })
    }
}

// ============================================================================
// Fetch (v4)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub replica_id: i32,
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    /// 0 = read uncommitted, 1 = read committed.
    pub isolation_level: i8,
    pub topics: Vec<FetchTopic>,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            replica_id: CLIENT_REPLICA_ID,
            max_wait_ms: 500,
            min_bytes: 1,
            max_bytes: 50 * 1024 * 1024,
            isolation_level: 0,
            topics: Vec::new(),
        }
    }
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one partition to fetch from `fetch_offset` onward.
    pub fn with_partition(
        mut self,
        topic: &str,
        partition: i32,
        fetch_offset: i64,
        max_bytes: i32,
    ) -> Self {
        let entry = entry(
            &mut self.topics,
            topic,
            |t| t.name.as_str(),
            || FetchTopic {
                name: topic.to_string(),
                partitions: Vec::new(),
            },
        );
        entry.partitions.push(FetchPartition {
            partition,
            fetch_offset,
            max_bytes,
        });
        self
    }

    /// Requested offset for a partition, if the request names it.
    pub fn fetch_offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.topics
            .iter()
            .filter(|t| t.name == topic)
            .flat_map(|t| t.partitions.iter())
            .find(|p| p.partition == partition)
            .map(|p| p.fetch_offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTopic {
    pub name: String,
    pub partitions: Vec<FetchPartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPartition {
    pub partition: i32,
    pub fetch_offset: i64,
    pub max_bytes: i32,
}

impl WireFormat for FetchRequest {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.replica_id);
        buf.put_i32(self.max_wait_ms);
        buf.put_i32(self.min_bytes);
        buf.put_i32(self.max_bytes);
        buf.put_i8(self.isolation_level);
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            replica_id: get_i32(buf)?,
            max_wait_ms: get_i32(buf)?,
            min_bytes: get_i32(buf)?,
            max_bytes: get_i32(buf)?,
            isolation_level: get_i8(buf)?,
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for FetchTopic {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for FetchPartition {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        buf.put_i64(self.fetch_offset);
        buf.put_i32(self.max_bytes);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            fetch_offset: get_i64(buf)?,
            max_bytes: get_i32(buf)?,
        })
    }
}

impl KafkaRequest for FetchRequest {
    const API_KEY: ApiKey = ApiKey::Fetch;
    const API_VERSION: i16 = 4;
    type Response = FetchResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<FetchTopicResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchTopicResponse {
    pub name: String,
    pub partitions: Vec<FetchPartitionResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchPartitionResponse {
    pub partition: i32,
    pub error_code: ErrorCode,
    pub high_watermark: i64,
    pub last_stable_offset: i64,
    pub aborted_transactions: Vec<AbortedTransaction>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbortedTransaction {
    pub producer_id: i64,
    pub first_offset: i64,
}

impl WireFormat for FetchResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.throttle_time_ms);
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            throttle_time_ms: get_i32(buf)?,
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for FetchTopicResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for FetchPartitionResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        self.error_code.encode(buf);
        buf.put_i64(self.high_watermark);
        buf.put_i64(self.last_stable_offset);
        put_vec(buf, &self.aborted_transactions);
        put_messages(buf, &self.messages);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            error_code: ErrorCode::decode(buf)?,
            high_watermark: get_i64(buf)?,
            last_stable_offset: get_i64(buf)?,
            aborted_transactions: get_vec(buf)?,
            messages: get_messages(buf)?,
        })
    }
}

impl WireFormat for AbortedTransaction {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64(self.producer_id);
        buf.put_i64(self.first_offset);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            producer_id: get_i64(buf)?,
            first_offset: get_i64(buf)?,
        })
    }
}

// ============================================================================
// ListOffsets (v1)
// ============================================================================

/// Looks up the offset for a timestamp, or one of [`LATEST_OFFSET`] /
/// [`EARLIEST_OFFSET`].
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetRequest {
    pub replica_id: i32,
    pub topics: Vec<OffsetTopic>,
}

impl Default for OffsetRequest {
    fn default() -> Self {
        Self {
            replica_id: CLIENT_REPLICA_ID,
            topics: Vec::new(),
        }
    }
}

impl OffsetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, topic: &str, partition: i32, timestamp: i64) -> Self {
        let entry = entry(
            &mut self.topics,
            topic,
            |t| t.name.as_str(),
            || OffsetTopic {
                name: topic.to_string(),
                partitions: Vec::new(),
            },
        );
        entry.partitions.push(OffsetPartition {
            partition,
            timestamp,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetTopic {
    pub name: String,
    pub partitions: Vec<OffsetPartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetPartition {
    pub partition: i32,
    pub timestamp: i64,
}

impl WireFormat for OffsetRequest {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.replica_id);
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            replica_id: get_i32(buf)?,
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetTopic {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetPartition {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        buf.put_i64(self.timestamp);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            timestamp: get_i64(buf)?,
        })
    }
}

impl KafkaRequest for OffsetRequest {
    const API_KEY: ApiKey = ApiKey::ListOffsets;
    const API_VERSION: i16 = 1;
    type Response = OffsetResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OffsetResponse {
    pub topics: Vec<OffsetTopicResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetTopicResponse {
    pub name: String,
    pub partitions: Vec<OffsetPartitionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetPartitionResponse {
    pub partition: i32,
    pub error_code: ErrorCode,
    pub timestamp: i64,
    pub offset: i64,
}

impl WireFormat for OffsetResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetTopicResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetPartitionResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        self.error_code.encode(buf);
        buf.put_i64(self.timestamp);
        buf.put_i64(self.offset);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            error_code: ErrorCode::decode(buf)?,
            timestamp: get_i64(buf)?,
            offset: get_i64(buf)?,
        })
    }
}

// ============================================================================
// FindCoordinator (v0)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupCoordinatorRequest {
    pub group_id: String,
}

impl GroupCoordinatorRequest {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
        }
    }
}

impl WireFormat for GroupCoordinatorRequest {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.group_id);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            group_id: get_string(buf)?,
        })
    }
}

impl KafkaRequest for GroupCoordinatorRequest {
    const API_KEY: ApiKey = ApiKey::FindCoordinator;
    const API_VERSION: i16 = 0;
    type Response = GroupCoordinatorResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupCoordinatorResponse {
    pub error_code: ErrorCode,
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

impl WireFormat for GroupCoordinatorResponse {
    fn encode(&self, buf: &mut BytesMut) {
        self.error_code.encode(buf);
        buf.put_i32(self.node_id);
        put_string(buf, &self.host);
        buf.put_i32(self.port);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            error_code: ErrorCode::decode(buf)?,
            node_id: get_i32(buf)?,
            host: get_string(buf)?,
            port: get_i32(buf)?,
        })
    }
}

// ============================================================================
// OffsetCommit (v2)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCommitRequest {
    pub group_id: String,
    /// `-1` commits outside of any group generation.
    pub generation_id: i32,
    pub member_id: String,
    /// `-1` keeps the broker's configured retention.
    pub retention_time_ms: i64,
    pub topics: Vec<OffsetCommitTopic>,
}

impl OffsetCommitRequest {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            generation_id: -1,
            member_id: String::new(),
            retention_time_ms: -1,
            topics: Vec::new(),
        }
    }

    pub fn with_offset(
        mut self,
        topic: &str,
        partition: i32,
        offset: i64,
        metadata: Option<String>,
    ) -> Self {
        let entry = entry(
            &mut self.topics,
            topic,
            |t| t.name.as_str(),
            || OffsetCommitTopic {
                name: topic.to_string(),
                partitions: Vec::new(),
            },
        );
        entry.partitions.push(OffsetCommitPartition {
            partition,
            offset,
            metadata,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCommitTopic {
    pub name: String,
    pub partitions: Vec<OffsetCommitPartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCommitPartition {
    pub partition: i32,
    pub offset: i64,
    pub metadata: Option<String>,
}

impl WireFormat for OffsetCommitRequest {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.group_id);
        buf.put_i32(self.generation_id);
        put_string(buf, &self.member_id);
        buf.put_i64(self.retention_time_ms);
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            group_id: get_string(buf)?,
            generation_id: get_i32(buf)?,
            member_id: get_string(buf)?,
            retention_time_ms: get_i64(buf)?,
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetCommitTopic {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetCommitPartition {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        buf.put_i64(self.offset);
        put_nullable_string(buf, self.metadata.as_deref());
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            offset: get_i64(buf)?,
            metadata: get_nullable_string(buf)?,
        })
    }
}

impl KafkaRequest for OffsetCommitRequest {
    const API_KEY: ApiKey = ApiKey::OffsetCommit;
    const API_VERSION: i16 = 2;
    type Response = OffsetCommitResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OffsetCommitResponse {
    pub topics: Vec<OffsetCommitTopicResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetCommitTopicResponse {
    pub name: String,
    pub partitions: Vec<OffsetCommitPartitionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetCommitPartitionResponse {
    pub partition: i32,
    pub error_code: ErrorCode,
}

impl WireFormat for OffsetCommitResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetCommitTopicResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_array(buf, &self.partitions, |buf, p| {
            buf.put_i32(p.partition);
            p.error_code.encode(buf);
        });
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_array(buf, |buf| {
                Ok(OffsetCommitPartitionResponse {
                    partition: get_i32(buf)?,
                    error_code: ErrorCode::decode(buf)?,
                })
            })?,
        })
    }
}

// ============================================================================
// OffsetFetch (v1)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetFetchRequest {
    pub group_id: String,
    pub topics: Vec<OffsetFetchTopic>,
}

impl OffsetFetchRequest {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            topics: Vec::new(),
        }
    }

    pub fn with_partition(mut self, topic: &str, partition: i32) -> Self {
        let entry = entry(
            &mut self.topics,
            topic,
            |t| t.name.as_str(),
            || OffsetFetchTopic {
                name: topic.to_string(),
                partitions: Vec::new(),
            },
        );
        entry.partitions.push(partition);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetFetchTopic {
    pub name: String,
    pub partitions: Vec<i32>,
}

impl WireFormat for OffsetFetchRequest {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.group_id);
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            group_id: get_string(buf)?,
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetFetchTopic {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl KafkaRequest for OffsetFetchRequest {
    const API_KEY: ApiKey = ApiKey::OffsetFetch;
    const API_VERSION: i16 = 1;
    type Response = OffsetFetchResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OffsetFetchResponse {
    pub topics: Vec<OffsetFetchTopicResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetFetchTopicResponse {
    pub name: String,
    pub partitions: Vec<OffsetFetchPartitionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetFetchPartitionResponse {
    pub partition: i32,
    /// `-1` when the group has no committed offset.
    pub offset: i64,
    pub metadata: Option<String>,
    pub error_code: ErrorCode,
}

impl WireFormat for OffsetFetchResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_vec(buf, &self.topics);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            topics: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetFetchTopicResponse {
    fn encode(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_vec(buf, &self.partitions);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: get_string(buf)?,
            partitions: get_vec(buf)?,
        })
    }
}

impl WireFormat for OffsetFetchPartitionResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.partition);
        buf.put_i64(self.offset);
        put_nullable_string(buf, self.metadata.as_deref());
        self.error_code.encode(buf);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Ok(Self {
            partition: get_i32(buf)?,
            offset: get_i64(buf)?,
            metadata: get_nullable_string(buf)?,
            error_code: ErrorCode::decode(buf)?,
        })
    }
}
