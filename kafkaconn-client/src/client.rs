//! Request methods, one per Kafka API.
//!
//! Every method follows the same path: take a correlation ID and encode the
//! frame, then register a waiter, write, and decode the body it receives.

use crate::connection::Connection;
use crate::error::ClientError;
use kafkaconn_protocol::message::*;
use kafkaconn_protocol::{decode_body, Encoder};

impl Connection {
    // =========================================================================
    // Helper methods
    // =========================================================================

    async fn roundtrip<R: KafkaRequest>(&self, request: &R) -> Result<R::Response, ClientError> {
        let id = self.next_correlation_id().await?;
        let frame = Encoder::encode_request(id, self.client_id(), request)?;

        let waiter = self.shared().register(id)?;
        tracing::debug!(correlation_id = id, api = ?R::API_KEY, "sending request");
        self.write_frame(id, &frame).await?;

        let body = waiter.await.map_err(|_| self.shared().failure())?;
        Ok(decode_body(body)?)
    }

    // =========================================================================
    // Cluster
    // =========================================================================

    /// Fetches broker and topic metadata.
    pub async fn metadata(
        &self,
        request: &MetadataRequest,
    ) -> Result<MetadataResponse, ClientError> {
        self.roundtrip(request).await
    }

    // =========================================================================
    // Data plane
    // =========================================================================

    /// Produces messages.
    ///
    /// With [`RequiredAcks::None`] the broker sends nothing back, so the
    /// request is only written and `Ok(None)` is returned.
    pub async fn produce(
        &self,
        request: &ProduceRequest,
    ) -> Result<Option<ProduceResponse>, ClientError> {
        if request.required_acks != RequiredAcks::None {
            return self.roundtrip(request).await.map(Some);
        }

        let id = self.next_correlation_id().await?;
        let frame = Encoder::encode_request(id, self.client_id(), request)?;
        tracing::debug!(correlation_id = id, "sending produce without acks");
        self.write_frame(id, &frame).await?;
        Ok(None)
    }

    /// Fetches messages.
    ///
    /// Brokers return whole batches, which may start before the requested
    /// offset; those leading messages are dropped from each partition.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ClientError> {
        let mut response = self.roundtrip(request).await?;
        trim_fetch_response(request, &mut response);
        Ok(response)
    }

    /// Looks up offsets by timestamp. The replica id is always sent as `-1`.
    pub async fn offset(&self, request: &OffsetRequest) -> Result<OffsetResponse, ClientError> {
        let request = OffsetRequest {
            replica_id: CLIENT_REPLICA_ID,
            topics: request.topics.clone(),
        };
        self.roundtrip(&request).await
    }

    // =========================================================================
    // Consumer groups
    // =========================================================================

    /// Finds the coordinator broker for a consumer group.
    pub async fn group_coordinator(
        &self,
        request: &GroupCoordinatorRequest,
    ) -> Result<GroupCoordinatorResponse, ClientError> {
        self.roundtrip(request).await
    }

    pub async fn offset_commit(
        &self,
        request: &OffsetCommitRequest,
    ) -> Result<OffsetCommitResponse, ClientError> {
        self.roundtrip(request).await
    }

    pub async fn offset_fetch(
        &self,
        request: &OffsetFetchRequest,
    ) -> Result<OffsetFetchResponse, ClientError> {
        self.roundtrip(request).await
    }
}

/// Drops, per partition, the leading messages below the requested offset.
///
/// Partitions are matched to the request by topic and partition index.
/// Partitions the request did not name are left alone.
pub(crate) fn trim_fetch_response(request: &FetchRequest, response: &mut FetchResponse) {
    for topic in &mut response.topics {
        for partition in &mut topic.partitions {
            let Some(offset) = request.fetch_offset(&topic.name, partition.partition) else {
                continue;
            };
            let stale = partition
                .messages
                .iter()
                .take_while(|m| m.offset < offset)
                .count();
            partition.messages.drain(..stale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use crate::testing::{body, MockBroker};
    use bytes::{BufMut, BytesMut};
    use kafkaconn_protocol::frame::write_frame;
    use kafkaconn_protocol::{ErrorCode, Message, ProtocolError};
    use proptest::prelude::*;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn partition(index: i32, offsets: &[i64]) -> FetchPartitionResponse {
        FetchPartitionResponse {
            partition: index,
            high_watermark: offsets.last().map(|o| o + 1).unwrap_or(0),
            messages: offsets
                .iter()
                .map(|&o| Message::new(format!("m{o}")).with_offset(o))
                .collect(),
            ..Default::default()
        }
    }

    fn offsets_of(partition: &FetchPartitionResponse) -> Vec<i64> {
        partition.messages.iter().map(|m| m.offset).collect()
    }

    #[tokio::test]
    async fn test_request_header_is_stamped() {
        let (conn, mut broker) =
            MockBroker::pair_with(ConnectionConfig::new("mock:9092").with_client_id("billing"));
        let conn = Arc::new(conn);

        let pending = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.metadata(&MetadataRequest::new(["orders"])).await })
        };

        let frame = broker.recv().await;
        assert_eq!(frame.header.api().unwrap(), ApiKey::Metadata);
        assert_eq!(frame.header.api_version, 0);
        assert_eq!(frame.header.correlation_id, 1);
        assert_eq!(frame.header.client_id.as_deref(), Some("billing"));
        assert_eq!(body::<MetadataRequest>(&frame).topics, vec!["orders"]);

        let response = MetadataResponse {
            brokers: vec![Broker {
                node_id: 1,
                host: "broker-1".to_string(),
                port: 9092,
            }],
            topics: vec![],
        };
        broker.reply(1, &response).await;

        assert_eq!(assert_ok!(pending.await.unwrap()), response);
        assert_eq!(conn.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_order_responses() {
        let (conn, mut broker) = MockBroker::pair();
        let conn = Arc::new(conn);
        let topics = ["a", "b", "c"];

        let mut handles = Vec::new();
        for topic in topics {
            let conn = conn.clone();
            handles.push(tokio::spawn(async move {
                conn.metadata(&MetadataRequest::new([topic])).await
            }));
        }

        let mut frames = Vec::new();
        for _ in 0..topics.len() {
            frames.push(broker.recv().await);
        }
        let mut ids: Vec<i32> = frames.iter().map(|f| f.header.correlation_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), topics.len());

        for frame in frames.iter().rev() {
            let request: MetadataRequest = body(frame);
            let response = MetadataResponse {
                brokers: vec![],
                topics: vec![TopicMetadata {
                    error_code: ErrorCode::None,
                    name: request.topics[0].clone(),
                    partitions: vec![],
                }],
            };
            broker.reply(frame.header.correlation_id, &response).await;
        }

        for (handle, topic) in handles.into_iter().zip(topics) {
            let response = assert_ok!(handle.await.unwrap());
            assert_eq!(response.topics[0].name, topic);
        }
    }

    #[tokio::test]
    async fn test_produce_without_acks_allocates_no_waiter() {
        let (conn, mut broker) = MockBroker::pair();
        let request = ProduceRequest::new(RequiredAcks::None).with_messages(
            "orders",
            0,
            vec![Message::new("hello").with_key("k")],
        );

        let result = assert_ok!(conn.produce(&request).await);
        assert!(result.is_none());
        assert_eq!(conn.pending_count(), 0);

        let frame = broker.recv().await;
        assert_eq!(frame.header.api().unwrap(), ApiKey::Produce);
        assert_eq!(frame.header.api_version, 3);
        let sent: ProduceRequest = body(&frame);
        assert_eq!(sent.required_acks, RequiredAcks::None);
        let message = &sent.topics[0].partitions[0].messages[0];
        assert_eq!(message.value.as_deref(), Some(&b"hello"[..]));
        assert_eq!(message.key.as_deref(), Some(&b"k"[..]));
    }

    #[tokio::test]
    async fn test_produce_with_acks_waits_for_response() {
        let (conn, mut broker) = MockBroker::pair();
        let conn = Arc::new(conn);
        let request = ProduceRequest::new(RequiredAcks::All).with_messages(
            "orders",
            2,
            vec![Message::new("a"), Message::new("b")],
        );

        let pending = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.produce(&request).await })
        };
        let frame = broker.recv().await;
        let response = ProduceResponse {
            topics: vec![ProduceTopicResponse {
                name: "orders".to_string(),
                partitions: vec![ProducePartitionResponse {
                    partition: 2,
                    error_code: ErrorCode::None,
                    base_offset: 100,
                    log_append_time: -1,
                }],
            }],
            throttle_time_ms: 0,
        };
        broker.reply(frame.header.correlation_id, &response).await;

        let result = assert_ok!(pending.await.unwrap());
        assert_eq!(result, Some(response));
    }

    #[tokio::test]
    async fn test_fetch_trims_leading_messages() {
        let (conn, mut broker) = MockBroker::pair();
        let conn = Arc::new(conn);
        let request = FetchRequest::new()
            .with_partition("orders", 0, 7, 1 << 20)
            .with_partition("orders", 1, 12, 1 << 20);

        let pending = {
            let conn = conn.clone();
            let request = request.clone();
            tokio::spawn(async move { conn.fetch(&request).await })
        };

        let frame = broker.recv().await;
        assert_eq!(frame.header.api().unwrap(), ApiKey::Fetch);
        assert_eq!(body::<FetchRequest>(&frame), request);

        // Partitions come back in a different order than requested.
        let response = FetchResponse {
            throttle_time_ms: 0,
            topics: vec![FetchTopicResponse {
                name: "orders".to_string(),
                partitions: vec![
                    partition(1, &[5, 6, 7, 10, 11]),
                    partition(0, &[5, 6, 7, 10, 11]),
                ],
            }],
        };
        broker.reply(frame.header.correlation_id, &response).await;

        let fetched = assert_ok!(pending.await.unwrap());
        let partitions = &fetched.topics[0].partitions;
        assert_eq!(partitions[0].partition, 1);
        assert!(partitions[0].messages.is_empty());
        assert_eq!(partitions[1].partition, 0);
        assert_eq!(offsets_of(&partitions[1]), vec![7, 10, 11]);
        assert_eq!(
            partitions[1].messages[0].value.as_deref(),
            Some(&b"m7"[..])
        );
    }

    #[test]
    fn test_trim_leaves_unrequested_partitions() {
        let request = FetchRequest::new().with_partition("orders", 0, 7, 1024);
        let mut response = FetchResponse {
            throttle_time_ms: 0,
            topics: vec![
                FetchTopicResponse {
                    name: "orders".to_string(),
                    partitions: vec![partition(3, &[1, 2])],
                },
                FetchTopicResponse {
                    name: "payments".to_string(),
                    partitions: vec![partition(0, &[1, 2])],
                },
            ],
        };

        trim_fetch_response(&request, &mut response);
        assert_eq!(offsets_of(&response.topics[0].partitions[0]), vec![1, 2]);
        assert_eq!(offsets_of(&response.topics[1].partitions[0]), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_offset_forces_client_replica_id() {
        let (conn, mut broker) = MockBroker::pair();
        let conn = Arc::new(conn);
        let mut request = OffsetRequest::new().with_partition("orders", 0, EARLIEST_OFFSET);
        request.replica_id = 7;

        let pending = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.offset(&request).await })
        };

        let frame = broker.recv().await;
        assert_eq!(frame.header.api().unwrap(), ApiKey::ListOffsets);
        assert_eq!(frame.header.api_version, 1);
        let sent: OffsetRequest = body(&frame);
        assert_eq!(sent.replica_id, -1);
        assert_eq!(sent.topics[0].partitions[0].timestamp, EARLIEST_OFFSET);

        let response = OffsetResponse {
            topics: vec![OffsetTopicResponse {
                name: "orders".to_string(),
                partitions: vec![OffsetPartitionResponse {
                    partition: 0,
                    error_code: ErrorCode::None,
                    timestamp: -1,
                    offset: 42,
                }],
            }],
        };
        broker.reply(frame.header.correlation_id, &response).await;
        assert_eq!(assert_ok!(pending.await.unwrap()), response);
    }

    #[tokio::test]
    async fn test_consumer_group_requests() {
        let (conn, mut broker) = MockBroker::pair();
        let conn = Arc::new(conn);

        let pending = {
            let conn = conn.clone();
            tokio::spawn(async move {
                let coordinator = conn
                    .group_coordinator(&GroupCoordinatorRequest::new("billing"))
                    .await?;
                let committed = conn
                    .offset_commit(
                        &OffsetCommitRequest::new("billing").with_offset(
                            "orders",
                            0,
                            42,
                            Some("m".to_string()),
                        ),
                    )
                    .await?;
                let fetched = conn
                    .offset_fetch(&OffsetFetchRequest::new("billing").with_partition("orders", 0))
                    .await?;
                Ok::<_, ClientError>((coordinator, committed, fetched))
            })
        };

        let frame = broker.recv().await;
        assert_eq!(frame.header.api().unwrap(), ApiKey::FindCoordinator);
        assert_eq!(body::<GroupCoordinatorRequest>(&frame).group_id, "billing");
        let coordinator = GroupCoordinatorResponse {
            error_code: ErrorCode::None,
            node_id: 2,
            host: "broker-2".to_string(),
            port: 9092,
        };
        broker.reply(frame.header.correlation_id, &coordinator).await;

        let frame = broker.recv().await;
        assert_eq!(frame.header.api().unwrap(), ApiKey::OffsetCommit);
        assert_eq!(frame.header.api_version, 2);
        let commit: OffsetCommitRequest = body(&frame);
        assert_eq!(commit.topics[0].partitions[0].offset, 42);
        assert_eq!(commit.topics[0].partitions[0].metadata.as_deref(), Some("m"));
        let committed = OffsetCommitResponse {
            topics: vec![OffsetCommitTopicResponse {
                name: "orders".to_string(),
                partitions: vec![OffsetCommitPartitionResponse {
                    partition: 0,
                    error_code: ErrorCode::None,
                }],
            }],
        };
        broker.reply(frame.header.correlation_id, &committed).await;

        let frame = broker.recv().await;
        assert_eq!(frame.header.api().unwrap(), ApiKey::OffsetFetch);
        assert_eq!(frame.header.api_version, 1);
        let fetched = OffsetFetchResponse {
            topics: vec![OffsetFetchTopicResponse {
                name: "orders".to_string(),
                partitions: vec![OffsetFetchPartitionResponse {
                    partition: 0,
                    offset: 42,
                    metadata: Some("m".to_string()),
                    error_code: ErrorCode::None,
                }],
            }],
        };
        broker.reply(frame.header.correlation_id, &fetched).await;

        let (a, b, c) = assert_ok!(pending.await.unwrap());
        assert_eq!(a, coordinator);
        assert_eq!(b, committed);
        assert_eq!(c, fetched);
    }

    #[tokio::test]
    async fn test_decode_error_is_local_to_one_request() {
        let (conn, mut broker) = MockBroker::pair();
        let conn = Arc::new(conn);

        let first = {
            let conn = conn.clone();
            tokio::spawn(async move {
                conn.group_coordinator(&GroupCoordinatorRequest::new("g"))
                    .await
            })
        };
        let frame = broker.recv().await;

        // Header plus a single byte where a full body belongs.
        let mut raw = BytesMut::new();
        write_frame(&mut raw, |buf| {
            buf.put_i32(frame.header.correlation_id);
            buf.put_u8(0);
        })
        .unwrap();
        broker.send_raw(&raw).await;

        let err = assert_err!(first.await.unwrap());
        assert!(matches!(
            &err,
            ClientError::Protocol(e) if matches!(**e, ProtocolError::UnexpectedEof { .. })
        ));
        assert!(!conn.is_closed());

        let second = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.metadata(&MetadataRequest::default()).await })
        };
        let frame = broker.recv().await;
        broker
            .reply(frame.header.correlation_id, &MetadataResponse::default())
            .await;
        assert_ok!(second.await.unwrap());
    }

    proptest! {
        #[test]
        fn prop_trim_drops_only_leading_stale_messages(
            offsets in prop::collection::vec(0i64..100, 0..24),
            fetch_offset in 0i64..100,
        ) {
            let request = FetchRequest::new().with_partition("t", 0, fetch_offset, 1024);
            let mut response = FetchResponse {
                throttle_time_ms: 0,
                topics: vec![FetchTopicResponse {
                    name: "t".to_string(),
                    partitions: vec![partition(0, &offsets)],
                }],
            };

            trim_fetch_response(&request, &mut response);
            let kept = offsets_of(&response.topics[0].partitions[0]);
            let dropped = offsets.len() - kept.len();

            prop_assert_eq!(&offsets[dropped..], &kept[..]);
            prop_assert!(offsets[..dropped].iter().all(|&o| o < fetch_offset));
            if let Some(&first) = kept.first() {
                prop_assert!(first >= fetch_offset);
            }
        }
    }
}
