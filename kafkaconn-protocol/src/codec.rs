//! Encoder and decoder for Kafka request/response frames.

use crate::error::ProtocolError;
use crate::frame::{read_frame, write_frame, RequestFrame, RequestHeader, ResponseFrame};
use crate::message::KafkaRequest;
use crate::wire::WireFormat;
use bytes::{BufMut, Bytes, BytesMut};

/// Encodes requests and responses into size-prefixed frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request with a v1 request header.
    pub fn encode_request<R: KafkaRequest>(
        correlation_id: i32,
        client_id: Option<&str>,
        request: &R,
    ) -> Result<BytesMut, ProtocolError> {
        let header = RequestHeader {
            api_key: R::API_KEY.code(),
            api_version: R::API_VERSION,
            correlation_id,
            client_id: client_id.map(str::to_string),
        };
        let mut buf = BytesMut::with_capacity(64);
        write_frame(&mut buf, |buf| {
            header.encode(buf);
            request.encode(buf);
        })?;
        Ok(buf)
    }

    /// Encodes a response body behind a v0 response header.
    pub fn encode_response<T: WireFormat>(
        correlation_id: i32,
        response: &T,
    ) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(64);
        write_frame(&mut buf, |buf| {
            buf.put_i32(correlation_id);
            response.encode(buf);
        })?;
        Ok(buf)
    }
}

/// Accumulates bytes from a stream and yields whole frames.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_capacity(8192)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to split the next raw frame payload off the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        read_frame(&mut self.buffer)
    }

    /// Attempts to decode the next response frame.
    pub fn decode_response(&mut self) -> Result<Option<ResponseFrame>, ProtocolError> {
        self.decode_frame()?.map(ResponseFrame::parse).transpose()
    }

    /// Attempts to decode the next request frame.
    pub fn decode_request(&mut self) -> Result<Option<RequestFrame>, ProtocolError> {
        self.decode_frame()?.map(RequestFrame::parse).transpose()
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a typed body from the bytes following a frame header.
pub fn decode_body<T: WireFormat>(mut body: Bytes) -> Result<T, ProtocolError> {
    T::decode(&mut body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::message::{
        ApiKey, GroupCoordinatorRequest, GroupCoordinatorResponse, MetadataRequest,
    };

    #[test]
    fn test_request_roundtrip() {
        let request = GroupCoordinatorRequest::new("billing");
        let encoded = Encoder::encode_request(42, Some("kc"), &request).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);

        let frame = decoder.decode_request().unwrap().unwrap();
        assert_eq!(frame.header.api().unwrap(), ApiKey::FindCoordinator);
        assert_eq!(frame.header.api_version, 0);
        assert_eq!(frame.header.correlation_id, 42);
        assert_eq!(frame.header.client_id.as_deref(), Some("kc"));

        let decoded: GroupCoordinatorRequest = decode_body(frame.body).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_partial_frame_decoding() {
        let response = GroupCoordinatorResponse {
            error_code: ErrorCode::None,
            node_id: 3,
            host: "broker-3".to_string(),
            port: 9092,
        };
        let encoded = Encoder::encode_response(9, &response).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded[..6]);
        assert!(decoder.decode_response().unwrap().is_none());
        assert_eq!(decoder.buffered(), 6);

        decoder.extend(&encoded[6..]);
        let frame = decoder.decode_response().unwrap().unwrap();
        assert_eq!(frame.correlation_id, 9);
        assert_eq!(
            decode_body::<GroupCoordinatorResponse>(frame.body).unwrap(),
            response
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_anonymous_client_id() {
        let encoded = Encoder::encode_request(1, None, &MetadataRequest::default()).unwrap();
        // size, api_key, api_version, correlation_id, null client_id, empty topic array
        assert_eq!(
            &encoded[..],
            &[0, 0, 0, 14, 0, 3, 0, 0, 0, 0, 0, 1, 0xFF, 0xFF, 0, 0, 0, 0][..]
        );
    }
}
