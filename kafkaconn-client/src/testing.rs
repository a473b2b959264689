//! In-memory broker used by the tests.

use crate::connection::{Connection, ConnectionConfig};
use kafkaconn_protocol::{decode_body, Decoder, Encoder, RequestFrame, WireFormat};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

const DUPLEX_CAPACITY: usize = 64 * 1024;

/// The broker end of a duplex stream.
pub(crate) struct MockBroker {
    stream: DuplexStream,
    decoder: Decoder,
}

impl MockBroker {
    /// Returns a connection wired to a fresh mock broker.
    pub(crate) fn pair() -> (Connection, MockBroker) {
        Self::pair_with(ConnectionConfig::new("mock:9092"))
    }

    pub(crate) fn pair_with(config: ConnectionConfig) -> (Connection, MockBroker) {
        let (client, server) = tokio::io::duplex(DUPLEX_CAPACITY);
        let conn = Connection::from_stream(config.addr.clone(), client, config);
        let broker = MockBroker {
            stream: server,
            decoder: Decoder::new(),
        };
        (conn, broker)
    }

    /// Waits for the next complete request frame.
    pub(crate) async fn recv(&mut self) -> RequestFrame {
        self.try_recv()
            .await
            .expect("client closed the stream before sending a request")
    }

    /// Waits for the next request frame, or `None` on EOF.
    pub(crate) async fn try_recv(&mut self) -> Option<RequestFrame> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.decode_request().expect("malformed request") {
                return Some(frame);
            }
            let n = self.stream.read(&mut buf).await.expect("mock read failed");
            if n == 0 {
                return None;
            }
            self.decoder.extend(&buf[..n]);
        }
    }

    /// Sends a well-formed response for `correlation_id`.
    pub(crate) async fn reply<T: WireFormat>(&mut self, correlation_id: i32, body: &T) {
        let frame = Encoder::encode_response(correlation_id, body).expect("encode response");
        self.send_raw(&frame).await;
    }

    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("mock write failed");
    }
}

/// Decodes the typed body of a captured request.
pub(crate) fn body<T: WireFormat>(frame: &RequestFrame) -> T {
    decode_body(frame.body.clone()).expect("decode request body")
}

/// A stream whose reads work but whose writes always fail.
pub(crate) struct BrokenWriter {
    inner: DuplexStream,
}

impl BrokenWriter {
    pub(crate) fn new(inner: DuplexStream) -> Self {
        Self { inner }
    }
}

impl AsyncRead for BrokenWriter {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for BrokenWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
