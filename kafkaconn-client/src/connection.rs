//! Connection management.
//!
//! A [`Connection`] owns one duplex stream to a broker. Callers write whole
//! request frames under the writer lock; a single demultiplexer task reads
//! response frames and routes each one to the waiter registered for its
//! correlation ID. The first terminal error is latched and seen by every
//! caller from then on.

use crate::correlation::CorrelationIds;
use crate::error::ClientError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use kafkaconn_protocol::{Decoder, ResponseFrame};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default dial timeout.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Client id sent in request headers unless configured otherwise.
pub const DEFAULT_CLIENT_ID: &str = "kafkaconn";

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Broker address (`host:port`).
    pub addr: String,
    /// How long to wait for the TCP dial.
    pub dial_timeout: Duration,
    /// Client id stamped into every request header.
    pub client_id: Option<String>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            client_id: Some(DEFAULT_CLIENT_ID.to_string()),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sends a null client id.
    pub fn without_client_id(mut self) -> Self {
        self.client_id = None;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Error slot and waiter registry. Always mutated under one lock together
/// with the stop signal.
#[derive(Default)]
struct State {
    error: Option<ClientError>,
    waiters: HashMap<i32, oneshot::Sender<Bytes>>,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    stop: watch::Sender<bool>,
}

impl Shared {
    fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            state: Mutex::new(State::default()),
            stop,
        }
    }

    /// Records `err` as the terminal error and fires the stop signal.
    ///
    /// Returns `false` if an earlier error already won.
    pub(crate) fn latch(&self, err: ClientError) -> bool {
        let mut state = self.state.lock();
        if state.error.is_some() {
            return false;
        }
        state.error = Some(err);
        self.stop.send_replace(true);
        true
    }

    pub(crate) fn terminal_error(&self) -> Option<ClientError> {
        self.state.lock().error.clone()
    }

    /// The latched error, or `Closed` if none is set yet.
    pub(crate) fn failure(&self) -> ClientError {
        self.terminal_error().unwrap_or(ClientError::Closed)
    }

    pub(crate) fn register(&self, id: i32) -> Result<oneshot::Receiver<Bytes>, ClientError> {
        let mut state = self.state.lock();
        if let Some(err) = &state.error {
            return Err(err.clone());
        }
        if state.waiters.contains_key(&id) {
            tracing::error!(correlation_id = id, "correlation id reused before resolution");
            return Err(ClientError::CorrelationConflict(id));
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(id, tx);
        Ok(rx)
    }

    pub(crate) fn release(&self, id: i32) {
        // Dropping the sender resolves the receiver empty.
        self.state.lock().waiters.remove(&id);
    }

    fn dispatch(&self, frame: ResponseFrame) {
        let mut state = self.state.lock();
        let Some(waiter) = state.waiters.remove(&frame.correlation_id) else {
            drop(state);
            tracing::warn!(
                correlation_id = frame.correlation_id,
                "discarding response with no pending request"
            );
            return;
        };

        if *self.stop.borrow() {
            if state.error.is_none() {
                state.error = Some(ClientError::Closed);
            }
            return;
        }

        tracing::debug!(
            correlation_id = frame.correlation_id,
            bytes = frame.body.len(),
            "delivering response"
        );
        let _ = waiter.send(frame.body);
    }

    fn drain(&self) {
        let waiters = std::mem::take(&mut self.state.lock().waiters);
        if !waiters.is_empty() {
            tracing::debug!("releasing {} pending requests", waiters.len());
        }
    }

    fn pending_count(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

/// A multiplexed connection to one Kafka broker.
///
/// Cheap to share behind an `Arc`; every request method takes `&self`.
pub struct Connection {
    addr: String,
    established_at: DateTime<Utc>,
    client_id: Option<String>,
    shared: Arc<Shared>,
    ids: CorrelationIds,
    writer: tokio::sync::Mutex<BoxedWriter>,
}

impl Connection {
    /// Dials `addr` and starts the connection's background tasks.
    pub async fn open(addr: &str, dial_timeout: Duration) -> Result<Self, ClientError> {
        Self::connect(ConnectionConfig::new(addr).with_dial_timeout(dial_timeout)).await
    }

    /// Dials the configured broker.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);

        let stream = tokio::time::timeout(config.dial_timeout, TcpStream::connect(&config.addr))
            .await
            .map_err(|_| ClientError::Dial {
                addr: config.addr.clone(),
                message: format!("timed out after {:?}", config.dial_timeout),
            })?
            .map_err(|e| ClientError::Dial {
                addr: config.addr.clone(),
                message: e.to_string(),
            })?;

        stream.set_nodelay(true).ok();
        tracing::debug!("TCP connected to {}", config.addr);

        let addr = config.addr.clone();
        Ok(Self::from_stream(addr, stream, config))
    }

    /// Wraps an already established stream.
    ///
    /// Must be called inside a Tokio runtime; spawns the ID generator and the
    /// response demultiplexer.
    pub fn from_stream<S>(addr: impl Into<String>, stream: S, config: ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let shared = Arc::new(Shared::new());
        let ids = CorrelationIds::spawn(shared.stop.subscribe());

        tokio::spawn(demux(
            shared.clone(),
            Box::new(reader),
            config.read_buffer_size,
        ));

        Self {
            addr: addr.into(),
            established_at: Utc::now(),
            client_id: config.client_id,
            shared,
            ids,
            writer: tokio::sync::Mutex::new(Box::new(writer)),
        }
    }

    /// Broker address this connection was opened against.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// When the stream was established.
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Whether a terminal error (including an explicit close) has been recorded.
    pub fn is_closed(&self) -> bool {
        self.shared.terminal_error().is_some()
    }

    /// The latched terminal error, if any.
    pub fn terminal_error(&self) -> Option<ClientError> {
        self.shared.terminal_error()
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending_count()
    }

    /// Closes the connection.
    ///
    /// Idempotent. Outstanding requests resolve with [`ClientError::Closed`]
    /// unless another error was recorded first.
    pub async fn close(&self) -> Result<(), ClientError> {
        if self.shared.latch(ClientError::Closed) {
            tracing::debug!("Closing connection to {}", self.addr);
        }

        // Writers drop the lock as soon as the stop signal is set.
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub(crate) fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Takes the next correlation ID, or the latched error once closed.
    pub(crate) async fn next_correlation_id(&self) -> Result<i32, ClientError> {
        match self.ids.next().await {
            Some(id) => Ok(id),
            None => Err(self.shared.failure()),
        }
    }

    /// Writes one whole frame. A failed write is terminal for the connection.
    ///
    /// Both the wait for the writer lock and the write itself give up once
    /// the stop signal fires, so a broker that stops reading cannot block
    /// callers past `close()`.
    pub(crate) async fn write_frame(
        &self,
        correlation_id: i32,
        frame: &[u8],
    ) -> Result<(), ClientError> {
        let mut stop = self.shared.stop.subscribe();
        let write = async {
            let mut writer = self.writer.lock().await;
            match writer.write_all(frame).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };

        let result = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => None,
            result = write => Some(result),
        };

        match result {
            None => {
                tracing::debug!(correlation_id, "write abandoned, connection stopped");
                self.shared.release(correlation_id);
                Err(self.shared.failure())
            }
            Some(Ok(())) => {
                tracing::debug!(correlation_id, bytes = frame.len(), "request sent");
                Ok(())
            }
            Some(Err(e)) => {
                tracing::warn!(correlation_id, "write failed: {}", e);
                let err = ClientError::from(e);
                self.shared.release(correlation_id);
                self.shared.latch(err.clone());
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.addr)
            .field("established_at", &self.established_at)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Stops both background tasks.
        self.shared.latch(ClientError::Closed);
    }
}

/// Reads frames until the stream fails or the stop signal fires, then
/// releases every outstanding waiter.
async fn demux(shared: Arc<Shared>, mut reader: BoxedReader, buffer_size: usize) {
    let mut stop = shared.stop.subscribe();
    let mut decoder = Decoder::with_capacity(buffer_size);
    let mut buf = vec![0u8; buffer_size];

    let err = loop {
        match decoder.decode_response() {
            Ok(Some(frame)) => {
                shared.dispatch(frame);
                continue;
            }
            Ok(None) => {}
            Err(e) => break ClientError::from(e),
        }

        let read = tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => None,
            read = reader.read(&mut buf) => Some(read),
        };
        match read {
            None => break ClientError::Closed,
            Some(Ok(0)) => {
                break ClientError::from(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "broker closed the connection",
                ))
            }
            Some(Ok(n)) => decoder.extend(&buf[..n]),
            Some(Err(e)) => break ClientError::from(e),
        }
    };

    if shared.latch(err.clone()) {
        tracing::warn!("connection failed: {}", err);
    }
    if decoder.buffered() > 0 {
        tracing::debug!("dropping {} bytes of a partial frame", decoder.buffered());
    }
    shared.drain();
    tracing::debug!("demultiplexer stopped");
}
