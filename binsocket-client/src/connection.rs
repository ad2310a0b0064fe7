//! WebSocket client connection handling for BinSocket
//!
//! An upgraded stream is split into a reader task and a writer task that
//! share one [`Connection`]. All lifecycle changes go through the
//! connection's lock, which is what makes sends FIFO across threads and the
//! terminal callback fire exactly once.

use crate::config::ClientConfig;
use crate::listener::{Dispatcher, Event, Listener};
use crate::websocket::WebSocket;
use binsocket_core::error::{CloseCode, ProtocolError, UsageError};
use binsocket_core::protocol::constants::MAX_CLOSE_REASON_SIZE;
use binsocket_core::protocol::utils;
use binsocket_core::transport::{TransportRead, TransportStream, TransportWrite};
use binsocket_core::{
    CloseFrame, ConnectionState, Error, Frame, FrameLimits, FrameParser, Message,
    MessageAssembler, Result, Role,
};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};

const READ_BUFFER_SIZE: usize = 8192;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Connection metadata
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Server address, when the transport has one
    pub remote_addr: Option<SocketAddr>,
    /// WebSocket subprotocol selected by the server
    pub subprotocol: Option<String>,
    /// Connection established time
    pub established_at: Instant,
    /// Complete messages sent
    pub messages_sent: u64,
    /// Complete messages received
    pub messages_received: u64,
    /// Payload bytes sent
    pub bytes_sent: u64,
    /// Payload bytes received
    pub bytes_received: u64,
}

#[derive(Debug, Default)]
struct Counters {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

#[derive(Debug)]
enum Outbound {
    Frame(Bytes),
    Shutdown,
}

/// How a connection ended
#[derive(Debug)]
enum Outcome {
    Closed(Option<CloseFrame>),
    Failed(Error),
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    /// A streamed message has been started and not yet finished
    streaming: bool,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedSender<Event>,
}

impl Inner {
    fn ensure_open(&self) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(UsageError::NotOpen(self.state).into());
        }
        Ok(())
    }

    fn send_frame(&self, frame: Frame) -> Result<()> {
        let bytes = frame.for_role(Role::Client).to_bytes();
        self.outbound
            .send(Outbound::Frame(bytes))
            .map_err(|_| Error::Connection("connection writer has stopped".to_string()))
    }

    /// Queue `payload` as one or more frames of at most `max_frame_size` bytes
    fn send_fragments(
        &self,
        payload: Bytes,
        first: bool,
        last: bool,
        max_frame_size: usize,
    ) -> Result<()> {
        if payload.len() <= max_frame_size {
            return self.send_frame(Frame::fragment(payload, first, last));
        }

        let len = payload.len();
        let mut offset = 0;
        while offset < len {
            let end = (offset + max_frame_size).min(len);
            let frame = Frame::fragment(
                payload.slice(offset..end),
                first && offset == 0,
                last && end == len,
            );
            self.send_frame(frame)?;
            offset = end;
        }
        Ok(())
    }
}

/// State shared by the reader, the writer and every [`WebSocket`] handle
#[derive(Debug)]
pub(crate) struct Connection {
    id: u64,
    config: Arc<ClientConfig>,
    inner: Mutex<Inner>,
    /// Wakes the reader once the connection has reached a terminal state
    shutdown: Notify,
    runtime: Handle,
    counters: Counters,
    remote_addr: Option<SocketAddr>,
    subprotocol: Option<String>,
    established_at: Instant,
}

impl Connection {
    /// Start the connection tasks on an upgraded stream.
    ///
    /// `leftover` holds bytes that arrived together with the handshake
    /// response. Returns once every listener's `on_open` has run.
    pub(crate) async fn start(
        stream: Box<dyn TransportStream>,
        leftover: BytesMut,
        subprotocol: Option<String>,
        config: Arc<ClientConfig>,
        listeners: Vec<Box<dyn Listener>>,
    ) -> WebSocket {
        let remote_addr = stream.remote_addr().ok();
        let (reader, writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Connection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            config,
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                streaming: false,
                outbound: outbound_tx,
                events: events_tx,
            }),
            shutdown: Notify::new(),
            runtime: Handle::current(),
            counters: Counters::default(),
            remote_addr,
            subprotocol,
            established_at: Instant::now(),
        });
        let websocket = WebSocket::new(connection.id, Arc::downgrade(&connection));

        tokio::spawn(Dispatcher::new(listeners, websocket.clone(), events_rx).run());
        tokio::spawn(write_loop(connection.clone(), writer, outbound_rx));

        let opened = connection.open();
        tokio::spawn(read_loop(connection.clone(), reader, leftover));

        #[cfg(feature = "metrics")]
        metrics::counter!("binsocket_client_connections_opened_total").increment(1);

        tracing::debug!(
            connection = connection.id,
            remote = ?connection.remote_addr,
            "websocket connection open"
        );

        // The dispatcher only drops the sender if it has stopped, which
        // cannot happen before the open event.
        let _ = opened.await;
        websocket
    }

    fn open(&self) -> tokio::sync::oneshot::Receiver<()> {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let mut inner = self.lock();
        inner.state = ConnectionState::Open;
        let _ = inner.events.send(Event::Open(done_tx));
        done_rx
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub(crate) fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub(crate) fn metadata(&self) -> ConnectionMetadata {
        ConnectionMetadata {
            remote_addr: self.remote_addr,
            subprotocol: self.subprotocol.clone(),
            established_at: self.established_at,
            messages_sent: self.counters.messages_sent.load(Ordering::Relaxed),
            messages_received: self.counters.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.counters.bytes_received.load(Ordering::Relaxed),
        }
    }

    /// Queue a whole binary message
    pub(crate) fn send_message(&self, payload: Bytes) -> Result<()> {
        let inner = self.lock();
        inner.ensure_open()?;
        if inner.streaming {
            return Err(UsageError::FragmentSequenceOpen.into());
        }

        let len = payload.len();
        inner.send_fragments(payload, true, true, self.config.max_frame_size)?;
        self.record_sent(len, true);
        Ok(())
    }

    /// Queue one fragment of a streamed binary message
    pub(crate) fn stream(&self, payload: Bytes, is_last: bool) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_open()?;

        let len = payload.len();
        let first = !inner.streaming;
        inner.send_fragments(payload, first, is_last, self.config.max_frame_size)?;
        inner.streaming = !is_last;
        self.record_sent(len, is_last);
        Ok(())
    }

    /// Start the close handshake.
    ///
    /// Does nothing unless the connection is open. If the peer has not
    /// answered within the configured close timeout the connection is
    /// closed anyway and listeners see `on_close` without a status.
    pub(crate) fn close(self: &Arc<Self>, code: CloseCode, reason: &str) -> Result<()> {
        if !utils::is_sendable(code) {
            return Err(ProtocolError::InvalidCloseCode(code.code()).into());
        }
        if reason.len() > MAX_CLOSE_REASON_SIZE {
            return Err(ProtocolError::InvalidClosePayload(format!(
                "close reason is {} bytes (max: {})",
                reason.len(),
                MAX_CLOSE_REASON_SIZE
            ))
            .into());
        }

        let mut inner = self.lock();
        if inner.state != ConnectionState::Open {
            return Ok(());
        }
        let reason = (!reason.is_empty()).then_some(reason);
        inner.send_frame(Frame::close(Some(code.code()), reason))?;
        inner.state = ConnectionState::Closing;
        inner.streaming = false;
        drop(inner);

        tracing::debug!(connection = self.id, %code, "close handshake started");

        let connection = Arc::downgrade(self);
        let timeout = self.config.close_timeout;
        self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(connection) = connection.upgrade() {
                if connection.finish(Outcome::Closed(None)) {
                    tracing::warn!(
                        connection = connection.id,
                        ?timeout,
                        "close handshake timed out"
                    );
                }
            }
        });
        Ok(())
    }

    /// Handle raw bytes from the transport; returns `false` once reading should stop
    fn receive(
        &self,
        data: &[u8],
        parser: &mut FrameParser,
        assembler: &mut MessageAssembler,
    ) -> bool {
        for frame in parser.feed(data) {
            let message = match frame.and_then(|frame| assembler.feed_frame(frame)) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) => {
                    self.fail(err);
                    return false;
                }
            };

            match message {
                Message::Binary(payload) => self.deliver(payload),
                Message::Ping(payload) => {
                    let inner = self.lock();
                    if inner.state == ConnectionState::Open {
                        let _ = inner.send_frame(Frame::pong(payload));
                    }
                }
                Message::Pong(_) => {
                    tracing::trace!(connection = self.id, "pong received");
                }
                Message::Close(frame) => {
                    self.peer_closed(frame);
                    return false;
                }
            }
        }
        true
    }

    fn deliver(&self, payload: Bytes) {
        let inner = self.lock();
        if inner.state.is_closed() {
            return;
        }

        let len = payload.len() as u64;
        self.counters.messages_received.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes_received.fetch_add(len, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("binsocket_client_messages_received_total").increment(1);
            metrics::counter!("binsocket_client_bytes_received_total").increment(len);
            metrics::histogram!("binsocket_client_message_size_bytes").record(len as f64);
        }

        let _ = inner.events.send(Event::Message(payload));
    }

    fn record_sent(&self, len: usize, completes_message: bool) {
        self.counters
            .bytes_sent
            .fetch_add(len as u64, Ordering::Relaxed);
        if completes_message {
            self.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("binsocket_client_bytes_sent_total").increment(len as u64);
            if completes_message {
                metrics::counter!("binsocket_client_messages_sent_total").increment(1);
            }
        }
    }

    fn peer_closed(&self, frame: Option<CloseFrame>) {
        let mut inner = self.lock();
        match inner.state {
            ConnectionState::Open => {
                let code = frame.as_ref().map(|frame| frame.code.code());
                let _ = inner.send_frame(Frame::close(code, None));
                tracing::debug!(connection = self.id, ?code, "peer started close handshake");
            }
            ConnectionState::Closing => {
                tracing::debug!(connection = self.id, "close handshake completed");
            }
            ConnectionState::Connecting | ConnectionState::Closed => {}
        }
        self.finish_locked(&mut inner, Outcome::Closed(frame));
    }

    fn end_of_stream(&self) {
        let mut inner = self.lock();
        let outcome = if inner.state == ConnectionState::Closing {
            Outcome::Closed(None)
        } else {
            Outcome::Failed(Error::Closed {
                code: CloseCode::Abnormal,
                reason: "connection closed without a close frame".to_string(),
            })
        };
        self.finish_locked(&mut inner, outcome);
    }

    /// Fail the connection, sending a best-effort close frame for protocol violations
    fn fail(&self, err: Error) {
        let mut inner = self.lock();
        if inner.state == ConnectionState::Open && err.is_protocol_violation() {
            let _ = inner.send_frame(Frame::close(Some(err.close_code().code()), None));
        }
        if !inner.state.is_closed() {
            tracing::warn!(connection = self.id, error = %err, "connection failed");
        }
        self.finish_locked(&mut inner, Outcome::Failed(err));
    }

    fn finish(&self, outcome: Outcome) -> bool {
        let mut inner = self.lock();
        self.finish_locked(&mut inner, outcome)
    }

    /// Move to `Closed` and report `outcome`; only the first call has any effect
    fn finish_locked(&self, inner: &mut Inner, outcome: Outcome) -> bool {
        if inner.state.is_closed() {
            return false;
        }
        inner.state = ConnectionState::Closed;
        inner.streaming = false;
        let _ = inner.outbound.send(Outbound::Shutdown);
        self.shutdown.notify_one();

        #[cfg(feature = "metrics")]
        metrics::counter!("binsocket_client_connections_closed_total").increment(1);

        let event = match outcome {
            Outcome::Closed(frame) => Event::Close(frame),
            Outcome::Failed(err) => Event::Error(err),
        };
        let _ = inner.events.send(event);
        true
    }
}

async fn read_loop(
    connection: Arc<Connection>,
    mut reader: Box<dyn TransportRead>,
    leftover: BytesMut,
) {
    let limits = FrameLimits::client(connection.config.incoming_frame_limit());
    let mut parser = FrameParser::new(limits);
    let mut assembler = MessageAssembler::new(connection.config.max_message_size);

    if !leftover.is_empty() && !connection.receive(&leftover, &mut parser, &mut assembler) {
        return;
    }

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = tokio::select! {
            _ = connection.shutdown.notified() => break,
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                connection.end_of_stream();
                break;
            }
            Ok(n) => {
                if !connection.receive(&buf[..n], &mut parser, &mut assembler) {
                    break;
                }
            }
            Err(err) => {
                connection.fail(err);
                break;
            }
        }
    }

    tracing::trace!(connection = connection.id, "reader finished");
}

async fn write_loop(
    connection: Arc<Connection>,
    mut writer: Box<dyn TransportWrite>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = outbound.recv().await {
        let bytes = match item {
            Outbound::Frame(bytes) => bytes,
            Outbound::Shutdown => break,
        };
        if let Err(err) = write_frame(writer.as_mut(), &bytes).await {
            connection.fail(err);
            break;
        }
    }

    if let Err(err) = writer.close().await {
        tracing::trace!(connection = connection.id, error = %err, "write shutdown failed");
    }
    tracing::trace!(connection = connection.id, "writer finished");
}

async fn write_frame(writer: &mut dyn TransportWrite, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
