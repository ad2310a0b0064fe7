//! Handle to an open WebSocket connection
//!
//! [`WebSocket`] is cheap to clone and safe to use from any thread. It does
//! not keep the connection alive: once the connection has terminated every
//! operation reports [`ConnectionState::Closed`].

use crate::connection::{Connection, ConnectionMetadata};
use binsocket_core::error::{CloseCode, UsageError};
use binsocket_core::{ConnectionState, Result};
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

/// Sending side of a WebSocket connection
#[derive(Clone)]
pub struct WebSocket {
    id: u64,
    connection: Weak<Connection>,
}

impl WebSocket {
    pub(crate) fn new(id: u64, connection: Weak<Connection>) -> Self {
        Self { id, connection }
    }

    /// A handle that was never attached to a connection
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(0, Weak::new())
    }

    /// Connection ID, unique within the process
    pub fn id(&self) -> u64 {
        self.id
    }

    fn connection(&self) -> Result<Arc<Connection>> {
        self.connection
            .upgrade()
            .ok_or_else(|| UsageError::NotOpen(ConnectionState::Closed).into())
    }

    /// Send a whole binary message.
    ///
    /// Payloads larger than the configured frame size go out as a sequence
    /// of fragments. Fails with [`UsageError::FragmentSequenceOpen`] while a
    /// streamed message is unfinished.
    ///
    /// ```rust,no_run
    /// # fn demo(websocket: &binsocket_client::WebSocket) -> binsocket_core::Result<()> {
    /// websocket.send_message(&b"ECHO"[..])?.send_message(&b"ECHO"[..])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn send_message(&self, payload: impl Into<Bytes>) -> Result<&Self> {
        self.connection()?.send_message(payload.into())?;
        Ok(self)
    }

    /// Send one fragment of a streamed binary message.
    ///
    /// The first call starts the message; the call with `is_last == true`
    /// completes it, and the peer sees all fragments as one message.
    pub fn stream(&self, payload: impl Into<Bytes>, is_last: bool) -> Result<&Self> {
        self.connection()?.stream(payload.into(), is_last)?;
        Ok(self)
    }

    /// Start a normal close handshake. Calling it again has no effect.
    pub fn close(&self) -> Result<()> {
        self.close_with(CloseCode::Normal, "")
    }

    /// Start a close handshake with a specific code and reason
    pub fn close_with(&self, code: CloseCode, reason: &str) -> Result<()> {
        match self.connection.upgrade() {
            Some(connection) => connection.close(code, reason),
            None => Ok(()),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection
            .upgrade()
            .map_or(ConnectionState::Closed, |connection| connection.state())
    }

    /// Whether sends are currently accepted
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Server address
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.connection
            .upgrade()
            .and_then(|connection| connection.remote_addr())
    }

    /// Counters for this connection, while it is still alive
    pub fn metadata(&self) -> Option<ConnectionMetadata> {
        self.connection
            .upgrade()
            .map(|connection| connection.metadata())
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
