//! Client configuration for BinSocket
//!
//! This module provides configuration options for WebSocket clients.

use binsocket_core::error::ConfigError;
use binsocket_core::protocol::constants::*;
use binsocket_core::{Error, Result};
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum payload of one outgoing frame; larger sends are fragmented
    pub max_frame_size: usize,
    /// Maximum payload of one incoming frame; `None` means `max_message_size`
    pub max_incoming_frame_size: Option<usize>,
    /// Maximum size of a reassembled incoming message
    pub max_message_size: usize,
    /// Upper bound for TCP connect plus the upgrade exchange
    pub handshake_timeout: Duration,
    /// How long `close()` waits for the peer's close frame
    pub close_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Origin header
    pub origin: Option<String>,
    /// WebSocket subprotocols
    pub protocols: Vec<String>,
    /// Custom headers sent with every upgrade request
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_incoming_frame_size: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            user_agent: format!("binsocket-client/{}", env!("CARGO_PKG_VERSION")),
            origin: None,
            protocols: Vec::new(),
            headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "max_frame_size must be greater than 0".to_string(),
            )));
        }

        if self.max_message_size == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "max_message_size must be greater than 0".to_string(),
            )));
        }

        if self.max_incoming_frame_size == Some(0) {
            return Err(Error::Config(ConfigError::Validation(
                "max_incoming_frame_size must be greater than 0".to_string(),
            )));
        }

        if self.max_message_size < self.max_frame_size {
            return Err(Error::Config(ConfigError::Validation(
                "max_message_size must be greater than or equal to max_frame_size".to_string(),
            )));
        }

        if self.handshake_timeout.is_zero() {
            return Err(Error::Config(ConfigError::Validation(
                "handshake_timeout must be greater than 0".to_string(),
            )));
        }

        if self.close_timeout.is_zero() {
            return Err(Error::Config(ConfigError::Validation(
                "close_timeout must be greater than 0".to_string(),
            )));
        }

        for (name, value) in &self.headers {
            validate_header(name, value)?;
        }

        Ok(())
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Limit the payload of a single incoming frame
    pub fn max_incoming_frame_size(mut self, size: usize) -> Self {
        self.max_incoming_frame_size = Some(size);
        self
    }

    /// Largest incoming frame payload the reader accepts
    pub fn incoming_frame_limit(&self) -> usize {
        self.max_incoming_frame_size.unwrap_or(self.max_message_size)
    }

    /// Set maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set close timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Add a subprotocol
    pub fn add_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Add a custom header
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Check that a custom header can be written into an HTTP request head
pub(crate) fn validate_header(name: &str, value: &str) -> Result<()> {
    if http::HeaderName::from_bytes(name.as_bytes()).is_err()
        || http::HeaderValue::from_str(value).is_err()
    {
        return Err(Error::Config(ConfigError::InvalidValue {
            field: format!("headers[{}]", name),
            value: value.to_string(),
        }));
    }
    Ok(())
}
