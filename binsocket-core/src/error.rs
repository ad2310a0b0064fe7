//! Error types for BinSocket
//!
//! This module defines all error types used throughout the BinSocket crates.
//! Errors are grouped by the layer that raises them so callers can tell a
//! framing violation from a transport failure or a misuse of the API.

#![allow(missing_docs)]

use crate::protocol::ConnectionState;
use std::fmt;
use thiserror::Error;

/// Result type alias for BinSocket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for BinSocket operations
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Frame errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Message errors
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(#[from] TimeoutError),

    /// API misuse
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection closed
    #[error("Connection closed: {code} - {reason}")]
    Closed {
        /// Close code
        code: CloseCode,
        /// Close reason
        reason: String,
    },
}

impl Error {
    /// Whether this error came from the peer violating the wire protocol
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::Frame(_) | Error::Message(_)
        )
    }

    /// The close code an endpoint should send when failing because of this error
    pub fn close_code(&self) -> CloseCode {
        match self {
            Error::Message(MessageError::TooLarge { .. }) => CloseCode::TooBig,
            Error::Frame(FrameError::TooLarge { .. }) => CloseCode::TooBig,
            Error::Protocol(_) | Error::Frame(_) => CloseCode::ProtocolError,
            Error::Closed { code, .. } => *code,
            _ => CloseCode::Abnormal,
        }
    }
}

/// WebSocket protocol specific errors
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// Missing required headers
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Invalid header value
    #[error("Invalid header value for {header}: {value}")]
    InvalidHeaderValue { header: String, value: String },

    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Invalid format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// URL scheme other than ws
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Unexpected HTTP status
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// Invalid accept key
    #[error("Invalid WebSocket accept key - expected: {expected}, received: {received}")]
    InvalidAcceptKey { expected: String, received: String },

    /// A new data message started while a fragmented one was still open
    #[error("Binary frame received while a fragmented message is in progress")]
    MessageInProgress,

    /// A continuation frame arrived with no fragmented message open
    #[error("Continuation frame received with no message in progress")]
    UnexpectedContinuation,

    /// Invalid close code
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Close payload with a code but malformed contents
    #[error("Invalid close payload: {0}")]
    InvalidClosePayload(String),
}

/// Frame parsing and processing errors
#[derive(Error, Debug, Clone)]
pub enum FrameError {
    /// Insufficient data to parse frame
    #[error("Insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// Frame too large
    #[error("Frame too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// Control frame payload above 125 bytes
    #[error("Control frame payload too large: {0} bytes")]
    ControlFrameTooLarge(usize),

    /// 64-bit payload length with the most significant bit set
    #[error("Invalid payload length")]
    InvalidLength,

    /// Invalid masking
    #[error("Invalid masking: {0}")]
    InvalidMasking(String),

    /// Invalid opcode
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    /// Reserved bits set
    #[error("Reserved bits set in frame")]
    ReservedBitsSet,

    /// Control frames cannot be fragmented
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Message errors
#[derive(Error, Debug, Clone)]
pub enum MessageError {
    /// Message too large
    #[error("Message too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// Timeout errors
#[derive(Error, Debug, Clone)]
pub enum TimeoutError {
    /// Handshake timeout
    #[error("Handshake timeout: {timeout:?}")]
    Handshake { timeout: std::time::Duration },
}

/// Errors caused by calling the API out of sequence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// The connection is not accepting sends
    #[error("Connection is not open (state: {0:?})")]
    NotOpen(ConnectionState),

    /// A whole message was sent while a streamed message was unterminated
    #[error("A fragmented message is still open; finish it with a final fragment first")]
    FragmentSequenceOpen,
}

/// WebSocket close codes as defined in RFC 6455
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Normal closure
    Normal,

    /// Going away
    Away,

    /// Protocol error
    ProtocolError,

    /// Unsupported data
    Unsupported,

    /// No status received
    NoStatus,

    /// Abnormal closure
    Abnormal,

    /// Invalid frame payload data
    InvalidPayload,

    /// Policy violation
    PolicyViolation,

    /// Message too big
    TooBig,

    /// Mandatory extension
    MandatoryExtension,

    /// Internal server error
    Internal,

    /// Service restart
    ServiceRestart,

    /// Try again later
    TryAgainLater,

    /// Bad gateway
    BadGateway,

    /// TLS handshake failure
    TlsHandshake,

    /// Application-specific close code
    Application(u16),
}

impl CloseCode {
    /// Create a CloseCode from a u16
    pub fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::Internal,
            1012 => CloseCode::ServiceRestart,
            1013 => CloseCode::TryAgainLater,
            1014 => CloseCode::BadGateway,
            1015 => CloseCode::TlsHandshake,
            code if (3000..=4999).contains(&code) => CloseCode::Application(code),
            _ => CloseCode::ProtocolError,
        }
    }

    /// Get the numeric value of the close code
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::Internal => 1011,
            CloseCode::ServiceRestart => 1012,
            CloseCode::TryAgainLater => 1013,
            CloseCode::BadGateway => 1014,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Application(code) => *code,
        }
    }

    /// Check if this is a reserved close code (never sent on the wire)
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            CloseCode::NoStatus | CloseCode::Abnormal | CloseCode::TlsHandshake
        )
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}
