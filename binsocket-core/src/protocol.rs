//! WebSocket protocol constants and utilities
//!
//! This module contains the protocol definitions from RFC 6455 that the
//! binary pipeline relies on: opcodes, endpoint roles, frame header bits
//! and handshake header names.

/// WebSocket opcodes understood by BinSocket (RFC 6455 Section 5.2)
///
/// Text frames and the reserved opcode ranges are deliberately absent:
/// they decode as [`FrameError::InvalidOpcode`](crate::error::FrameError::InvalidOpcode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Continuation frame
    Continuation = 0x0,
    /// Binary frame
    Binary = 0x2,
    /// Close frame
    Close = 0x8,
    /// Ping frame
    Ping = 0x9,
    /// Pong frame
    Pong = 0xA,
}

impl Opcode {
    /// Create an Opcode from the low nibble of the first header byte
    pub fn from(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Get the numeric value of the opcode
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Check if this is a control opcode
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Check if this is a data opcode
    pub fn is_data(&self) -> bool {
        matches!(self, Opcode::Binary | Opcode::Continuation)
    }
}

/// Which end of the connection a codec is working for.
///
/// Masking is directional: clients mask every frame they send and servers
/// never do, so each side also rejects frames whose mask bit is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The connecting side
    Client,
    /// The accepting side
    Server,
}

impl Role {
    /// Whether frames written by this role carry a masking key
    pub fn masks_outgoing(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether frames read by this role must carry a masking key
    pub fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }
}

/// Lifecycle of a single WebSocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgrade handshake in progress
    Connecting,
    /// Handshake done, sends are accepted
    Open,
    /// A close frame has been sent, waiting for the peer
    Closing,
    /// Terminal; no further sends or callbacks
    Closed,
}

impl ConnectionState {
    /// Whether the connection has reached its terminal state
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

/// WebSocket protocol constants
pub mod constants {
    use std::time::Duration;

    /// WebSocket protocol version
    pub const WEBSOCKET_VERSION: &str = "13";

    /// WebSocket magic string for accept calculation
    pub const WEBSOCKET_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// Maximum frame size (default)
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024; // 1MB

    /// Maximum message size (default)
    pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB

    /// Default handshake timeout
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default time to wait for the peer's close frame after sending ours
    pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

    /// WebSocket key length in bytes
    pub const WEBSOCKET_KEY_LEN: usize = 16;

    /// Maximum handshake header size
    pub const MAX_HEADER_SIZE: usize = 8192; // 8KB

    /// Maximum number of headers parsed from a handshake
    pub const MAX_HEADERS: usize = 64;

    /// Maximum payload of a control frame
    pub const MAX_CONTROL_PAYLOAD: usize = 125;

    /// Maximum close reason size
    pub const MAX_CLOSE_REASON_SIZE: usize = 123;
}

/// Frame header bit positions and masks
pub mod frame {
    /// FIN bit position
    pub const FIN_BIT: u8 = 0x80;

    /// RSV1 bit position
    pub const RSV1_BIT: u8 = 0x40;

    /// RSV2 bit position
    pub const RSV2_BIT: u8 = 0x20;

    /// RSV3 bit position
    pub const RSV3_BIT: u8 = 0x10;

    /// Opcode mask
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit position
    pub const MASK_BIT: u8 = 0x80;

    /// Payload length mask for 7-bit length
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Extended payload length (16-bit) marker
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Extended payload length (64-bit) marker
    pub const PAYLOAD_LEN_64: u8 = 127;

    /// Masking key length
    pub const MASKING_KEY_LEN: usize = 4;
}

/// HTTP status codes used in the WebSocket handshake
pub mod http_status {
    /// HTTP Switching Protocols status
    pub const SWITCHING_PROTOCOLS: u16 = 101;

    /// HTTP Bad Request status
    pub const BAD_REQUEST: u16 = 400;
}

/// HTTP methods
pub mod http_method {
    /// HTTP GET method
    pub const GET: &str = "GET";
}

/// HTTP header names (lowercase for consistency)
pub mod http_header {
    /// Host header
    pub const HOST: &str = "host";

    /// User-Agent header
    pub const USER_AGENT: &str = "user-agent";

    /// Connection header
    pub const CONNECTION: &str = "connection";

    /// Upgrade header
    pub const UPGRADE: &str = "upgrade";

    /// Origin header
    pub const ORIGIN: &str = "origin";

    /// Sec-WebSocket-Key header
    pub const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";

    /// Sec-WebSocket-Version header
    pub const SEC_WEBSOCKET_VERSION: &str = "sec-websocket-version";

    /// Sec-WebSocket-Protocol header
    pub const SEC_WEBSOCKET_PROTOCOL: &str = "sec-websocket-protocol";

    /// Sec-WebSocket-Accept header
    pub const SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";
}

/// HTTP header values
pub mod http_value {
    /// WebSocket upgrade value
    pub const WEBSOCKET: &str = "websocket";

    /// Upgrade connection value
    pub const UPGRADE: &str = "Upgrade";
}

/// Utility functions for WebSocket protocol operations
pub mod utils {
    use crate::error::CloseCode;

    /// Check if a close code may appear on the wire
    pub fn is_valid_close_code(code: u16) -> bool {
        match code {
            1000..=1003 | 1007..=1014 => true,
            3000..=4999 => true,
            _ => false,
        }
    }

    /// Check if a close code is one an endpoint may send itself
    pub fn is_sendable(code: CloseCode) -> bool {
        !code.is_reserved() && is_valid_close_code(code.code())
    }
}
