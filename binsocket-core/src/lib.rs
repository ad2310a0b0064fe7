//! # BinSocket Core
//!
//! Core WebSocket protocol implementation providing the foundation for the
//! BinSocket client. It includes:
//!
//! - Error handling and types
//! - WebSocket frame parsing and generation
//! - Reassembly of fragmented binary messages
//! - The HTTP upgrade handshake
//! - Transport layer abstractions

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsocket-core/")]

// Core modules
pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod protocol;
pub mod transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use error::{CloseCode, Error, Result};
pub use frame::{Frame, FrameLimits, FrameParser};
pub use handshake::{HandshakeConfig, HandshakeRequest, HandshakeResponse};
pub use message::{CloseFrame, Message, MessageAssembler};
pub use protocol::{ConnectionState, Opcode, Role};
pub use transport::{Connector, Transport, TransportStream};
