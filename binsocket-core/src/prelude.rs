//! Prelude module for BinSocket Core
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::error::{CloseCode, Error, Result, UsageError};
pub use crate::frame::{Frame, FrameLimits, FrameParser};
pub use crate::message::{CloseFrame, Message, MessageAssembler};
pub use crate::protocol::{ConnectionState, Opcode, Role};
pub use crate::transport::{Connector, Transport, TransportRead, TransportStream, TransportWrite};

// Re-export commonly used external dependencies
pub use bytes::{Bytes, BytesMut};

#[cfg(feature = "tokio-runtime")]
pub use crate::transport::io::IoStream;
