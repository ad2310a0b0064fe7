//! Prelude module for BinSocket Client
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the client library.

pub use crate::client::{Client, RequestBuilder};
pub use crate::config::ClientConfig;
pub use crate::connection::ConnectionMetadata;
pub use crate::latch::CountdownLatch;
pub use crate::listener::Listener;
pub use crate::upgrade::{UpgradeHandler, UpgradeHandlerBuilder};
pub use crate::websocket::WebSocket;

// Re-export core types for convenience
pub use binsocket_core::prelude::*;

// Re-export commonly used external dependencies
pub use std::time::Duration;
