//! TCP Transport for BinSocket
//!
//! This crate provides the TCP-based transport for WebSocket connections.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsocket-transport-tcp/")]

pub mod tcp;

// Re-export TCP transport types
pub use tcp::{TcpConnector, TcpStream, TcpTransport};

/// Prelude module
pub mod prelude {
    pub use crate::tcp::{TcpConnector, TcpStream, TcpTransport};
    pub use binsocket_core::transport::{Connector, Transport, TransportStream};
}
