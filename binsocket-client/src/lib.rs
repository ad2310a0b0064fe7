//! BinSocket Client
//!
//! Listener-driven WebSocket client for binary messages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binsocket_client::prelude::*;
//!
//! struct Print;
//!
//! impl Listener for Print {
//!     fn on_message(&mut self, message: Bytes) {
//!         println!("received {} bytes", message.len());
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig::default())?;
//!     let websocket = client
//!         .prepare_get("ws://127.0.0.1:9001/echo")
//!         .header("Authorization", "Bearer token")
//!         .execute(UpgradeHandler::builder().add_listener(Print).build())
//!         .await?;
//!
//!     websocket.send_message(&b"ECHO"[..])?;
//!     websocket.close()?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsocket-client/")]

// Public modules
pub mod client;
pub mod config;
pub mod connection;
pub mod latch;
pub mod listener;
pub mod logging;
pub mod upgrade;
pub mod websocket;

// Prelude module
pub mod prelude;

// Re-export key types for convenience
pub use client::{Client, RequestBuilder};
pub use config::ClientConfig;
pub use connection::ConnectionMetadata;
pub use latch::CountdownLatch;
pub use listener::Listener;
pub use upgrade::{UpgradeHandler, UpgradeHandlerBuilder};
pub use websocket::WebSocket;
