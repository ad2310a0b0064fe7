//! # BinSocket
//!
//! Asynchronous WebSocket client with a listener-driven binary message
//! pipeline.
//!
//! An upgrade request is executed with an [`UpgradeHandler`](client::UpgradeHandler)
//! carrying one or more listeners. Complete binary messages arrive through
//! `on_message`; the returned [`WebSocket`](client::WebSocket) handle sends
//! whole messages or streams fragments and can be used from any thread.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binsocket::prelude::*;
//!
//! struct Echoed(CountdownLatch);
//!
//! impl Listener for Echoed {
//!     fn on_open(&mut self, websocket: &WebSocket) {
//!         let _ = websocket.send_message(&b"ECHO"[..]);
//!     }
//!
//!     fn on_message(&mut self, message: Bytes) {
//!         assert_eq!(&message[..], b"ECHO");
//!         self.0.count_down();
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let latch = CountdownLatch::new(1);
//!     let client = Client::new(ClientConfig::default())?;
//!     let websocket = client
//!         .prepare_get("ws://127.0.0.1:9001/echo")
//!         .execute(
//!             UpgradeHandler::builder()
//!                 .add_listener(Echoed(latch.clone()))
//!                 .build(),
//!         )
//!         .await?;
//!
//!     latch.wait().await;
//!     websocket.close()?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsocket/")]

// Re-export core components
pub use binsocket_core::*;

#[cfg(feature = "transport-tcp")]
pub use binsocket_transport_tcp as transport_tcp;

#[cfg(feature = "client")]
pub use binsocket_client as client;

/// Prelude module with common imports
pub mod prelude {
    pub use binsocket_core::prelude::*;

    #[cfg(feature = "client")]
    pub use binsocket_client::prelude::*;

    #[cfg(feature = "transport-tcp")]
    pub use binsocket_transport_tcp::prelude::*;
}
