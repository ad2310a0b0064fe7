//! Echo Client Example
//!
//! Connects to a WebSocket echo endpoint, sends a whole message and a
//! streamed message, waits for both echoes and closes.
//!
//! ```text
//! cargo run --example echo_client -- ws://127.0.0.1:9001/echo
//! ```

use binsocket::prelude::*;

struct Printer {
    echoes: CountdownLatch,
    closed: CountdownLatch,
}

impl Listener for Printer {
    fn on_open(&mut self, websocket: &WebSocket) {
        println!("connected ({:?})", websocket.remote_addr());
    }

    fn on_message(&mut self, message: Bytes) {
        println!("received {} bytes: {:?}", message.len(), message);
        self.echoes.count_down();
    }

    fn on_error(&mut self, error: &Error) {
        eprintln!("connection failed: {}", error);
        self.closed.count_down();
    }

    fn on_close(&mut self, _websocket: &WebSocket, frame: Option<&CloseFrame>) {
        match frame {
            Some(frame) => println!("closed with {}", frame.code),
            None => println!("closed without status"),
        }
        self.closed.count_down();
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001/echo".to_string());

    let echoes = CountdownLatch::new(2);
    let closed = CountdownLatch::new(1);
    let handler = UpgradeHandler::builder()
        .add_listener(Printer {
            echoes: echoes.clone(),
            closed: closed.clone(),
        })
        .build();

    let client = Client::new(ClientConfig::default())?;
    let websocket = client.prepare_get(url).execute(handler).await?;

    websocket.send_message(&b"Binary payload"[..])?;
    websocket
        .stream(&b"Streamed "[..], false)?
        .stream(&b"payload"[..], true)?;

    if !echoes.wait_timeout(Duration::from_secs(5)).await {
        eprintln!("echoes did not arrive in time");
    }

    websocket.close()?;
    closed.wait().await;
    Ok(())
}
