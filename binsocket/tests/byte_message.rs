#![cfg(all(feature = "client", feature = "transport-tcp", feature = "tokio-runtime"))]

mod support;

use binsocket::error::{ProtocolError, UsageError};
use binsocket::prelude::*;
use std::sync::{Arc, Mutex};
use support::{Behavior, EchoServer, MAX_ECHO_MESSAGE_SIZE};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Open,
    Message(Bytes),
    Error(CloseCode),
    Close(Option<CloseCode>),
}

/// Records callbacks and counts the latch down on every message and on the
/// terminal callback
#[derive(Clone)]
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
    latch: CountdownLatch,
    send_on_open: Vec<&'static [u8]>,
}

impl Recorder {
    fn new(count: usize) -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            latch: CountdownLatch::new(count),
            send_on_open: Vec::new(),
        }
    }

    fn sending_on_open(mut self, payload: &'static [u8]) -> Self {
        self.send_on_open.push(payload);
        self
    }

    fn handler(&self) -> UpgradeHandler {
        UpgradeHandler::builder().add_listener(self.clone()).build()
    }

    async fn wait(&self) {
        assert!(
            self.latch.wait_timeout(WAIT).await,
            "timed out waiting for callbacks: {:?}",
            self.seen()
        );
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<Bytes> {
        self.seen()
            .into_iter()
            .filter_map(|seen| match seen {
                Seen::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn terminal(&self) -> Vec<Seen> {
        self.seen()
            .into_iter()
            .filter(|seen| matches!(seen, Seen::Error(_) | Seen::Close(_)))
            .collect()
    }
}

impl Listener for Recorder {
    fn on_open(&mut self, websocket: &WebSocket) {
        self.seen.lock().unwrap().push(Seen::Open);
        for payload in &self.send_on_open {
            websocket.send_message(*payload).unwrap();
        }
    }

    fn on_message(&mut self, message: Bytes) {
        self.seen.lock().unwrap().push(Seen::Message(message));
        self.latch.count_down();
    }

    fn on_error(&mut self, error: &Error) {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Error(error.close_code()));
        self.latch.count_down();
    }

    fn on_close(&mut self, _websocket: &WebSocket, frame: Option<&CloseFrame>) {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Close(frame.map(|frame| frame.code)));
        self.latch.count_down();
    }
}

async fn open(server: &EchoServer, config: ClientConfig, recorder: &Recorder) -> WebSocket {
    Client::new(config)
        .unwrap()
        .prepare_get(server.url("/echo"))
        .execute(recorder.handler())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_single_message_round_trip() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(1);
    let websocket = open(&server, ClientConfig::default(), &recorder).await;

    websocket.send_message(&b"ECHO"[..]).unwrap();
    recorder.wait().await;

    assert_eq!(
        recorder.seen(),
        vec![Seen::Open, Seen::Message(Bytes::from_static(b"ECHO"))]
    );
    assert!(websocket.remote_addr().is_some());
}

#[tokio::test]
async fn test_chained_sends_arrive_in_order() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(2);
    let websocket = open(&server, ClientConfig::default(), &recorder).await;

    websocket
        .send_message(&b"ECHO"[..])
        .unwrap()
        .send_message(&b"ECHO"[..])
        .unwrap();
    recorder.wait().await;

    assert_eq!(recorder.messages().concat(), b"ECHOECHO");
}

#[tokio::test]
async fn test_send_from_on_open() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(2)
        .sending_on_open(b"ECHO")
        .sending_on_open(b"ECHO");
    let _websocket = open(&server, ClientConfig::default(), &recorder).await;

    recorder.wait().await;
    assert_eq!(recorder.seen()[0], Seen::Open);
    assert_eq!(recorder.messages().concat(), b"ECHOECHO");
}

#[tokio::test]
async fn test_streamed_fragments_form_one_message() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(1);
    let websocket = open(&server, ClientConfig::default(), &recorder).await;

    websocket
        .stream(&b"ECHO"[..], false)
        .unwrap()
        .stream(&b"ECHO"[..], true)
        .unwrap();
    recorder.wait().await;

    assert_eq!(
        recorder.messages(),
        vec![Bytes::from_static(b"ECHOECHO")]
    );
}

#[tokio::test]
async fn test_send_during_stream_is_a_usage_error() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(2);
    let websocket = open(&server, ClientConfig::default(), &recorder).await;

    websocket.stream(&b"EC"[..], false).unwrap();
    let err = websocket.send_message(&b"oops"[..]).unwrap_err();
    assert!(matches!(err, Error::Usage(UsageError::FragmentSequenceOpen)));

    websocket.stream(&b"HO"[..], true).unwrap();
    websocket.send_message(&b"ECHO"[..]).unwrap();
    recorder.wait().await;

    assert_eq!(
        recorder.messages(),
        vec![Bytes::from_static(b"ECHO"), Bytes::from_static(b"ECHO")]
    );
}

#[tokio::test]
async fn test_large_message_is_split_and_reassembled() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(1);
    let config = ClientConfig::default().max_frame_size(16);
    let websocket = open(&server, config, &recorder).await;

    let payload: Vec<u8> = (0..100u8).collect();
    websocket.send_message(payload.clone()).unwrap();
    recorder.wait().await;

    assert_eq!(recorder.messages(), vec![Bytes::from(payload)]);
}

#[tokio::test]
async fn test_echo_larger_than_send_split_is_delivered() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(1);
    // the endpoint answers with one frame far above our outgoing frame size
    let config = ClientConfig::default().max_frame_size(8);
    let websocket = open(&server, config, &recorder).await;

    let payload = vec![7u8; MAX_ECHO_MESSAGE_SIZE];
    websocket.send_message(payload.clone()).unwrap();
    recorder.wait().await;

    assert_eq!(recorder.messages(), vec![Bytes::from(payload)]);
    assert!(recorder.terminal().is_empty());
}

#[tokio::test]
async fn test_message_over_endpoint_limit_is_closed_with_too_big() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(1);
    let websocket = open(&server, ClientConfig::default(), &recorder).await;

    websocket
        .send_message(vec![7u8; MAX_ECHO_MESSAGE_SIZE + 1])
        .unwrap();
    recorder.wait().await;

    assert!(recorder.messages().is_empty());
    assert_eq!(recorder.terminal(), vec![Seen::Close(Some(CloseCode::TooBig))]);
}

#[tokio::test]
async fn test_close_is_idempotent_with_one_terminal_callback() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(1);
    let websocket = open(&server, ClientConfig::default(), &recorder).await;

    websocket.close().unwrap();
    websocket.close().unwrap();
    recorder.wait().await;
    websocket.close().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(recorder.terminal(), vec![Seen::Close(Some(CloseCode::Normal))]);
    assert_eq!(websocket.state(), ConnectionState::Closed);
    assert!(matches!(
        websocket.send_message(&b"late"[..]),
        Err(Error::Usage(UsageError::NotOpen(ConnectionState::Closed)))
    ));
}

#[tokio::test]
async fn test_rejected_upgrade_fails_execute() {
    let server = EchoServer::start(Behavior::Reject).await;
    let recorder = Recorder::new(1);

    let err = Client::new(ClientConfig::default())
        .unwrap()
        .prepare_get(server.url("/echo"))
        .execute(recorder.handler())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Protocol(ProtocolError::UnexpectedStatus(403))));
    assert!(recorder.seen().is_empty());
}

#[tokio::test]
async fn test_secure_scheme_is_unsupported() {
    let recorder = Recorder::new(1);
    let err = Client::new(ClientConfig::default())
        .unwrap()
        .prepare_get("wss://127.0.0.1:1/echo")
        .execute(recorder.handler())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Protocol(ProtocolError::UnsupportedScheme(_))));
}

#[tokio::test]
async fn test_masked_server_frame_fails_connection() {
    let server = EchoServer::start(Behavior::MaskedFrame).await;
    let recorder = Recorder::new(1);
    let websocket = open(&server, ClientConfig::default(), &recorder).await;

    recorder.wait().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(recorder.terminal(), vec![Seen::Error(CloseCode::ProtocolError)]);
    assert!(recorder.messages().is_empty());
    assert_eq!(websocket.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_hangup_without_close_is_abnormal() {
    let server = EchoServer::start(Behavior::Hangup).await;
    let recorder = Recorder::new(1);
    let _websocket = open(&server, ClientConfig::default(), &recorder).await;

    recorder.wait().await;
    assert_eq!(recorder.terminal(), vec![Seen::Error(CloseCode::Abnormal)]);
}

struct Exploding;

impl Listener for Exploding {
    fn on_message(&mut self, _message: Bytes) {
        panic!("listener failure");
    }
}

#[tokio::test]
async fn test_panicking_listener_does_not_stop_others() {
    let server = EchoServer::start(Behavior::Echo).await;
    let recorder = Recorder::new(2);
    let handler = UpgradeHandler::builder()
        .add_listener(Exploding)
        .add_listener(recorder.clone())
        .build();

    let websocket = Client::new(ClientConfig::default())
        .unwrap()
        .prepare_get(server.url("/echo"))
        .execute(handler)
        .await
        .unwrap();

    websocket.send_message(&b"one"[..]).unwrap();
    websocket.send_message(&b"two"[..]).unwrap();
    recorder.wait().await;

    assert_eq!(
        recorder.messages(),
        vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]
    );
    assert!(websocket.is_open());
}
