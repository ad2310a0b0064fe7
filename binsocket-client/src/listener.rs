//! Listener callbacks and their dispatcher
//!
//! Every connection owns one dispatcher task. The reader, the writer and the
//! close timer only push [`Event`]s into its queue, so listeners observe a
//! single ordered sequence: `on_open`, any number of `on_message`, then
//! exactly one of `on_close` or `on_error`.

use crate::websocket::WebSocket;
use binsocket_core::{CloseFrame, Error};
use bytes::Bytes;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::{mpsc, oneshot};

/// Receives the lifecycle of one WebSocket connection.
///
/// Callbacks run one at a time on the connection's dispatch task and must
/// not block for long: while a callback runs, later events for the same
/// connection wait. Sending from inside a callback is allowed.
pub trait Listener: Send + 'static {
    /// The upgrade completed; `websocket` accepts sends from here on
    fn on_open(&mut self, websocket: &WebSocket) {
        let _ = websocket;
    }

    /// A complete binary message arrived
    fn on_message(&mut self, message: Bytes);

    /// The connection failed; no further callbacks follow
    fn on_error(&mut self, error: &Error) {
        let _ = error;
    }

    /// The connection closed; no further callbacks follow.
    ///
    /// `frame` is the peer's close status, or `None` when the peer sent no
    /// status or the close handshake timed out.
    fn on_close(&mut self, websocket: &WebSocket, frame: Option<&CloseFrame>) {
        let _ = (websocket, frame);
    }
}

/// What the connection tasks report to the dispatcher
#[derive(Debug)]
pub(crate) enum Event {
    /// Run `on_open`; the sender fires once every listener has returned
    Open(oneshot::Sender<()>),
    Message(Bytes),
    Error(Error),
    Close(Option<CloseFrame>),
}

/// Drives listener callbacks for one connection
pub(crate) struct Dispatcher {
    listeners: Vec<Box<dyn Listener>>,
    websocket: WebSocket,
    events: mpsc::UnboundedReceiver<Event>,
    opened: bool,
    terminated: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        listeners: Vec<Box<dyn Listener>>,
        websocket: WebSocket,
        events: mpsc::UnboundedReceiver<Event>,
    ) -> Self {
        Self {
            listeners,
            websocket,
            events,
            opened: false,
            terminated: false,
        }
    }

    /// Consume events until the terminal one has been delivered
    pub(crate) async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.dispatch(event);
            if self.terminated {
                break;
            }
        }
        tracing::trace!(connection = self.websocket.id(), "dispatcher finished");
    }

    fn dispatch(&mut self, event: Event) {
        if self.terminated {
            tracing::trace!(?event, "dropping event after terminal callback");
            return;
        }

        match event {
            Event::Open(done) => {
                if !self.opened {
                    self.opened = true;
                    self.each("on_open", |listener, websocket| listener.on_open(websocket));
                }
                let _ = done.send(());
            }
            Event::Message(message) => {
                self.each("on_message", |listener, _| listener.on_message(message.clone()));
            }
            Event::Error(error) => {
                self.terminated = true;
                self.each("on_error", |listener, _| listener.on_error(&error));
            }
            Event::Close(frame) => {
                self.terminated = true;
                self.each("on_close", |listener, websocket| {
                    listener.on_close(websocket, frame.as_ref())
                });
            }
        }
    }

    /// Invoke `callback` on every listener in registration order.
    ///
    /// A panicking listener is logged and skipped; it does not stop the
    /// remaining listeners or the connection.
    fn each<F>(&mut self, callback: &'static str, mut f: F)
    where
        F: FnMut(&mut dyn Listener, &WebSocket),
    {
        let websocket = &self.websocket;
        for (index, listener) in self.listeners.iter_mut().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| f(listener.as_mut(), websocket)));
            if let Err(panic) = outcome {
                tracing::error!(
                    connection = websocket.id(),
                    listener = index,
                    callback,
                    panic = panic_message(panic.as_ref()),
                    "listener panicked"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binsocket_core::error::CloseCode;
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Open,
        Message(Bytes),
        Error(String),
        Close(Option<CloseFrame>),
    }

    struct Recorder(Arc<Mutex<Vec<Seen>>>);

    impl Listener for Recorder {
        fn on_open(&mut self, _websocket: &WebSocket) {
            self.0.lock().unwrap().push(Seen::Open);
        }

        fn on_message(&mut self, message: Bytes) {
            self.0.lock().unwrap().push(Seen::Message(message));
        }

        fn on_error(&mut self, error: &Error) {
            self.0.lock().unwrap().push(Seen::Error(error.to_string()));
        }

        fn on_close(&mut self, _websocket: &WebSocket, frame: Option<&CloseFrame>) {
            self.0.lock().unwrap().push(Seen::Close(frame.cloned()));
        }
    }

    struct Panicker;

    impl Listener for Panicker {
        fn on_message(&mut self, _message: Bytes) {
            panic!("listener exploded");
        }
    }

    fn dispatcher(
        listeners: Vec<Box<dyn Listener>>,
    ) -> (Dispatcher, mpsc::UnboundedSender<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Dispatcher::new(listeners, WebSocket::detached(), rx), tx)
    }

    #[tokio::test]
    async fn test_events_are_delivered_in_order_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (dispatcher, tx) = dispatcher(vec![Box::new(Recorder(seen.clone()))]);

        let (done_tx, done_rx) = oneshot::channel();
        tx.send(Event::Open(done_tx)).unwrap();
        tx.send(Event::Message(Bytes::from_static(b"one"))).unwrap();
        tx.send(Event::Close(Some(CloseFrame::new(CloseCode::Normal, "bye"))))
            .unwrap();
        tx.send(Event::Error(Error::Connection("late".into()))).unwrap();
        tx.send(Event::Message(Bytes::from_static(b"late"))).unwrap();

        dispatcher.run().await;
        done_rx.await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Seen::Open,
                Seen::Message(Bytes::from_static(b"one")),
                Seen::Close(Some(CloseFrame::new(CloseCode::Normal, "bye"))),
            ]
        );
    }

    #[tokio::test]
    async fn test_every_listener_sees_every_event() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let (dispatcher, tx) = dispatcher(vec![
            Box::new(Recorder(first.clone())),
            Box::new(Recorder(second.clone())),
        ]);

        tx.send(Event::Message(Bytes::from_static(b"ECHO"))).unwrap();
        tx.send(Event::Error(Error::Connection("reset".into()))).unwrap();
        dispatcher.run().await;

        assert_eq!(*first.lock().unwrap(), *second.lock().unwrap());
        assert_eq!(first.lock().unwrap().len(), 2);
        assert!(matches!(first.lock().unwrap()[1], Seen::Error(_)));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_panicking_listener_is_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (dispatcher, tx) = dispatcher(vec![
            Box::new(Panicker),
            Box::new(Recorder(seen.clone())),
        ]);

        tx.send(Event::Message(Bytes::from_static(b"a"))).unwrap();
        tx.send(Event::Message(Bytes::from_static(b"b"))).unwrap();
        tx.send(Event::Close(None)).unwrap();
        dispatcher.run().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Seen::Message(Bytes::from_static(b"a")),
                Seen::Message(Bytes::from_static(b"b")),
                Seen::Close(None),
            ]
        );
        assert!(logs_contain("listener panicked"));
        assert!(logs_contain("listener exploded"));
    }
}
