//! Embedded TCP endpoint the integration tests connect to

use binsocket::handshake::{answer_client_handshake, parse_client_handshake, response_to_string};
use binsocket::prelude::*;
use binsocket::{HandshakeConfig, HandshakeResponse, Message, MessageAssembler};
use binsocket::transport_tcp::{TcpStream, TcpTransport};
use std::net::SocketAddr;
use tokio::task::JoinHandle;

/// Largest message the endpoint reassembles before closing with 1009
pub const MAX_ECHO_MESSAGE_SIZE: usize = 1000;

/// How the endpoint treats each accepted connection
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Reassemble each message, echo it back as one frame and answer close frames
    Echo,
    /// Refuse the upgrade with `403 Forbidden`
    Reject,
    /// Upgrade, then send a masked frame
    MaskedFrame,
    /// Upgrade, then drop the TCP connection without a close frame
    Hangup,
}

pub struct EchoServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl EchoServer {
    pub async fn start(behavior: Behavior) -> Self {
        let transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = transport.local_addr().unwrap();

        let task = tokio::spawn(async move {
            while let Ok(stream) = transport.accept().await {
                tokio::spawn(serve(stream, behavior));
            }
        });

        Self { addr, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, behavior: Behavior) {
    let mut buffer = BytesMut::new();
    let mut chunk = [0u8; 4096];

    let (request, consumed) = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
        if let Some(parsed) = parse_client_handshake(&buffer).unwrap() {
            break parsed;
        }
    };
    let leftover = buffer.split_off(consumed);

    let response = match behavior {
        Behavior::Reject => HandshakeResponse::rejection(403, "Forbidden"),
        _ => match answer_client_handshake(&request, &HandshakeConfig::default()) {
            Ok(response) => response,
            Err((rejection, _)) => rejection,
        },
    };
    let upgraded = response.status == 101;
    stream
        .write_all(response_to_string(&response).as_bytes())
        .await
        .unwrap();
    stream.flush().await.unwrap();
    if !upgraded {
        return;
    }

    match behavior {
        Behavior::Hangup | Behavior::Reject => return,
        Behavior::MaskedFrame => {
            let frame = Frame::binary(&b"masked"[..]).mask(true);
            stream.write_all(&frame.to_bytes()).await.unwrap();
        }
        Behavior::Echo => {}
    }

    let mut parser = FrameParser::new(FrameLimits::server(16 * 1024 * 1024));
    let mut assembler = MessageAssembler::new(MAX_ECHO_MESSAGE_SIZE);
    let mut frames = parser.feed(&leftover);
    loop {
        for frame in frames.drain(..) {
            let Ok(frame) = frame else { return };
            let reply = match assembler.feed_frame(frame) {
                Ok(None) | Ok(Some(Message::Pong(_))) => continue,
                Ok(Some(Message::Binary(payload))) => Frame::binary(payload),
                Ok(Some(Message::Ping(payload))) => Frame::pong(payload),
                Ok(Some(Message::Close(close))) => {
                    let code = close.map(|close| close.code.code());
                    let _ = stream.write_all(&Frame::close(code, None).to_bytes()).await;
                    let _ = stream.flush().await;
                    return;
                }
                Err(err) => {
                    let code = err.close_code().code();
                    let _ = stream.write_all(&Frame::close(Some(code), None).to_bytes()).await;
                    let _ = stream.flush().await;
                    return;
                }
            };
            if stream.write_all(&reply.to_bytes()).await.is_err() {
                return;
            }
        }

        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => frames = parser.feed(&chunk[..n]),
        }
    }
}
