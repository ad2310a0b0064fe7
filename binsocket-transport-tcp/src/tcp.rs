//! TCP transport implementation for BinSocket
//!
//! This module provides TCP-based streams for WebSocket connections: a
//! listener used by embedded endpoints and a connector used by the client.

use async_trait::async_trait;
use binsocket_core::transport::{
    Connector, Transport, TransportRead, TransportStream, TransportWrite,
};
use binsocket_core::{Error, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream as TokioTcpStream};

/// TCP transport bound to a local address
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Create a new TCP transport bound to the given address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, "tcp transport listening");

        Ok(Self {
            listener,
            local_addr,
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> Result<Self::Stream> {
        let (stream, remote) = self.listener.accept().await?;
        tracing::trace!(%remote, "accepted tcp connection");
        TcpStream::from_tokio(stream)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

/// TCP stream implementation
#[derive(Debug)]
pub struct TcpStream {
    stream: TokioTcpStream,
    remote_addr: SocketAddr,
}

impl TcpStream {
    /// Create a new TCP stream from a tokio TCP stream
    pub fn from_tokio(stream: TokioTcpStream) -> Result<Self> {
        let remote_addr = stream.peer_addr()?;
        Ok(Self {
            stream,
            remote_addr,
        })
    }
}

#[async_trait]
impl TransportRead for TcpStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.stream.read(buf).await?)
    }
}

#[async_trait]
impl TransportWrite for TcpStream {
    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.stream.write_all(buf).await?)
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(self.stream.flush().await?)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(self.stream.shutdown().await?)
    }
}

impl TransportStream for TcpStream {
    fn remote_addr(&self) -> Result<SocketAddr> {
        Ok(self.remote_addr)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    fn into_split(self: Box<Self>) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>) {
        let (read, write) = self.stream.into_split();
        (Box::new(TcpReadHalf(read)), Box::new(TcpWriteHalf(write)))
    }
}

/// Owned read half of a [`TcpStream`]
#[derive(Debug)]
pub struct TcpReadHalf(OwnedReadHalf);

/// Owned write half of a [`TcpStream`]
#[derive(Debug)]
pub struct TcpWriteHalf(OwnedWriteHalf);

#[async_trait]
impl TransportRead for TcpReadHalf {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.0.read(buf).await?)
    }
}

#[async_trait]
impl TransportWrite for TcpWriteHalf {
    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.0.write_all(buf).await?)
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(self.0.flush().await?)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(self.0.shutdown().await?)
    }
}

/// Opens plain TCP connections for the client
#[derive(Debug, Clone)]
pub struct TcpConnector {
    nodelay: bool,
}

impl TcpConnector {
    /// Create a connector with Nagle's algorithm disabled
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Enable or disable `TCP_NODELAY` on new connections
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn TransportStream>> {
        let stream = TokioTcpStream::connect((host, port)).await.map_err(|err| {
            Error::Connection(format!("failed to connect to {}:{}: {}", host, port, err))
        })?;
        stream.set_nodelay(self.nodelay)?;
        tracing::debug!(host, port, "tcp connection established");
        Ok(Box::new(TcpStream::from_tokio(stream)?))
    }
}
