//! Transport layer abstraction
//!
//! This module provides the byte-stream abstraction the WebSocket pipeline
//! runs on. A connection reads and writes concurrently, so every stream can
//! be split into an owned read half and an owned write half.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::net::SocketAddr;

/// Read side of a transport stream
#[async_trait]
pub trait TransportRead: Send {
    /// Read data from the stream; `Ok(0)` means end of stream
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Write side of a transport stream
#[async_trait]
pub trait TransportWrite: Send {
    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush the stream
    async fn flush(&mut self) -> Result<()>;

    /// Shut down the write direction
    async fn close(&mut self) -> Result<()>;
}

/// Trait for transport streams
pub trait TransportStream: TransportRead + TransportWrite {
    /// Get the remote address
    fn remote_addr(&self) -> Result<SocketAddr>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Split into independently owned halves
    fn into_split(self: Box<Self>) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>);
}

/// Listening side of a transport (used by embedded endpoints)
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The stream type produced by this transport
    type Stream: TransportStream + 'static;

    /// Accept an incoming connection
    async fn accept(&self) -> Result<Self::Stream>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// Connecting side of a transport
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a byte stream to `host:port`
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn TransportStream>>;
}

/// Adapters for any tokio `AsyncRead + AsyncWrite` type
#[cfg(feature = "tokio-runtime")]
pub mod io {
    use super::*;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    /// Wraps a tokio I/O object as a [`TransportStream`]
    #[derive(Debug)]
    pub struct IoStream<S> {
        inner: S,
        remote_addr: Option<SocketAddr>,
        local_addr: Option<SocketAddr>,
    }

    impl<S> IoStream<S> {
        /// Wrap an I/O object that has no socket addresses (e.g. an in-memory pipe)
        pub fn new(inner: S) -> Self {
            Self {
                inner,
                remote_addr: None,
                local_addr: None,
            }
        }

        /// Attach the addresses reported by `remote_addr` / `local_addr`
        pub fn with_addrs(mut self, remote: SocketAddr, local: SocketAddr) -> Self {
            self.remote_addr = Some(remote);
            self.local_addr = Some(local);
            self
        }
    }

    fn no_addr() -> Error {
        Error::Connection("stream has no socket address".to_string())
    }

    /// Owned read half of an [`IoStream`]
    #[derive(Debug)]
    pub struct IoReader<R>(R);

    /// Owned write half of an [`IoStream`]
    #[derive(Debug)]
    pub struct IoWriter<W>(W);

    #[async_trait]
    impl<R: AsyncRead + Send + Unpin> TransportRead for IoReader<R> {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            Ok(self.0.read(buf).await?)
        }
    }

    #[async_trait]
    impl<W: AsyncWrite + Send + Unpin> TransportWrite for IoWriter<W> {
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

    #[async_trait]
    impl<S: AsyncRead + AsyncWrite + Send + Unpin> TransportRead for IoStream<S> {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            Ok(self.inner.read(buf).await?)
        }
    }

    #[async_trait]
    impl<S: AsyncRead + AsyncWrite + Send + Unpin> TransportWrite for IoStream<S> {
        async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
            Ok(self.inner.write_all(buf).await?)
        }

        async fn flush(&mut self) -> Result<()> {
            Ok(self.inner.flush().await?)
        }

        async fn close(&mut self) -> Result<()> {
            Ok(self.inner.shutdown().await?)
        }
    }

    impl<S> TransportStream for IoStream<S>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        fn remote_addr(&self) -> Result<SocketAddr> {
            self.remote_addr.ok_or_else(no_addr)
        }

        fn local_addr(&self) -> Result<SocketAddr> {
            self.local_addr.ok_or_else(no_addr)
        }

        fn into_split(self: Box<Self>) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>) {
            let (read, write) = tokio::io::split(self.inner);
            (Box::new(IoReader(read)), Box::new(IoWriter(write)))
        }
    }
}

#[cfg(all(test, feature = "tokio-runtime"))]
mod tests {
    use super::io::IoStream;
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_io_stream_roundtrip() {
        let (a, b) = tokio::io::duplex(64);
        let mut left = IoStream::new(a);
        let mut right = IoStream::new(b);

        assert_ok!(left.write_all(b"hello").await);
        assert_ok!(left.flush().await);

        let mut buf = [0u8; 16];
        let n = right.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn test_split_halves_work_independently() {
        let (a, b) = tokio::io::duplex(64);
        let stream: Box<dyn TransportStream> = Box::new(IoStream::new(a));
        let (mut reader, mut writer) = stream.into_split();
        let mut peer = IoStream::new(b);

        assert_ok!(writer.write_all(b"ping").await);
        let mut buf = [0u8; 8];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        assert_ok!(peer.write_all(b"pong").await);
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");

        assert_ok!(writer.close().await);
        assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
    }

    #[test]
    fn test_addresses() {
        let (a, _b) = tokio::io::duplex(8);
        let stream = IoStream::new(a);
        assert!(matches!(stream.remote_addr(), Err(Error::Connection(_))));

        let remote: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let local: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let (a, _b) = tokio::io::duplex(8);
        let stream = IoStream::new(a).with_addrs(remote, local);
        assert_eq!(stream.remote_addr().unwrap(), remote);
        assert_eq!(stream.local_addr().unwrap(), local);
    }
}
