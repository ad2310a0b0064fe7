//! WebSocket client implementation for BinSocket
//!
//! A [`Client`] prepares upgrade requests. Executing a request connects,
//! performs the HTTP upgrade and hands the stream to a new connection whose
//! events go to the listeners of the supplied [`UpgradeHandler`].

use crate::config::{validate_header, ClientConfig};
use crate::connection::Connection;
use crate::upgrade::UpgradeHandler;
use crate::websocket::WebSocket;
use binsocket_core::error::{ProtocolError, TimeoutError};
use binsocket_core::handshake::{
    create_client_handshake, parse_server_handshake, request_to_string,
    validate_server_handshake, HandshakeConfig, HandshakeResponse,
};
use binsocket_core::protocol::constants::MAX_HEADER_SIZE;
use binsocket_core::protocol::http_header::{SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL};
use binsocket_core::transport::{Connector, TransportStream};
use binsocket_core::{Error, Result};
use bytes::{Buf, BytesMut};
use std::fmt;
use std::sync::Arc;
use tokio::time::timeout;

const DEFAULT_PORT: u16 = 80;

/// WebSocket client
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    connector: Arc<dyn Connector>,
}

impl Client {
    /// Create a client that connects over plain TCP
    #[cfg(feature = "transport-tcp")]
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, binsocket_transport_tcp::TcpConnector::new())
    }

    /// Create a client that opens streams through `connector`
    pub fn with_connector(config: ClientConfig, connector: impl Connector) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Prepare an upgrade request for a `ws://` URL
    pub fn prepare_get(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            url: url.into(),
            headers: Vec::new(),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// An upgrade request that has not been sent yet
#[derive(Debug)]
pub struct RequestBuilder {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl RequestBuilder {
    /// Add a header to this request; it takes precedence over configured headers
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Connect, perform the upgrade and start the connection.
    ///
    /// Resolves once every listener's `on_open` has returned. Connect and
    /// handshake failures are returned here and never reach the listeners.
    #[tracing::instrument(skip(self, handler), fields(url = %self.url))]
    pub async fn execute(self, handler: UpgradeHandler) -> Result<WebSocket> {
        let target = Target::parse(&self.url)?;
        for (name, value) in &self.headers {
            validate_header(name, value)?;
        }

        let handshake_timeout = self.client.config.handshake_timeout;
        let upgraded = timeout(handshake_timeout, self.upgrade(&target))
            .await
            .map_err(|_| TimeoutError::Handshake {
                timeout: handshake_timeout,
            })??;
        tracing::debug!(subprotocol = ?upgraded.subprotocol, "upgrade accepted");

        Ok(Connection::start(
            upgraded.stream,
            upgraded.leftover,
            upgraded.subprotocol,
            self.client.config.clone(),
            handler.into_listeners(),
        )
        .await)
    }

    async fn upgrade(&self, target: &Target) -> Result<Upgraded> {
        let config = &self.client.config;
        let mut stream = self
            .client
            .connector
            .connect(&target.host, target.port)
            .await?;

        let mut extra_headers = self.headers.clone();
        extra_headers.extend(config.headers.iter().cloned());
        let handshake = HandshakeConfig {
            protocols: config.protocols.clone(),
            origin: config.origin.clone(),
            host: Some(target.host_header()),
            user_agent: Some(config.user_agent.clone()),
            extra_headers,
        };
        let request = create_client_handshake(&target.resource, &handshake);
        let key = request
            .key()
            .map(str::to_owned)
            .ok_or_else(|| ProtocolError::MissingHeader(SEC_WEBSOCKET_KEY.to_string()))?;

        stream.write_all(request_to_string(&request).as_bytes()).await?;
        stream.flush().await?;

        let mut buffer = BytesMut::with_capacity(1024);
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::Connection(
                    "connection closed during handshake".to_string(),
                ));
            }
            buffer.extend_from_slice(&chunk[..n]);

            if let Some((response, consumed)) = parse_server_handshake(&buffer)? {
                validate_server_handshake(&response, &key)?;
                let subprotocol = negotiated_protocol(&config.protocols, &response)?;
                buffer.advance(consumed);
                return Ok(Upgraded {
                    stream,
                    leftover: buffer,
                    subprotocol,
                });
            }

            if buffer.len() > MAX_HEADER_SIZE {
                return Err(ProtocolError::InvalidFormat(
                    "handshake response too large".to_string(),
                )
                .into());
            }
        }
    }
}

/// A stream that completed the upgrade
struct Upgraded {
    stream: Box<dyn TransportStream>,
    /// Frame bytes that arrived together with the response head
    leftover: BytesMut,
    subprotocol: Option<String>,
}

fn negotiated_protocol(offered: &[String], response: &HandshakeResponse) -> Result<Option<String>> {
    match response.headers.get(SEC_WEBSOCKET_PROTOCOL) {
        None => Ok(None),
        Some(selected) if offered.iter().any(|protocol| protocol == selected) => {
            Ok(Some(selected.clone()))
        }
        Some(selected) => Err(ProtocolError::InvalidHeaderValue {
            header: SEC_WEBSOCKET_PROTOCOL.to_string(),
            value: selected.clone(),
        }
        .into()),
    }
}

/// Where an upgrade request goes
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    /// Path and query sent in the request line
    resource: String,
}

impl Target {
    fn parse(url: &str) -> Result<Self> {
        let uri: http::Uri = url.parse().map_err(|err: http::uri::InvalidUri| {
            ProtocolError::InvalidFormat(format!("invalid url {}: {}", url, err))
        })?;

        match uri.scheme_str() {
            Some("ws") => {}
            Some(other) => return Err(ProtocolError::UnsupportedScheme(other.to_string()).into()),
            None => {
                return Err(
                    ProtocolError::InvalidFormat(format!("url {} has no scheme", url)).into(),
                )
            }
        }

        let host = uri
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ProtocolError::InvalidFormat(format!("url {} has no host", url)))?;
        let resource = uri
            .path_and_query()
            .map(|resource| resource.as_str())
            .filter(|resource| resource.starts_with('/'))
            .unwrap_or("/");

        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: uri.port_u16().unwrap_or(DEFAULT_PORT),
            resource: resource.to_string(),
        })
    }

    fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == DEFAULT_PORT {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}
