//! WebSocket handshake implementation
//!
//! This module provides the HTTP upgrade handshake as defined in RFC 6455
//! Section 4: building and validating the client request, and (for test
//! peers and embedded endpoints) parsing that request and producing the
//! `101 Switching Protocols` answer.

use crate::error::{Error, ProtocolError};
use crate::protocol::constants::*;
use crate::protocol::http_header::*;
use crate::protocol::http_method;
use crate::protocol::http_status::*;
use crate::protocol::http_value;
use base64::{engine::general_purpose, Engine as _};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// WebSocket handshake request information
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    /// HTTP method (should be GET)
    pub method: String,
    /// Request target (path and query)
    pub uri: String,
    /// HTTP headers, keyed by lowercase name
    pub headers: HashMap<String, String>,
}

impl HandshakeRequest {
    /// The `Sec-WebSocket-Key` this request carries
    pub fn key(&self) -> Option<&str> {
        self.headers.get(SEC_WEBSOCKET_KEY).map(String::as_str)
    }
}

/// WebSocket handshake response information
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    /// HTTP status code
    pub status: u16,
    /// HTTP status message
    pub status_message: String,
    /// HTTP headers, keyed by lowercase name
    pub headers: HashMap<String, String>,
}

impl HandshakeResponse {
    /// A non-upgrade answer refusing the request
    pub fn rejection(status: u16, status_message: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-length".to_string(), "0".to_string());
        Self {
            status,
            status_message: status_message.into(),
            headers,
        }
    }
}

/// WebSocket handshake configuration
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    /// WebSocket protocols to offer/accept
    pub protocols: Vec<String>,
    /// Origin header value (client only)
    pub origin: Option<String>,
    /// Host header value (client only)
    pub host: Option<String>,
    /// User-Agent header value (client only)
    pub user_agent: Option<String>,
    /// Additional headers
    pub extra_headers: Vec<(String, String)>,
}

/// Generate a random WebSocket key
pub fn generate_key() -> String {
    use rand::RngCore;
    let mut key_bytes = [0u8; WEBSOCKET_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    general_purpose::STANDARD.encode(key_bytes)
}

/// Compute WebSocket accept key from client key
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_MAGIC.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

/// Validate WebSocket key format
pub fn validate_key(key: &str) -> bool {
    key.len() == 24
        && general_purpose::STANDARD
            .decode(key)
            .map(|raw| raw.len() == WEBSOCKET_KEY_LEN)
            .unwrap_or(false)
}

/// Validate WebSocket version
pub fn validate_version(version: &str) -> bool {
    version == WEBSOCKET_VERSION
}

/// Create a client handshake request for the given request target
pub fn create_client_handshake(uri: &str, config: &HandshakeConfig) -> HandshakeRequest {
    let mut headers = HashMap::new();

    headers.insert(UPGRADE.to_string(), http_value::WEBSOCKET.to_string());
    headers.insert(CONNECTION.to_string(), http_value::UPGRADE.to_string());
    headers.insert(SEC_WEBSOCKET_KEY.to_string(), generate_key());
    headers.insert(SEC_WEBSOCKET_VERSION.to_string(), WEBSOCKET_VERSION.to_string());

    if let Some(host) = &config.host {
        headers.insert(HOST.to_string(), host.clone());
    }

    if let Some(origin) = &config.origin {
        headers.insert(ORIGIN.to_string(), origin.clone());
    }

    if let Some(agent) = &config.user_agent {
        headers.insert(USER_AGENT.to_string(), agent.clone());
    }

    if !config.protocols.is_empty() {
        headers.insert(SEC_WEBSOCKET_PROTOCOL.to_string(), config.protocols.join(", "));
    }

    for (key, value) in &config.extra_headers {
        headers
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| value.clone());
    }

    HandshakeRequest {
        method: http_method::GET.to_string(),
        uri: uri.to_string(),
        headers,
    }
}

fn collect_headers(raw: &[httparse::Header<'_>]) -> Result<HashMap<String, String>, Error> {
    let mut headers = HashMap::with_capacity(raw.len());
    for header in raw {
        let value = std::str::from_utf8(header.value).map_err(|_| {
            Error::Protocol(ProtocolError::InvalidHeaderValue {
                header: header.name.to_string(),
                value: String::from_utf8_lossy(header.value).into_owned(),
            })
        })?;
        headers.insert(header.name.to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(headers)
}

fn invalid_format(err: httparse::Error) -> Error {
    Error::Protocol(ProtocolError::InvalidFormat(err.to_string()))
}

/// Parse a client handshake request.
///
/// Returns `Ok(None)` while the head is incomplete, otherwise the request
/// and the number of bytes it occupied.
pub fn parse_client_handshake(buf: &[u8]) -> Result<Option<(HandshakeRequest, usize)>, Error> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut raw_headers);

    let consumed = match request.parse(buf).map_err(invalid_format)? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let method = request.method.unwrap_or_default().to_string();
    if method != http_method::GET {
        return Err(Error::Protocol(ProtocolError::InvalidMethod(method)));
    }

    Ok(Some((
        HandshakeRequest {
            method,
            uri: request.path.unwrap_or("/").to_string(),
            headers: collect_headers(request.headers)?,
        },
        consumed,
    )))
}

fn require_header<'a>(
    headers: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a String, Error> {
    headers
        .get(name)
        .ok_or_else(|| Error::Protocol(ProtocolError::MissingHeader(name.to_string())))
}

fn check_upgrade_headers(headers: &HashMap<String, String>) -> Result<(), Error> {
    let upgrade = require_header(headers, UPGRADE)?;
    if !upgrade.eq_ignore_ascii_case(http_value::WEBSOCKET) {
        return Err(Error::Protocol(ProtocolError::InvalidHeaderValue {
            header: UPGRADE.to_string(),
            value: upgrade.clone(),
        }));
    }

    let connection = require_header(headers, CONNECTION)?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err(Error::Protocol(ProtocolError::InvalidHeaderValue {
            header: CONNECTION.to_string(),
            value: connection.clone(),
        }));
    }

    Ok(())
}

/// Validate a client handshake request
pub fn validate_client_handshake(request: &HandshakeRequest) -> Result<(), Error> {
    check_upgrade_headers(&request.headers)?;

    let key = require_header(&request.headers, SEC_WEBSOCKET_KEY)?;
    if !validate_key(key) {
        return Err(Error::Protocol(ProtocolError::InvalidHeaderValue {
            header: SEC_WEBSOCKET_KEY.to_string(),
            value: key.clone(),
        }));
    }

    let version = require_header(&request.headers, SEC_WEBSOCKET_VERSION)?;
    if !validate_version(version) {
        return Err(Error::Protocol(ProtocolError::InvalidHeaderValue {
            header: SEC_WEBSOCKET_VERSION.to_string(),
            value: version.clone(),
        }));
    }

    Ok(())
}

/// Create a server handshake response
pub fn create_server_handshake(
    request: &HandshakeRequest,
    config: &HandshakeConfig,
) -> Result<HandshakeResponse, Error> {
    let mut headers = HashMap::new();

    headers.insert(UPGRADE.to_string(), http_value::WEBSOCKET.to_string());
    headers.insert(CONNECTION.to_string(), http_value::UPGRADE.to_string());

    let client_key = require_header(&request.headers, SEC_WEBSOCKET_KEY)?;
    headers.insert(SEC_WEBSOCKET_ACCEPT.to_string(), compute_accept_key(client_key));

    if let Some(offered) = request.headers.get(SEC_WEBSOCKET_PROTOCOL) {
        let offered: Vec<&str> = offered.split(',').map(str::trim).collect();
        if let Some(protocol) = config
            .protocols
            .iter()
            .find(|p| offered.contains(&p.as_str()))
        {
            headers.insert(SEC_WEBSOCKET_PROTOCOL.to_string(), protocol.clone());
        }
    }

    for (key, value) in &config.extra_headers {
        headers.insert(key.to_ascii_lowercase(), value.clone());
    }

    Ok(HandshakeResponse {
        status: SWITCHING_PROTOCOLS,
        status_message: "Switching Protocols".to_string(),
        headers,
    })
}

/// Parse a server handshake response.
///
/// Returns `Ok(None)` while the head is incomplete, otherwise the response
/// and the number of bytes it occupied. Bytes after that offset already
/// belong to the WebSocket frame stream.
pub fn parse_server_handshake(buf: &[u8]) -> Result<Option<(HandshakeResponse, usize)>, Error> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut raw_headers);

    let consumed = match response.parse(buf).map_err(invalid_format)? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    Ok(Some((
        HandshakeResponse {
            status: response.code.unwrap_or_default(),
            status_message: response.reason.unwrap_or_default().to_string(),
            headers: collect_headers(response.headers)?,
        },
        consumed,
    )))
}

/// Validate a server handshake response
pub fn validate_server_handshake(
    response: &HandshakeResponse,
    client_key: &str,
) -> Result<(), Error> {
    if response.status != SWITCHING_PROTOCOLS {
        return Err(Error::Protocol(ProtocolError::UnexpectedStatus(response.status)));
    }

    check_upgrade_headers(&response.headers)?;

    let accept = require_header(&response.headers, SEC_WEBSOCKET_ACCEPT)?;
    let expected_accept = compute_accept_key(client_key);
    if accept.as_str() != expected_accept {
        return Err(Error::Protocol(ProtocolError::InvalidAcceptKey {
            expected: expected_accept,
            received: accept.clone(),
        }));
    }

    Ok(())
}

/// Convert handshake request to HTTP string
pub fn request_to_string(request: &HandshakeRequest) -> String {
    let mut out = format!("{} {} HTTP/1.1\r\n", request.method, request.uri);
    for (key, value) in &request.headers {
        out.push_str(&format!("{}: {}\r\n", key, value));
    }
    out.push_str("\r\n");
    out
}

/// Convert handshake response to HTTP string
pub fn response_to_string(response: &HandshakeResponse) -> String {
    let mut out = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status, response.status_message
    );
    for (key, value) in &response.headers {
        out.push_str(&format!("{}: {}\r\n", key, value));
    }
    out.push_str("\r\n");
    out
}

/// Build the answer a server sends for a raw request head: either the
/// upgrade response or a `400 Bad Request` carrying the validation error.
pub fn answer_client_handshake(
    request: &HandshakeRequest,
    config: &HandshakeConfig,
) -> Result<HandshakeResponse, (HandshakeResponse, Error)> {
    validate_client_handshake(request)
        .and_then(|()| create_server_handshake(request, config))
        .map_err(|err| (HandshakeResponse::rejection(BAD_REQUEST, "Bad Request"), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key = generate_key();
        assert_eq!(key.len(), 24);
        assert!(validate_key(&key));
        assert!(!validate_key("short"));
    }

    #[test]
    fn test_accept_key_calculation() {
        let key = "dGhlIHNhbXBsZSBub25jZQ=="; // "the sample nonce"
        let expected = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";
        assert_eq!(compute_accept_key(key), expected);
    }

    #[test]
    fn test_client_handshake_creation() {
        let config = HandshakeConfig {
            host: Some("example.com".to_string()),
            protocols: vec!["chat".to_string()],
            extra_headers: vec![("X-Trace".to_string(), "1".to_string())],
            ..Default::default()
        };

        let request = create_client_handshake("/chat", &config);
        assert_eq!(request.method, "GET");
        assert_eq!(request.uri, "/chat");
        assert_eq!(request.headers.get("upgrade").unwrap(), "websocket");
        assert_eq!(request.headers.get("sec-websocket-protocol").unwrap(), "chat");
        assert_eq!(request.headers.get("x-trace").unwrap(), "1");
        assert!(validate_key(request.key().unwrap()));

        let raw = request_to_string(&request);
        assert!(raw.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_server_parses_and_answers_client_request() {
        let request = create_client_handshake("/echo", &HandshakeConfig::default());
        let raw = request_to_string(&request);

        let (parsed, consumed) = parse_client_handshake(raw.as_bytes()).unwrap().unwrap();
        assert_eq!(consumed, raw.len());
        assert_eq!(parsed.uri, "/echo");
        assert!(validate_client_handshake(&parsed).is_ok());

        let response = answer_client_handshake(&parsed, &HandshakeConfig::default()).unwrap();
        assert_eq!(response.status, 101);
        assert!(validate_server_handshake(&response, request.key().unwrap()).is_ok());
    }

    #[test]
    fn test_partial_heads() {
        assert!(parse_client_handshake(b"GET /chat HTTP/1.1\r\nHost: a").unwrap().is_none());
        assert!(parse_server_handshake(b"HTTP/1.1 101 Switching").unwrap().is_none());
    }

    #[test]
    fn test_server_response_parsing_keeps_trailing_bytes() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let mut raw = format!(
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept_key(key)
        )
        .into_bytes();
        raw.extend_from_slice(&[0x82, 0x00]);

        let (response, consumed) = parse_server_handshake(&raw).unwrap().unwrap();
        assert_eq!(raw.len() - consumed, 2);
        assert!(validate_server_handshake(&response, key).is_ok());
    }

    #[test]
    fn test_server_response_validation_failures() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";

        let rejected = HandshakeResponse::rejection(400, "Bad Request");
        assert!(matches!(
            validate_server_handshake(&rejected, key),
            Err(Error::Protocol(ProtocolError::UnexpectedStatus(400)))
        ));

        let request = create_client_handshake("/", &HandshakeConfig::default());
        let response = create_server_handshake(&request, &HandshakeConfig::default()).unwrap();
        assert!(matches!(
            validate_server_handshake(&response, key),
            Err(Error::Protocol(ProtocolError::InvalidAcceptKey { .. }))
        ));
    }

    #[test]
    fn test_client_request_validation_failures() {
        let raw = b"GET / HTTP/1.1\r\nHost: a\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Version: 13\r\n\r\n";
        let (request, _) = parse_client_handshake(raw).unwrap().unwrap();
        let (rejection, err) = answer_client_handshake(&request, &HandshakeConfig::default())
            .unwrap_err();
        assert_eq!(rejection.status, 400);
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MissingHeader(ref h)) if h == "sec-websocket-key"
        ));

        assert!(matches!(
            parse_client_handshake(b"POST / HTTP/1.1\r\n\r\n"),
            Err(Error::Protocol(ProtocolError::InvalidMethod(_)))
        ));
    }

    #[test]
    fn test_protocol_negotiation() {
        let client = HandshakeConfig {
            protocols: vec!["v2".to_string(), "v1".to_string()],
            ..Default::default()
        };
        let server = HandshakeConfig {
            protocols: vec!["v1".to_string()],
            ..Default::default()
        };
        let request = create_client_handshake("/", &client);
        let response = create_server_handshake(&request, &server).unwrap();
        assert_eq!(response.headers.get("sec-websocket-protocol").unwrap(), "v1");
    }
}
