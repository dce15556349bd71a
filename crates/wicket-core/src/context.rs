//! Request context types.
//!
//! A [`RequestContext`] is what the application sees of a request: the parsed
//! request line, the server identity and a fixed set of protocol flags. It is
//! built fresh for every request by a [`ContextBuilder`] and never mutated
//! afterwards.

use std::io::Cursor;
use std::net::SocketAddr;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::request::RequestLine;

/// Version of the calling contract between server and application.
pub const CONTRACT_VERSION: (u8, u8) = (1, 0);

/// Well-known keys of the context mapping.
pub mod keys {
    /// Request method.
    pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
    /// Request path.
    pub const PATH_INFO: &str = "PATH_INFO";
    /// Query string, empty if absent.
    pub const QUERY_STRING: &str = "QUERY_STRING";
    /// Resolved server host name.
    pub const SERVER_NAME: &str = "SERVER_NAME";
    /// Bound server port.
    pub const SERVER_PORT: &str = "SERVER_PORT";
    /// Protocol version token from the request line.
    pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
    /// Peer IP address.
    pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
    /// Contract version tuple.
    pub const VERSION: &str = "wicket.version";
    /// URL scheme.
    pub const URL_SCHEME: &str = "wicket.url_scheme";
    /// Whether other requests may run on threads of the same handler.
    pub const MULTITHREAD: &str = "wicket.multithread";
    /// Whether requests are served by isolated workers.
    pub const MULTIPROCESS: &str = "wicket.multiprocess";
    /// Whether the application is invoked only once per server lifetime.
    pub const RUN_ONCE: &str = "wicket.run_once";
}

/// Static identity of the listening server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    name: String,
    port: u16,
}

impl ServerIdentity {
    /// Creates a server identity.
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }

    /// Resolved host name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Per-request context handed to the application.
///
/// Typed accessors cover every key; [`RequestContext::to_map`] and
/// [`RequestContext::get`] expose the same data as a string-keyed mapping.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use wicket_core::{parse_request_line, ContextBuilder, ServerIdentity};
///
/// let builder = ContextBuilder::new(ServerIdentity::new("localhost", 8888));
/// let line = parse_request_line("GET /hi?x=1 HTTP/1.1").unwrap();
/// let ctx = builder.build(&line, Bytes::new(), None);
///
/// assert_eq!(ctx.path(), "/hi");
/// assert_eq!(ctx.get("QUERY_STRING"), Some("x=1".into()));
/// assert_eq!(ctx.get("SERVER_PORT"), Some(8888.into()));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    #[serde(rename = "REQUEST_METHOD")]
    method: String,

    #[serde(rename = "PATH_INFO")]
    path: String,

    #[serde(rename = "QUERY_STRING")]
    query_string: String,

    #[serde(rename = "SERVER_NAME")]
    server_name: String,

    #[serde(rename = "SERVER_PORT")]
    server_port: u16,

    #[serde(rename = "SERVER_PROTOCOL")]
    server_protocol: String,

    #[serde(rename = "REMOTE_ADDR", skip_serializing_if = "Option::is_none")]
    remote_addr: Option<String>,

    #[serde(rename = "wicket.version")]
    version: (u8, u8),

    #[serde(rename = "wicket.url_scheme")]
    url_scheme: &'static str,

    #[serde(rename = "wicket.multithread")]
    multithread: bool,

    #[serde(rename = "wicket.multiprocess")]
    multiprocess: bool,

    #[serde(rename = "wicket.run_once")]
    run_once: bool,

    /// Bytes of the single read that follow the header block.
    #[serde(skip)]
    input: Bytes,
}

impl RequestContext {
    /// Request method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path, not percent-decoded.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string; empty if the target had no `?`.
    #[must_use]
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Resolved server host name.
    #[must_use]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Bound server port.
    #[must_use]
    pub const fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Protocol version token from the request line.
    #[must_use]
    pub fn server_protocol(&self) -> &str {
        &self.server_protocol
    }

    /// Peer IP address, when known.
    #[must_use]
    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Contract version tuple, always [`CONTRACT_VERSION`].
    #[must_use]
    pub const fn version(&self) -> (u8, u8) {
        self.version
    }

    /// URL scheme, always `http`.
    #[must_use]
    pub const fn url_scheme(&self) -> &'static str {
        self.url_scheme
    }

    /// Always `false`: no two requests share a worker.
    #[must_use]
    pub const fn multithread(&self) -> bool {
        self.multithread
    }

    /// Always `true`: every connection gets its own isolated worker.
    #[must_use]
    pub const fn multiprocess(&self) -> bool {
        self.multiprocess
    }

    /// Always `false`.
    #[must_use]
    pub const fn run_once(&self) -> bool {
        self.run_once
    }

    /// A fresh reader over the raw request bytes.
    #[must_use]
    pub fn input(&self) -> Cursor<Bytes> {
        Cursor::new(self.input.clone())
    }

    /// The raw request bytes.
    #[must_use]
    pub fn raw_input(&self) -> &Bytes {
        &self.input
    }

    /// The context as a string-keyed mapping. The input stream is not included.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Looks up a single key of the mapping view.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.to_map().remove(key)
    }
}

/// Builds [`RequestContext`] values for one server identity.
///
/// Pure: no I/O and no failure modes.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    identity: ServerIdentity,
}

impl ContextBuilder {
    /// Creates a builder for the given server identity.
    #[must_use]
    pub fn new(identity: ServerIdentity) -> Self {
        Self { identity }
    }

    /// Returns the server identity.
    #[must_use]
    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Builds the context for one parsed request.
    #[must_use]
    pub fn build(
        &self,
        line: &RequestLine,
        input: Bytes,
        peer: Option<SocketAddr>,
    ) -> RequestContext {
        RequestContext {
            method: line.method().to_string(),
            path: line.path().to_string(),
            query_string: line.query_string().to_string(),
            server_name: self.identity.name().to_string(),
            server_port: self.identity.port(),
            server_protocol: line.version().to_string(),
            remote_addr: peer.map(|addr| addr.ip().to_string()),
            version: CONTRACT_VERSION,
            url_scheme: "http",
            multithread: false,
            multiprocess: true,
            run_once: false,
            input,
        }
    }
}
