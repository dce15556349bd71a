//! Request line parsing.
//!
//! Only the first line of the request is looked at. Headers and body are
//! never parsed; the raw bytes are handed to the application unchanged as
//! the context's input stream.

use crate::error::{WicketError, WicketResult};

/// The three parts of an HTTP request line, with the target split on `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: String,
    path: String,
    query_string: String,
    version: String,
}

impl RequestLine {
    /// Creates a request line from already-split parts.
    pub fn new(
        method: impl Into<String>,
        target: &str,
        version: impl Into<String>,
    ) -> Self {
        let (path, query_string) = split_target(target);
        Self {
            method: method.into(),
            path: path.to_string(),
            query_string: query_string.to_string(),
            version: version.into(),
        }
    }

    /// Request method, e.g. `GET`.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path part of the request target. Not percent-decoded.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string without the leading `?`; empty when absent.
    #[must_use]
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Protocol version token, e.g. `HTTP/1.1`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Parses the request line out of the first chunk read from a connection.
///
/// The first line is taken, trailing CR/LF stripped, and the rest split on
/// whitespace. Exactly three tokens are required.
///
/// # Example
///
/// ```
/// use wicket_core::parse_request_line;
///
/// let line = parse_request_line("GET /hello?name=world HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
/// assert_eq!(line.method(), "GET");
/// assert_eq!(line.path(), "/hello");
/// assert_eq!(line.query_string(), "name=world");
/// ```
pub fn parse_request_line(text: &str) -> WicketResult<RequestLine> {
    let first = text
        .lines()
        .next()
        .ok_or_else(|| WicketError::malformed(""))?
        .trim_end_matches(['\r', '\n']);

    let mut tokens = first.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(method), Some(target), Some(version), None) => {
            Ok(RequestLine::new(method, target, version))
        }
        _ => Err(WicketError::malformed(first)),
    }
}

fn split_target(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}
