//! Parsed raw responses.

use crate::error::TestError;
use bytes::Bytes;
use http::StatusCode;

/// A response read off the wire, with helper methods for assertions.
///
/// Headers keep their wire order, so tests can check where the server put
/// its own headers.
#[derive(Debug, Clone)]
pub struct TestResponse {
    /// Protocol token of the status line
    version: String,
    /// HTTP status code
    status: StatusCode,
    /// Reason phrase, possibly empty
    reason: String,
    /// Response headers in wire order
    headers: Vec<(String, String)>,
    /// Response body bytes
    body: Bytes,
    /// Everything received
    raw: Bytes,
}

impl TestResponse {
    /// Parses a complete response.
    ///
    /// # Errors
    ///
    /// Returns `TestError::MalformedResponse` if there is no blank line
    /// after the headers or the status line cannot be read.
    ///
    /// # Example
    ///
    /// ```
    /// use wicket_test::TestResponse;
    ///
    /// let response = TestResponse::parse(b"HTTP/1.1 200 OK\r\nServer: Wicket\r\n\r\nok").unwrap();
    /// assert_eq!(response.status_code(), 200);
    /// assert_eq!(response.header("server"), Some("Wicket"));
    /// assert_eq!(response.text().unwrap(), "ok");
    /// ```
    pub fn parse(raw: &[u8]) -> Result<Self, TestError> {
        let split = raw
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .ok_or_else(|| TestError::MalformedResponse("no end of headers".to_string()))?;

        let head = std::str::from_utf8(&raw[..split])
            .map_err(|e| TestError::MalformedResponse(format!("head is not UTF-8: {e}")))?;
        let mut lines = head.split("\r\n");

        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default().to_string();
        let code = parts
            .next()
            .ok_or_else(|| TestError::MalformedResponse(format!("no status in {status_line:?}")))?;
        let status = StatusCode::from_bytes(code.as_bytes())
            .map_err(|e| TestError::MalformedResponse(format!("bad status {code:?}: {e}")))?;
        let reason = parts.next().unwrap_or_default().to_string();

        let headers = lines
            .map(|line| {
                line.split_once(':')
                    .map(|(name, value)| (name.to_string(), value.trim_start().to_string()))
                    .ok_or_else(|| TestError::MalformedResponse(format!("bad header {line:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let raw = Bytes::copy_from_slice(raw);
        Ok(Self {
            version,
            status,
            reason,
            headers,
            body: raw.slice(split + 4..),
            raw,
        })
    }

    /// Returns the protocol token, e.g. `"HTTP/1.1"`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the reason phrase.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the headers in wire order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the header names in wire order.
    #[must_use]
    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Gets the first header value with this name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Returns the Content-Length header value.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns every byte received.
    #[must_use]
    pub const fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Returns the body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::MalformedResponse(format!("Invalid UTF-8 body: {e}")))
    }

    // Assertion methods

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.status.as_u16()
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        match self.header(name) {
            Some(actual) => assert_eq!(
                actual, expected,
                "Header '{name}' expected '{expected}', got '{actual}'"
            ),
            None => panic!("Header '{name}' not found"),
        }
        self
    }

    /// Asserts that the body equals the expected string.
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't match.
    pub fn assert_body(&self, expected: &str) -> &Self {
        assert_eq!(
            self.body.as_ref(),
            expected.as_bytes(),
            "Body mismatch: got {:?}",
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that the last two headers are `Date` then `Server`.
    ///
    /// # Panics
    ///
    /// Panics if the server headers are missing or misplaced.
    pub fn assert_server_headers_last(&self) -> &Self {
        let names = self.header_names();
        assert!(
            names.ends_with(&["Date", "Server"]),
            "Expected Date and Server as the last headers, got {names:?}"
        );
        self
    }
}
