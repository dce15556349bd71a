//! Two-phase response assembly.
//!
//! The application first declares status and headers through
//! [`ResponseAssembler::start_response`], then returns a [`Body`]. The worker
//! hands both to [`ResponseAssembler::finish`], which serializes the whole
//! response, sends it in one write and closes the connection.
//!
//! Wire format:
//!
//! ```text
//! HTTP/1.1 <status>\r\n
//! <name>: <value>\r\n      (caller headers, then Date, then Server)
//! \r\n
//! <body chunks, in order>
//! ```
//!
//! No `Content-Length` or transfer encoding is added.

use std::io::Write;
use std::time::SystemTime;

use crate::body::Body;
use crate::connection::{Connection, ConnectionGuard};
use crate::error::{WicketError, WicketResult};

/// Tracing target of the `<`/`>` request and response line events.
pub const WIRE_TARGET: &str = "wicket::wire";

/// Status and headers recorded by `start_response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseState {
    status: String,
    headers: Vec<(String, String)>,
}

impl ResponseState {
    /// Status line fragment, e.g. `"200 OK"`.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Headers in send order, server-added headers last.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Collects the response declared by an application and writes it out.
///
/// One assembler serves one request. Applications only ever see it through
/// `&mut`, so they can declare headers but cannot finish the response.
///
/// # Example
///
/// ```
/// use wicket_core::{Body, ResponseAssembler};
///
/// let mut response = ResponseAssembler::new("Wicket");
/// response.start_response("200 OK", [("Content-Type", "text/plain")]);
///
/// let bytes = response.serialize(Body::from("hi")).unwrap();
/// let text = String::from_utf8(bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nDate: "));
/// assert!(text.ends_with("\r\nServer: Wicket\r\n\r\nhi"));
/// ```
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    server_software: String,
    clock: fn() -> SystemTime,
    state: Option<ResponseState>,
}

impl ResponseAssembler {
    /// Creates an assembler that identifies the server as `server_software`.
    pub fn new(server_software: impl Into<String>) -> Self {
        Self {
            server_software: server_software.into(),
            clock: SystemTime::now,
            state: None,
        }
    }

    /// Replaces the clock used for the `Date` header.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    /// Records status and headers, appending `Date` and `Server`.
    ///
    /// Caller headers keep their order and are never deduplicated. A second
    /// call before the response is finished replaces the first.
    pub fn start_response<I, K, V>(&mut self, status: impl Into<String>, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut headers: Vec<(String, String)> = headers
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        headers.push(("Date".to_string(), httpdate::fmt_http_date((self.clock)())));
        headers.push(("Server".to_string(), self.server_software.clone()));

        let state = ResponseState {
            status: status.into(),
            headers,
        };
        if let Some(previous) = self.state.replace(state) {
            tracing::warn!(
                previous = %previous.status,
                "start_response called again; replacing recorded status and headers"
            );
        }
    }

    /// Returns the recorded state, if `start_response` has been called.
    #[must_use]
    pub fn state(&self) -> Option<&ResponseState> {
        self.state.as_ref()
    }

    /// Returns `true` once `start_response` has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.is_some()
    }

    /// Serializes status line, headers and body into response bytes.
    ///
    /// Every chunk must be valid UTF-8. The body is consumed in order.
    pub fn serialize(&self, body: Body) -> WicketResult<Vec<u8>> {
        let state = self.state.as_ref().ok_or(WicketError::ResponseNotStarted)?;

        let mut response = format!("HTTP/1.1 {}\r\n", state.status);
        for (name, value) in &state.headers {
            response.push_str(name);
            response.push_str(": ");
            response.push_str(value);
            response.push_str("\r\n");
        }
        response.push_str("\r\n");

        for chunk in body {
            let chunk = chunk.map_err(WicketError::Application)?;
            response.push_str(std::str::from_utf8(&chunk)?);
        }

        Ok(response.into_bytes())
    }

    /// Serializes the response, sends it with a single write and closes the connection.
    ///
    /// The connection is closed on every path, including failures.
    /// Returns the number of bytes sent.
    pub fn finish<C: Connection>(
        self,
        body: Body,
        mut connection: ConnectionGuard<C>,
    ) -> WicketResult<usize> {
        let bytes = self.serialize(body)?;

        for line in String::from_utf8_lossy(&bytes).lines() {
            tracing::debug!(target: WIRE_TARGET, "> {line}");
        }

        connection.write_all(&bytes)?;
        connection.flush()?;
        connection.close()?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::{self, Read};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        written: Vec<u8>,
        closes: usize,
    }

    struct Recording {
        probe: Arc<Mutex<Probe>>,
        fail_writes: bool,
    }

    impl Read for Recording {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for Recording {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
            }
            self.probe.lock().unwrap().written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connection for Recording {
        fn peer_addr(&self) -> Option<SocketAddr> {
            None
        }

        fn close(&mut self) -> io::Result<()> {
            self.probe.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    fn connection(fail_writes: bool) -> (ConnectionGuard<Recording>, Arc<Mutex<Probe>>) {
        let probe = Arc::new(Mutex::new(Probe::default()));
        let conn = Recording {
            probe: Arc::clone(&probe),
            fail_writes,
        };
        (ConnectionGuard::new(conn), probe)
    }

    fn fixed_clock() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777)
    }

    fn assembler() -> ResponseAssembler {
        ResponseAssembler::new("Wicket/test").with_clock(fixed_clock)
    }

    #[test]
    fn test_server_headers_appended_after_caller_headers() {
        let mut response = assembler();
        response.start_response(
            "200 OK",
            [("X-B", "2"), ("X-A", "1"), ("X-B", "3")],
        );

        let names: Vec<&str> = response
            .state()
            .unwrap()
            .headers()
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, ["X-B", "X-A", "X-B", "Date", "Server"]);
    }

    #[test]
    fn test_date_and_server_values() {
        let mut response = assembler();
        response.start_response("204 No Content", Vec::<(String, String)>::new());

        let headers = response.state().unwrap().headers();
        assert_eq!(headers[0], ("Date".into(), "Sun, 06 Nov 1994 08:49:37 GMT".into()));
        assert_eq!(headers[1], ("Server".into(), "Wicket/test".into()));
    }

    #[test]
    fn test_serialize_hello() {
        let mut response = assembler();
        response.start_response("200 OK", Vec::<(String, String)>::new());

        let body = Body::from(vec![Bytes::from_static(b"He"), Bytes::from_static(b"llo")]);
        let text = String::from_utf8(response.serialize(body).unwrap()).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        let (_, body) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(body, "Hello");
        assert_eq!(
            text,
            "HTTP/1.1 200 OK\r\nDate: Sun, 06 Nov 1994 08:49:37 GMT\r\nServer: Wicket/test\r\n\r\nHello"
        );
    }

    #[test]
    fn test_no_content_length_injected() {
        let mut response = assembler();
        response.start_response("200 OK", [("Content-Type", "text/plain")]);
        let text = String::from_utf8(response.serialize(Body::from("abc")).unwrap()).unwrap();
        assert!(!text.to_ascii_lowercase().contains("content-length"));
    }

    #[test]
    fn test_second_start_response_overwrites() {
        let mut response = assembler();
        response.start_response("200 OK", [("X-First", "1")]);
        response.start_response("404 Not Found", [("X-Second", "2")]);

        let state = response.state().unwrap();
        assert_eq!(state.status(), "404 Not Found");
        assert_eq!(state.headers()[0].0, "X-Second");
        assert_eq!(state.headers().len(), 3);
    }

    #[test]
    fn test_finish_writes_and_closes() {
        let mut response = assembler();
        response.start_response("200 OK", Vec::<(String, String)>::new());
        let (conn, probe) = connection(false);

        let sent = response.finish(Body::from("ok"), conn).unwrap();

        let probe = probe.lock().unwrap();
        assert_eq!(sent, probe.written.len());
        assert!(probe.written.ends_with(b"\r\n\r\nok"));
        assert_eq!(probe.closes, 1);
    }

    #[test]
    fn test_finish_without_start_response_closes_connection() {
        let (conn, probe) = connection(false);

        let err = assembler().finish(Body::from("ok"), conn).unwrap_err();

        assert!(matches!(err, WicketError::ResponseNotStarted));
        let probe = probe.lock().unwrap();
        assert!(probe.written.is_empty());
        assert_eq!(probe.closes, 1);
    }

    #[test]
    fn test_finish_closes_on_send_failure() {
        let mut response = assembler();
        response.start_response("200 OK", Vec::<(String, String)>::new());
        let (conn, probe) = connection(true);

        let err = response.finish(Body::from("ok"), conn).unwrap_err();

        assert!(matches!(err, WicketError::Io(_)));
        assert_eq!(probe.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_finish_rejects_non_utf8_chunk_and_closes() {
        let mut response = assembler();
        response.start_response("200 OK", Vec::<(String, String)>::new());
        let (conn, probe) = connection(false);

        let err = response
            .finish(Body::from(vec![0xc3_u8, 0x28]), conn)
            .unwrap_err();

        assert!(matches!(err, WicketError::Decode(_)));
        let probe = probe.lock().unwrap();
        assert!(probe.written.is_empty());
        assert_eq!(probe.closes, 1);
    }

    #[test]
    fn test_finish_propagates_lazy_body_failure() {
        let mut response = assembler();
        response.start_response("200 OK", Vec::<(String, String)>::new());
        let (conn, probe) = connection(false);
        let body = Body::try_from_chunks(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(anyhow::anyhow!("stream broke")),
        ]);

        let err = response.finish(body, conn).unwrap_err();

        assert!(matches!(err, WicketError::Application(_)));
        assert!(probe.lock().unwrap().written.is_empty());
    }
}
