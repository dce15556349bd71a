//! Per-connection workers.
//!
//! A [`ConnectionWorker`] owns exactly one accepted connection from read to
//! close: one read, parse, build the context, call the application, finish
//! the response. The connection is wrapped in a [`ConnectionGuard`] first, so
//! it is closed exactly once on every path, including panics.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use wicket_core::{
    parse_request_line, status_text, Application, Body, Connection, ConnectionGuard,
    ContextBuilder, RequestLine, ResponseAssembler, ServerIdentity, WicketError, WicketResult,
    WIRE_TARGET,
};
use wicket_telemetry::metrics::{record_request_error, record_response};

use crate::config::ServerConfig;

/// Identifies one spawned worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Creates a worker id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a worker ended, as collected by the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The response was sent and the connection closed.
    Completed,
    /// The connection failed; the message is the error.
    Failed(String),
    /// The worker thread panicked; the message is the panic payload.
    Panicked(String),
}

impl WorkerExit {
    /// Short label used for metrics.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

/// Immutable state shared by every worker of one server.
pub struct WorkerShared {
    application: Box<dyn Application>,
    contexts: ContextBuilder,
    server_software: String,
    read_buffer_size: usize,
}

impl WorkerShared {
    /// Bundles the application with the server identity and settings.
    pub fn new<A: Application>(application: A, identity: ServerIdentity, config: &ServerConfig) -> Self {
        Self {
            application: Box::new(application),
            contexts: ContextBuilder::new(identity),
            server_software: config.server_software().to_string(),
            read_buffer_size: config.read_buffer_size(),
        }
    }

    /// Returns the server identity reported to applications.
    #[must_use]
    pub fn identity(&self) -> &ServerIdentity {
        self.contexts.identity()
    }
}

impl fmt::Debug for WorkerShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerShared")
            .field("identity", self.contexts.identity())
            .field("server_software", &self.server_software)
            .field("read_buffer_size", &self.read_buffer_size)
            .finish_non_exhaustive()
    }
}

/// Serves a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionWorker {
    id: WorkerId,
    shared: Arc<WorkerShared>,
}

impl ConnectionWorker {
    /// Creates a worker.
    #[must_use]
    pub const fn new(id: WorkerId, shared: Arc<WorkerShared>) -> Self {
        Self { id, shared }
    }

    /// Returns the worker id.
    #[must_use]
    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// Serves `connection` and reports the outcome.
    ///
    /// Errors are logged and counted here; they never leave the worker.
    pub fn run<C: Connection>(&self, connection: C) -> WorkerExit {
        let peer = connection.peer_addr();
        let _span = tracing::info_span!(
            "worker",
            worker_id = %self.id,
            peer = peer.map(|p| p.to_string()).as_deref().unwrap_or("-"),
        )
        .entered();

        match self.serve(connection) {
            Ok(bytes) => {
                tracing::debug!(bytes, "connection served");
                WorkerExit::Completed
            }
            Err(e) => {
                record_request_error(e.kind());
                if e.status_code().is_client_error() {
                    tracing::warn!(error = %e, "bad request");
                } else {
                    tracing::error!(error = %e, "connection failed");
                }
                WorkerExit::Failed(e.to_string())
            }
        }
    }

    /// Reads one request, calls the application and sends the response.
    ///
    /// Parse and decode failures are answered with `400 Bad Request`, an
    /// application error with `500 Internal Server Error`. Failures while
    /// finishing the response write nothing more. The connection is closed
    /// in every case. Returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// Returns the `WicketError` that ended the exchange.
    pub fn serve<C: Connection>(&self, connection: C) -> WicketResult<usize> {
        let mut connection = ConnectionGuard::new(connection);
        let peer = connection.peer_addr();

        let raw = self.read_request(&mut connection)?;
        let (line, input) = match split_request(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.reject(&e, connection);
                return Err(e);
            }
        };

        let context = self.shared.contexts.build(&line, input, peer);
        tracing::debug!(method = context.method(), path = context.path(), "request parsed");

        let mut response = ResponseAssembler::new(self.shared.server_software.as_str());
        let body = match self.shared.application.call(&context, &mut response) {
            Ok(body) => body,
            Err(e) => {
                let e = WicketError::Application(e);
                self.reject(&e, connection);
                return Err(e);
            }
        };

        let status = response.state().map(|state| state.status().to_string());
        let sent = response.finish(body, connection)?;

        if let Some(status) = status {
            record_response(&status);
            tracing::info!(
                method = context.method(),
                path = context.path(),
                status = %status,
                bytes = sent,
                "request completed"
            );
        }
        Ok(sent)
    }

    /// A single read of at most `read_buffer_size` bytes.
    fn read_request<C: Connection>(&self, connection: &mut ConnectionGuard<C>) -> io::Result<Bytes> {
        let mut buf = vec![0_u8; self.shared.read_buffer_size];
        let n = loop {
            match connection.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        };
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    /// Sends a short plain-text error response, then closes.
    fn reject<C: Connection>(&self, error: &WicketError, connection: ConnectionGuard<C>) {
        let status = status_text(error.status_code());
        let body = format!("{status}\n");

        let mut response = ResponseAssembler::new(self.shared.server_software.as_str());
        response.start_response(
            status.as_str(),
            [
                ("Content-Type".to_string(), "text/plain; charset=utf-8".to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
        );

        match response.finish(Body::from(body), connection) {
            Ok(_) => record_response(&status),
            Err(e) => tracing::debug!(error = %e, "could not send error response"),
        }
    }
}

/// Decodes the raw read, traces it, and splits off the request line and body.
fn split_request(raw: &Bytes) -> WicketResult<(RequestLine, Bytes)> {
    let text = std::str::from_utf8(raw)?;
    for line in text.lines() {
        tracing::debug!(target: WIRE_TARGET, "< {line}");
    }

    let line = parse_request_line(text)?;
    let input = text
        .find("\r\n\r\n")
        .map_or_else(Bytes::new, |end| raw.slice(end + 4..));
    Ok((line, input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_core::RequestContext;
    use wicket_test::{MockConnection, TestResponse};

    fn worker<A: Application>(app: A) -> ConnectionWorker {
        worker_with(app, ServerConfig::builder().server_software("Wicket/test").build())
    }

    fn worker_with<A: Application>(app: A, config: ServerConfig) -> ConnectionWorker {
        let identity = ServerIdentity::new("wicket.test", 8888);
        ConnectionWorker::new(WorkerId::new(1), Arc::new(WorkerShared::new(app, identity, &config)))
    }

    fn ok_app(_ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
        response.start_response("200 OK", Vec::<(String, String)>::new());
        Ok(Body::from(vec![Bytes::from_static(b"ok")]))
    }

    #[test]
    fn test_hello_scenario() {
        let conn = MockConnection::new("GET /hello?name=world HTTP/1.1\r\n\r\n");
        let probe = conn.probe();

        let exit = worker(ok_app).run(conn);

        assert_eq!(exit, WorkerExit::Completed);
        let written = probe.written_text();
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.ends_with("\r\n\r\nok"));
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_context_reaches_application() {
        let app = |ctx: &RequestContext, response: &mut ResponseAssembler| -> anyhow::Result<Body> {
            response.start_response("200 OK", [("Content-Type", "text/plain")]);
            Ok(Body::from(format!(
                "{} {} {} {}:{} {}",
                ctx.method(),
                ctx.path(),
                ctx.query_string(),
                ctx.server_name(),
                ctx.server_port(),
                ctx.remote_addr().unwrap_or("-"),
            )))
        };
        let conn = MockConnection::new("GET /hello?name=world HTTP/1.1\r\n\r\n")
            .with_peer("192.0.2.10:51000".parse().unwrap());
        let probe = conn.probe();

        worker(app).run(conn);

        let response = TestResponse::parse(&probe.written()).unwrap();
        assert_eq!(
            response.text().unwrap(),
            "GET /hello name=world wicket.test:8888 192.0.2.10"
        );
    }

    #[test]
    fn test_request_body_is_input() {
        let app = |ctx: &RequestContext, response: &mut ResponseAssembler| -> anyhow::Result<Body> {
            let mut input = String::new();
            ctx.input().read_to_string(&mut input)?;
            response.start_response("200 OK", Vec::<(String, String)>::new());
            Ok(Body::from(input))
        };
        let conn = MockConnection::new("POST /submit HTTP/1.1\r\nHost: x\r\n\r\nname=wicket");
        let probe = conn.probe();

        worker(app).run(conn);

        assert!(probe.written_text().ends_with("\r\n\r\nname=wicket"));
    }

    #[test]
    fn test_single_read_truncates() {
        let app = |ctx: &RequestContext, response: &mut ResponseAssembler| -> anyhow::Result<Body> {
            response.start_response("200 OK", Vec::<(String, String)>::new());
            Ok(Body::from(format!("{}|{}", ctx.path(), ctx.raw_input().len())))
        };
        let config = ServerConfig::builder().read_buffer_size(24).build();
        let conn = MockConnection::new("GET /a HTTP/1.1\r\nHost: example.com\r\n\r\nbody");
        let probe = conn.probe();

        let exit = worker_with(app, config).run(conn);

        assert_eq!(exit, WorkerExit::Completed);
        assert!(probe.written_text().ends_with("\r\n\r\n/a|0"));
        assert_eq!(probe.read_calls(), 1);
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let conn = MockConnection::new("GET / HTTP/1.1\r\n\r\n").interrupt_reads(2);
        let probe = conn.probe();

        let exit = worker(ok_app).run(conn);

        assert_eq!(exit, WorkerExit::Completed);
        assert_eq!(probe.read_calls(), 3);
    }

    #[test]
    fn test_malformed_request_gets_400() {
        let conn = MockConnection::new("GET /\r\n\r\n");
        let probe = conn.probe();

        let exit = worker(ok_app).run(conn);

        assert!(matches!(exit, WorkerExit::Failed(ref msg) if msg.contains("malformed")));
        let response = TestResponse::parse(&probe.written()).unwrap();
        assert_eq!(response.status_code(), 400);
        assert_eq!(response.content_length(), Some(response.body().len() as u64));
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_empty_read_gets_400() {
        let conn = MockConnection::new("");
        let probe = conn.probe();

        let exit = worker(ok_app).run(conn);

        assert_eq!(exit.outcome(), "failed");
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_invalid_utf8_gets_400() {
        let conn = MockConnection::new(vec![0xff_u8, 0xfe, b' ', b'/', b'\r', b'\n']);
        let probe = conn.probe();

        let err = worker(ok_app).serve(conn).unwrap_err();

        assert!(matches!(err, WicketError::Decode(_)));
        let response = TestResponse::parse(&probe.written()).unwrap();
        assert_eq!(response.status_code(), 400);
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_application_error_gets_500() {
        let app = |_ctx: &RequestContext, _response: &mut ResponseAssembler| -> anyhow::Result<Body> {
            anyhow::bail!("database unavailable")
        };
        let conn = MockConnection::new("GET / HTTP/1.1\r\n\r\n");
        let probe = conn.probe();

        let err = worker(app).serve(conn).unwrap_err();

        assert!(matches!(err, WicketError::Application(_)));
        let response = TestResponse::parse(&probe.written()).unwrap();
        assert_eq!(response.status_code(), 500);
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_missing_start_response_writes_nothing() {
        let app = |_ctx: &RequestContext, _response: &mut ResponseAssembler| -> anyhow::Result<Body> {
            Ok(Body::from("orphan"))
        };
        let conn = MockConnection::new("GET / HTTP/1.1\r\n\r\n");
        let probe = conn.probe();

        let err = worker(app).serve(conn).unwrap_err();

        assert!(matches!(err, WicketError::ResponseNotStarted));
        assert!(probe.written().is_empty());
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_send_failure_is_reported() {
        let conn = MockConnection::new("GET / HTTP/1.1\r\n\r\n").fail_writes();
        let probe = conn.probe();

        let err = worker(ok_app).serve(conn).unwrap_err();

        assert!(matches!(err, WicketError::Io(_)));
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_panic_still_closes_connection() {
        let app = |_ctx: &RequestContext, _response: &mut ResponseAssembler| -> anyhow::Result<Body> {
            panic!("application bug")
        };
        let conn = MockConnection::new("GET / HTTP/1.1\r\n\r\n");
        let probe = conn.probe();
        let worker = worker(app);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| worker.run(conn)));

        assert!(result.is_err());
        assert!(probe.written().is_empty());
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_worker_exit_outcomes() {
        assert_eq!(WorkerExit::Completed.outcome(), "completed");
        assert_eq!(WorkerExit::Failed("x".into()).outcome(), "failed");
        assert_eq!(WorkerExit::Panicked("x".into()).outcome(), "panicked");
    }
}
