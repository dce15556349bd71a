//! Background test servers.

use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wicket_core::Application;
use wicket_server::{ConcurrencyManager, ServeReport, ServerConfig, ServerResult};

use crate::client::TestClient;
use crate::error::TestError;

/// A real server on `127.0.0.1` that serves a fixed number of connections
/// on a background thread.
///
/// # Example
///
/// ```ignore
/// let server = TestServer::start(app, 1)?;
/// let response = server.client().get("/")?;
/// let report = server.finish()?;
/// assert_eq!(report.reaped.total(), 1);
/// ```
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<ServerResult<ServeReport>>,
}

impl TestServer {
    /// Starts a server on an ephemeral loopback port.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Server` if the server cannot bind or start.
    pub fn start<A: Application>(application: A, connections: usize) -> Result<Self, TestError> {
        let config = ServerConfig::builder()
            .http_addr("127.0.0.1:0")
            .server_name("wicket.test")
            .reap_interval(Duration::from_millis(20))
            .build();
        Self::start_with(&config, application, connections)
    }

    /// Starts a server with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Server` if the server cannot bind or start.
    pub fn start_with<A: Application>(
        config: &ServerConfig,
        application: A,
        connections: usize,
    ) -> Result<Self, TestError> {
        let mut manager = ConcurrencyManager::new(config, application)
            .map_err(|e| TestError::Server(e.to_string()))?;
        let addr = manager.local_addr();

        let handle = thread::Builder::new()
            .name("wicket-test-server".to_string())
            .spawn(move || manager.serve_connections(connections))
            .map_err(|e| TestError::Server(e.to_string()))?;

        Ok(Self { addr, handle })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns a client for this server.
    #[must_use]
    pub const fn client(&self) -> TestClient {
        TestClient::new(self.addr)
    }

    /// Waits until every connection was served and every worker reclaimed.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Server` if the accept loop failed or panicked.
    pub fn finish(self) -> Result<ServeReport, TestError> {
        self.handle
            .join()
            .map_err(|_| TestError::Server("server thread panicked".to_string()))?
            .map_err(|e| TestError::Server(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_core::{Body, RequestContext, ResponseAssembler};

    fn echo_path(ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
        response.start_response("200 OK", [("Content-Type", "text/plain")]);
        Ok(Body::from(ctx.path().to_string()))
    }

    #[test]
    fn test_start_serve_finish() {
        let server = TestServer::start(echo_path, 1).unwrap();

        let response = server.client().get("/ping").unwrap();
        let report = server.finish().unwrap();

        response.assert_status(200).assert_body("/ping");
        assert_eq!(report.accepted, 1);
        assert_eq!(report.reaped.completed, 1);
    }

    #[test]
    fn test_start_with_bad_address() {
        let config = ServerConfig::builder().http_addr("bogus").build();
        assert!(matches!(
            TestServer::start_with(&config, echo_path, 1),
            Err(TestError::Server(_))
        ));
    }
}
