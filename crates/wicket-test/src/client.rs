//! Raw TCP test client.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::TestError;
use crate::response::TestResponse;

/// Default read timeout, so a stuck server fails the test instead of hanging it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A client that writes raw request bytes and reads until the server closes.
///
/// # Example
///
/// ```ignore
/// use wicket_test::TestClient;
///
/// let client = TestClient::new(server.addr());
/// let response = client.get("/hello?name=world")?;
/// response.assert_status(200).assert_body("ok");
/// ```
#[derive(Debug, Clone)]
pub struct TestClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl TestClient {
    /// Creates a client for the server at `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the read and write timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the server address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Opens a connection without sending anything.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Connect` if the server is unreachable.
    pub fn connect(&self) -> Result<TcpStream, TestError> {
        let stream = TcpStream::connect(self.addr).map_err(TestError::Connect)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    /// Sends `GET <target> HTTP/1.1` with a `Host` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the response cannot be parsed.
    pub fn get(&self, target: &str) -> Result<TestResponse, TestError> {
        self.request("GET", target, "")
    }

    /// Sends a request with the given method, target and body.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the response cannot be parsed.
    pub fn request(&self, method: &str, target: &str, body: &str) -> Result<TestResponse, TestError> {
        let request = format!(
            "{method} {target} HTTP/1.1\r\nHost: {}\r\nContent-Length: {}\r\n\r\n{body}",
            self.addr,
            body.len()
        );
        self.send_raw(request.as_bytes())
    }

    /// Sends raw bytes and parses the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the response cannot be parsed.
    pub fn send_raw(&self, request: &[u8]) -> Result<TestResponse, TestError> {
        TestResponse::parse(&self.exchange(request)?)
    }

    /// Sends raw bytes and returns everything received until the server closes.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, writing or reading fails.
    pub fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TestError> {
        let mut stream = self.connect()?;
        stream.write_all(request)?;
        read_until_closed(&mut stream)
    }
}

/// Reads from `stream` until EOF.
///
/// # Errors
///
/// Returns `TestError::Io` if reading fails or times out.
pub fn read_until_closed(stream: &mut TcpStream) -> Result<Vec<u8>, TestError> {
    let mut received = Vec::new();
    stream.read_to_end(&mut received)?;
    Ok(received)
}
