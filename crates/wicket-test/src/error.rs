//! Test error types.

use std::fmt;
use std::io;

/// Errors that can occur during testing.
#[derive(Debug)]
pub enum TestError {
    /// Connecting to the server failed
    Connect(io::Error),
    /// Sending the request or reading the response failed
    Io(io::Error),
    /// The bytes received are not an HTTP/1.1 response
    MalformedResponse(String),
    /// The server under test failed
    Server(String),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "Connect error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::MalformedResponse(msg) => write!(f, "Malformed response: {msg}"),
            Self::Server(msg) => write!(f, "Server error: {msg}"),
        }
    }
}

impl std::error::Error for TestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) | Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TestError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
