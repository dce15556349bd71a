//! Error types for Wicket.
//!
//! [`WicketError`] covers every failure that can happen while a single
//! connection is being served. None of these errors is fatal to the server:
//! the worker that hit one logs it, closes its connection and exits.

use http::StatusCode;
use thiserror::Error;

/// Result type alias using [`WicketError`].
pub type WicketResult<T> = Result<T, WicketError>;

/// Per-connection error.
///
/// # Example
///
/// ```
/// use wicket_core::{parse_request_line, WicketError};
///
/// let err = parse_request_line("GET /").unwrap_err();
/// assert!(matches!(err, WicketError::MalformedRequestLine { .. }));
/// assert_eq!(err.status_code().as_u16(), 400);
/// ```
#[derive(Error, Debug)]
pub enum WicketError {
    /// The request line is missing or does not split into exactly three tokens.
    #[error("malformed request line: {line:?}")]
    MalformedRequestLine {
        /// The offending line (empty when no line was received at all).
        line: String,
    },

    /// Bytes that must be text are not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// The response was finished before `start_response` recorded a status.
    #[error("response finished before start_response was called")]
    ResponseNotStarted,

    /// The application failed, either when called or while its body was consumed.
    #[error("application error: {0}")]
    Application(#[source] anyhow::Error),

    /// I/O failure on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WicketError {
    /// Creates a malformed request line error.
    #[must_use]
    pub fn malformed(line: impl Into<String>) -> Self {
        Self::MalformedRequestLine { line: line.into() }
    }

    /// Returns the HTTP status a worker reports for this error, if it can still respond.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequestLine { .. } | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::ResponseNotStarted | Self::Application(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable name, used as a metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRequestLine { .. } => "malformed_request_line",
            Self::Decode(_) => "decode",
            Self::ResponseNotStarted => "response_not_started",
            Self::Application(_) => "application",
            Self::Io(_) => "io",
        }
    }
}

/// Formats a status code as a status line fragment, e.g. `"400 Bad Request"`.
#[must_use]
pub fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
