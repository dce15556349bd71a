//! Server-level errors.
//!
//! Only listening-socket failures are fatal to the server. Per-connection
//! failures are [`wicket_core::WicketError`]s and stay inside the worker that
//! hit them.

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias using [`ServerError`].
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by the listener, the accept loop and the reaper.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured bind address cannot be resolved.
    #[error("invalid bind address '{addr}': {reason}")]
    InvalidAddress {
        /// The address as configured.
        addr: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Binding the listening socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The resolved address.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Accept failed with something other than an interrupt.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// A worker or reaper thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The reaper thread stopped unexpectedly.
    #[error("reaper failure: {0}")]
    Reaper(String),
}

impl ServerError {
    /// Creates an invalid address error.
    pub fn invalid_address(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error ends the accept loop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Spawn(_))
    }
}
