//! The listening endpoint and the interrupt-safe accept call.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

use wicket_core::ServerIdentity;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Something connections can be accepted from.
///
/// Implemented for [`TcpListener`]; tests script their own acceptors.
pub trait Accept {
    /// The accepted connection type.
    type Stream;

    /// Blocks until a connection arrives.
    fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)>;
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self)
    }
}

/// Accepts one connection, restarting the call when it is interrupted.
///
/// An interrupted accept never surfaces and never loses the pending
/// connection: the call is simply issued again.
///
/// # Errors
///
/// Any other failure is returned as `ServerError::Accept`.
pub fn accept_retrying<A: Accept>(acceptor: &A) -> ServerResult<(A::Stream, SocketAddr)> {
    loop {
        match acceptor.accept() {
            Ok(accepted) => return Ok(accepted),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                tracing::debug!("accept interrupted, retrying");
                wicket_telemetry::metrics::record_accept_retry();
            }
            Err(e) => return Err(ServerError::Accept(e)),
        }
    }
}

/// A bound, listening IPv4 socket.
///
/// Created once; never mutated after bind. `SO_REUSEADDR` is set by the
/// standard library on Unix platforms.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    identity: ServerIdentity,
}

impl Listener {
    /// Binds the address from `config` and resolves the server identity.
    ///
    /// With port 0 the OS picks a port; the chosen port is reported by
    /// [`Listener::local_addr`] and used as `SERVER_PORT`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::InvalidAddress` or `ServerError::Bind`.
    pub fn bind(config: &ServerConfig) -> ServerResult<Self> {
        let addr = config.socket_addr()?;
        let inner = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        let identity = ServerIdentity::new(config.resolve_server_name(), local_addr.port());

        tracing::info!(
            addr = %local_addr,
            server_name = identity.name(),
            "listening"
        );

        Ok(Self {
            inner,
            local_addr,
            identity,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the resolved `(name, port)` identity.
    #[must_use]
    pub const fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Accepts the next connection, retrying interrupted calls.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Accept` on any non-interrupt failure.
    pub fn accept(&self) -> ServerResult<(TcpStream, SocketAddr)> {
        accept_retrying(&self.inner)
    }
}
