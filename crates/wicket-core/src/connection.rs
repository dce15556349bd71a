//! Connection ownership.
//!
//! A [`ConnectionGuard`] owns an accepted connection and closes it exactly
//! once: explicitly through [`ConnectionGuard::close`], or on drop along every
//! other path (early return, error, panic unwind).

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::ops::{Deref, DerefMut};

/// A bidirectional byte stream that can be closed.
pub trait Connection: Read + Write {
    /// Address of the remote peer, if known.
    fn peer_addr(&self) -> Option<SocketAddr>;

    /// Closes both directions of the connection.
    fn close(&mut self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }

    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            // The peer may already have gone away.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Exclusive owner of one accepted connection.
#[derive(Debug)]
pub struct ConnectionGuard<C: Connection> {
    inner: C,
    closed: bool,
}

impl<C: Connection> ConnectionGuard<C> {
    /// Takes ownership of a connection.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    /// Closes the connection now and reports the outcome.
    pub fn close(mut self) -> io::Result<()> {
        self.close_once()
    }

    /// Returns `true` once the connection has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn close_once(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.close()
    }
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C: Connection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.close_once() {
            tracing::debug!(error = %e, "error closing connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        closes: Arc<AtomicUsize>,
    }

    impl Read for Counting {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for Counting {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connection for Counting {
        fn peer_addr(&self) -> Option<SocketAddr> {
            None
        }

        fn close(&mut self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting() -> (Counting, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Counting {
                closes: Arc::clone(&closes),
            },
            closes,
        )
    }

    #[test]
    fn test_drop_closes_once() {
        let (conn, closes) = counting();
        drop(ConnectionGuard::new(conn));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_close_is_not_repeated_on_drop() {
        let (conn, closes) = counting();
        ConnectionGuard::new(conn).close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_on_unwind() {
        let (conn, closes) = counting();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ConnectionGuard::new(conn);
            panic!("application blew up");
        }));
        assert!(result.is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
