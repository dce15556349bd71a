//! In-memory connections.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, Bytes};
use wicket_core::Connection;

#[derive(Debug, Default)]
struct ProbeState {
    written: Vec<u8>,
    closes: usize,
    read_calls: usize,
}

/// Observes a [`MockConnection`] after it has been moved into a worker.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl MockProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        // A panicking worker is an expected test subject.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes written to the connection so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Written bytes as text, lossily decoded.
    #[must_use]
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// Number of times `close` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Number of `read` calls, interrupted ones included.
    #[must_use]
    pub fn read_calls(&self) -> usize {
        self.lock().read_calls
    }
}

/// A scripted [`Connection`] backed by memory.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use wicket_core::{Connection, ConnectionGuard};
/// use wicket_test::MockConnection;
///
/// let conn = MockConnection::new("GET / HTTP/1.1\r\n\r\n");
/// let probe = conn.probe();
///
/// let mut guard = ConnectionGuard::new(conn);
/// guard.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").unwrap();
/// drop(guard);
///
/// assert_eq!(probe.close_count(), 1);
/// assert!(probe.written_text().starts_with("HTTP/1.1 204"));
/// ```
#[derive(Debug)]
pub struct MockConnection {
    input: Bytes,
    peer: Option<SocketAddr>,
    interrupts: usize,
    fail_writes: bool,
    probe: MockProbe,
}

impl MockConnection {
    /// Creates a connection whose peer sends `input`.
    pub fn new(input: impl Into<Bytes>) -> Self {
        Self {
            input: input.into(),
            peer: None,
            interrupts: 0,
            fail_writes: false,
            probe: MockProbe::default(),
        }
    }

    /// Sets the peer address.
    #[must_use]
    pub const fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Makes the first `count` reads fail with `Interrupted`.
    #[must_use]
    pub const fn interrupt_reads(mut self, count: usize) -> Self {
        self.interrupts = count;
        self
    }

    /// Makes every write fail with `BrokenPipe`.
    #[must_use]
    pub const fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Returns a probe sharing this connection's recorded state.
    #[must_use]
    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }
}

impl Read for MockConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.probe.lock().read_calls += 1;
        if self.interrupts > 0 {
            self.interrupts -= 1;
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }

        let n = buf.len().min(self.input.len());
        buf[..n].copy_from_slice(&self.input[..n]);
        self.input.advance(n);
        Ok(n)
    }
}

impl Write for MockConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        self.probe.lock().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connection for MockConnection {
    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn close(&mut self) -> io::Result<()> {
        self.probe.lock().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_bounded_by_buffer() {
        let mut conn = MockConnection::new("abcdef");
        let mut buf = [0_u8; 4];

        assert_eq!(conn.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(conn.read(&mut buf).unwrap(), 2);
        assert_eq!(conn.read(&mut buf).unwrap(), 0);
        assert_eq!(conn.probe().read_calls(), 3);
    }

    #[test]
    fn test_interrupts_come_first() {
        let mut conn = MockConnection::new("x").interrupt_reads(1);
        let mut buf = [0_u8; 4];

        let err = conn.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(conn.read(&mut buf).unwrap(), 1);
    }

    #[test]
    fn test_probe_sees_writes_and_closes() {
        let mut conn = MockConnection::new("");
        let probe = conn.probe();

        conn.write_all(b"hi").unwrap();
        conn.close().unwrap();

        assert_eq!(probe.written(), b"hi");
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_failing_writes() {
        let mut conn = MockConnection::new("").fail_writes();
        assert_eq!(
            conn.write(b"x").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
        assert!(conn.probe().written().is_empty());
    }
}
