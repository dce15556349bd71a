//! The accept loop.
//!
//! ```text
//! Listening -> Accepting -> Spawning -> Listening -> Accepting -> ...
//!                  |
//!                  +-> Failed   (any accept error other than an interrupt)
//! ```
//!
//! Each accepted connection is moved into a fresh `wicket-worker-<id>`
//! thread; the manager keeps no reference to it. Join handles go to the
//! [`Reaper`], which reclaims finished workers without ever blocking the
//! accept loop.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wicket_core::{Application, ServerIdentity};
use wicket_telemetry::metrics::{record_connection_accepted, record_worker_spawned};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::listener::Listener;
use crate::reaper::{ExitNotice, ReapSummary, Reaper};
use crate::worker::{ConnectionWorker, WorkerId, WorkerShared};

/// Where the accept loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Bound and idle between connections.
    Listening,
    /// Blocked in accept.
    Accepting,
    /// Handing a connection to a new worker.
    Spawning,
    /// Stopped after a fatal accept error.
    Failed,
}

/// Result of [`ConcurrencyManager::serve_connections`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeReport {
    /// Connections accepted.
    pub accepted: usize,
    /// Connections dropped because no worker thread could be started.
    pub spawn_failures: usize,
    /// Workers reclaimed, by outcome.
    pub reaped: ReapSummary,
}

/// Accepts connections and runs one isolated worker per connection.
#[derive(Debug)]
pub struct ConcurrencyManager {
    listener: Listener,
    shared: Arc<WorkerShared>,
    reap_interval: Duration,
    next_id: u64,
    state: ManagerState,
}

impl ConcurrencyManager {
    /// Binds the listening socket for `application`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::InvalidAddress` or `ServerError::Bind`.
    pub fn new<A: Application>(config: &ServerConfig, application: A) -> ServerResult<Self> {
        let listener = Listener::bind(config)?;
        let shared = Arc::new(WorkerShared::new(
            application,
            listener.identity().clone(),
            config,
        ));

        Ok(Self {
            listener,
            shared,
            reap_interval: config.reap_interval(),
            next_id: 0,
            state: ManagerState::Listening,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Returns the identity reported to applications.
    #[must_use]
    pub fn identity(&self) -> &ServerIdentity {
        self.shared.identity()
    }

    /// Returns the current state of the accept loop.
    #[must_use]
    pub const fn state(&self) -> ManagerState {
        self.state
    }

    /// Serves connections until accept fails fatally.
    ///
    /// # Errors
    ///
    /// Returns the fatal `ServerError`; this method never returns `Ok`.
    pub fn serve_forever(&mut self) -> ServerResult<()> {
        let reaper = Reaper::spawn(self.reap_interval)?;
        tracing::info!(addr = %self.local_addr(), "serving");

        loop {
            if let Err(e) = self.accept_and_spawn(&reaper) {
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }
    }

    /// Serves exactly `count` connections, then waits for their workers to
    /// be reclaimed.
    ///
    /// # Errors
    ///
    /// Returns the first fatal `ServerError`.
    pub fn serve_connections(&mut self, count: usize) -> ServerResult<ServeReport> {
        let reaper = Reaper::spawn(self.reap_interval)?;
        let mut spawn_failures = 0;

        for _ in 0..count {
            match self.accept_and_spawn(&reaper) {
                Ok(()) => {}
                Err(ServerError::Spawn(_)) => spawn_failures += 1,
                Err(e) => return Err(e),
            }
        }

        let reaped = reaper.shutdown()?;
        Ok(ServeReport {
            accepted: count,
            spawn_failures,
            reaped,
        })
    }

    fn accept_and_spawn(&mut self, reaper: &Reaper) -> ServerResult<()> {
        self.state = ManagerState::Accepting;
        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                self.state = ManagerState::Failed;
                tracing::error!(error = %e, "accept failed, stopping");
                return Err(e);
            }
        };
        record_connection_accepted();
        tracing::debug!(%peer, "connection accepted");

        self.state = ManagerState::Spawning;
        let result = self.spawn_worker(stream, reaper);
        self.state = ManagerState::Listening;

        if let Err(e) = &result {
            tracing::error!(%peer, error = %e, "could not start worker, connection closed");
        }
        result
    }

    fn spawn_worker(&mut self, stream: TcpStream, reaper: &Reaper) -> ServerResult<()> {
        let id = WorkerId::new(self.next_id);
        self.next_id += 1;

        let worker = ConnectionWorker::new(id, Arc::clone(&self.shared));
        let notice = ExitNotice::new(id, reaper.notifier());

        // On failure the closure is dropped, which closes the stream.
        let handle = thread::Builder::new()
            .name(format!("wicket-worker-{id}"))
            .spawn(move || {
                let _notice = notice;
                worker.run(stream)
            })
            .map_err(ServerError::Spawn)?;

        reaper.register(id, handle)?;
        record_worker_spawned();
        Ok(())
    }
}

/// Binds `addr` with default settings and returns a ready manager.
///
/// # Example
///
/// ```rust,no_run
/// use wicket_core::{Body, RequestContext, ResponseAssembler};
///
/// fn app(_ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
///     response.start_response("200 OK", [("Content-Type", "text/plain")]);
///     Ok(Body::from("Hello, world!\n"))
/// }
///
/// let mut server = wicket_server::make_server(":8888", app)?;
/// server.serve_forever()?;
/// # Ok::<(), wicket_server::ServerError>(())
/// ```
///
/// # Errors
///
/// Returns `ServerError::InvalidAddress` or `ServerError::Bind`.
pub fn make_server<A: Application>(addr: &str, application: A) -> ServerResult<ConcurrencyManager> {
    let config = ServerConfig::builder().http_addr(addr).build();
    ConcurrencyManager::new(&config, application)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::sync::Mutex;

    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use wicket_core::{Body, RequestContext, ResponseAssembler};
    use wicket_telemetry::metrics::names;

    /// Captures changes to the active-workers gauge.
    #[derive(Default)]
    struct ActiveWorkers(Arc<ActiveGauge>);

    #[derive(Default)]
    struct ActiveGauge(Mutex<Vec<f64>>);

    impl GaugeFn for ActiveGauge {
        fn increment(&self, value: f64) {
            self.0.lock().unwrap().push(value);
        }

        fn decrement(&self, value: f64) {
            self.0.lock().unwrap().push(-value);
        }

        fn set(&self, _value: f64) {}
    }

    impl ActiveWorkers {
        fn changes(&self) -> Vec<f64> {
            self.0 .0.lock().unwrap().clone()
        }
    }

    impl Recorder for ActiveWorkers {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            if key.name() == names::WORKERS_ACTIVE {
                Gauge::from_arc(Arc::clone(&self.0))
            } else {
                Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    fn app(ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
        response.start_response("200 OK", Vec::<(String, String)>::new());
        Ok(Body::from(ctx.path().to_string()))
    }

    fn local() -> ServerConfig {
        ServerConfig::builder()
            .http_addr("127.0.0.1:0")
            .reap_interval(Duration::from_millis(20))
            .build()
    }

    fn request(addr: SocketAddr, line: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(line.as_bytes()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_new_manager_is_listening() {
        let manager = ConcurrencyManager::new(&local(), app).unwrap();
        assert_eq!(manager.state(), ManagerState::Listening);
        assert_eq!(manager.identity().port(), manager.local_addr().port());
    }

    #[test]
    fn test_make_server_binds() {
        let manager = make_server("127.0.0.1:0", app).unwrap();
        assert!(manager.local_addr().ip().is_loopback());
    }

    #[test]
    fn test_make_server_rejects_bad_address() {
        assert!(matches!(
            make_server("nowhere", app),
            Err(ServerError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_serve_connections_reaps_every_worker() {
        let mut manager = ConcurrencyManager::new(&local(), app).unwrap();
        let addr = manager.local_addr();

        let clients = thread::spawn(move || {
            (0..3)
                .map(|i| request(addr, &format!("GET /{i} HTTP/1.1\r\n\r\n")))
                .collect::<Vec<_>>()
        });

        let report = manager.serve_connections(3).unwrap();
        let responses = clients.join().unwrap();

        assert_eq!(report.accepted, 3);
        assert_eq!(report.spawn_failures, 0);
        assert_eq!(report.reaped.completed, 3);
        assert_eq!(report.reaped.total(), 3);
        assert_eq!(manager.state(), ManagerState::Listening);
        assert!(responses[2].ends_with("\r\n\r\n/2"));
    }

    /// An accepted server-side stream whose client has already hung up.
    fn hung_up_stream(manager: &ConcurrencyManager) -> TcpStream {
        let client = TcpStream::connect(manager.local_addr()).unwrap();
        let (stream, _) = manager.listener.accept().unwrap();
        drop(client);
        stream
    }

    #[test]
    fn test_registered_worker_is_counted_active() {
        let mut manager = ConcurrencyManager::new(&local(), app).unwrap();
        let stream = hung_up_stream(&manager);
        let reaper = Reaper::spawn(Duration::from_millis(20)).unwrap();
        let recorder = ActiveWorkers::default();

        let result = metrics::with_local_recorder(&recorder, || manager.spawn_worker(stream, &reaper));

        assert!(result.is_ok());
        assert_eq!(recorder.changes(), vec![1.0]);
        assert_eq!(reaper.shutdown().unwrap().total(), 1);
    }

    #[test]
    fn test_unregistered_worker_is_not_counted_active() {
        let mut manager = ConcurrencyManager::new(&local(), app).unwrap();
        let stream = hung_up_stream(&manager);
        let reaper = Reaper::stopped();
        let recorder = ActiveWorkers::default();

        let result = metrics::with_local_recorder(&recorder, || manager.spawn_worker(stream, &reaper));

        assert!(matches!(result, Err(ServerError::Reaper(_))));
        assert!(recorder.changes().is_empty());
    }
}
