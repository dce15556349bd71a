//! Reclamation of finished workers.
//!
//! [`WorkerTable`] holds the join handles of spawned workers. The sweep is
//! non-blocking: [`WorkerTable::try_reap`] only joins threads that have
//! already finished.
//!
//! The [`Reaper`] thread owns the table. It is woken by [`ReaperEvent`]s: the
//! manager announces every spawned worker, and every worker announces its own
//! exit from a drop guard, so the notice is sent even when the worker panics.
//! An exit notice joins that worker at once; the thread is already returning.
//! A notice that overtakes its worker's registration is kept until the
//! registration arrives. A periodic sweep is the safety net.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wicket_telemetry::metrics::record_worker_reaped;

use crate::error::{ServerError, ServerResult};
use crate::worker::{WorkerExit, WorkerId};

/// Outcome of one non-blocking reclamation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapStatus {
    /// A finished worker was joined.
    Reaped(WorkerId, WorkerExit),
    /// Workers exist but none has finished.
    StillRunning,
    /// The table is empty.
    NoChildren,
}

/// The set of outstanding workers.
///
/// Workers must be inserted in spawn order.
#[derive(Debug, Default)]
pub struct WorkerTable {
    workers: HashMap<WorkerId, JoinHandle<WorkerExit>>,
    early_exits: HashSet<WorkerId>,
    last_inserted: Option<WorkerId>,
}

impl WorkerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a spawned worker.
    ///
    /// A worker whose exit notice already arrived is joined immediately and
    /// its exit returned.
    pub fn insert(&mut self, id: WorkerId, handle: JoinHandle<WorkerExit>) -> Option<WorkerExit> {
        self.last_inserted = self.last_inserted.max(Some(id));
        if self.early_exits.remove(&id) {
            return Some(join_worker(handle));
        }
        self.workers.insert(id, handle);
        None
    }

    /// Joins the worker that announced its exit.
    ///
    /// The join only waits for a thread that is already returning. A notice
    /// for a worker not inserted yet is remembered for [`WorkerTable::insert`];
    /// a notice for a worker the sweep already reclaimed is ignored.
    pub fn reap_exited(&mut self, id: WorkerId) -> Option<WorkerExit> {
        if let Some(handle) = self.workers.remove(&id) {
            return Some(join_worker(handle));
        }
        if !matches!(self.last_inserted, Some(last) if id <= last) {
            self.early_exits.insert(id);
        }
        None
    }

    /// Number of outstanding workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` when no workers are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Joins one finished worker, if any, without blocking.
    pub fn try_reap(&mut self) -> ReapStatus {
        if self.workers.is_empty() {
            return ReapStatus::NoChildren;
        }

        let finished = self
            .workers
            .iter()
            .find_map(|(id, handle)| handle.is_finished().then_some(*id));

        match finished.and_then(|id| self.workers.remove(&id).map(|handle| (id, handle))) {
            Some((id, handle)) => ReapStatus::Reaped(id, join_worker(handle)),
            None => ReapStatus::StillRunning,
        }
    }

    /// Joins every finished worker, stopping at the first `StillRunning` or
    /// `NoChildren`.
    pub fn reap_all(&mut self) -> Vec<(WorkerId, WorkerExit)> {
        let mut reaped = Vec::new();
        while let ReapStatus::Reaped(id, exit) = self.try_reap() {
            reaped.push((id, exit));
        }
        reaped
    }

    /// Number of exit notices still waiting for their worker.
    #[must_use]
    pub fn pending_notices(&self) -> usize {
        self.early_exits.len()
    }

    /// Blocks until every outstanding worker has finished.
    pub fn join_all(&mut self) -> Vec<(WorkerId, WorkerExit)> {
        let mut ids: Vec<WorkerId> = self.workers.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.workers.remove(&id).map(|handle| (id, join_worker(handle))))
            .collect()
    }
}

fn join_worker(handle: JoinHandle<WorkerExit>) -> WorkerExit {
    handle
        .join()
        .unwrap_or_else(|payload| WorkerExit::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Tallies of reclaimed workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapSummary {
    /// Workers that served their connection.
    pub completed: usize,
    /// Workers whose connection failed.
    pub failed: usize,
    /// Workers that panicked.
    pub panicked: usize,
}

impl ReapSummary {
    /// Total number of reclaimed workers.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.failed + self.panicked
    }

    fn record(&mut self, id: WorkerId, exit: &WorkerExit) {
        record_worker_reaped(exit.outcome());
        match exit {
            WorkerExit::Completed => {
                self.completed += 1;
                tracing::trace!(worker_id = %id, "worker reaped");
            }
            WorkerExit::Failed(error) => {
                self.failed += 1;
                tracing::debug!(worker_id = %id, error = %error, "failed worker reaped");
            }
            WorkerExit::Panicked(message) => {
                self.panicked += 1;
                tracing::error!(worker_id = %id, panic = %message, "worker panicked");
            }
        }
    }
}

/// Notifications delivered to the reaper thread.
#[derive(Debug)]
pub enum ReaperEvent {
    /// A worker was spawned.
    Spawned(WorkerId, JoinHandle<WorkerExit>),
    /// A worker is about to exit.
    Exited(WorkerId),
}

/// Sends [`ReaperEvent::Exited`] when dropped.
///
/// Created at the top of each worker thread, so the notice is also sent when
/// the worker unwinds.
#[derive(Debug)]
pub struct ExitNotice {
    id: WorkerId,
    events: Sender<ReaperEvent>,
}

impl ExitNotice {
    /// Arms a notice for worker `id`.
    #[must_use]
    pub const fn new(id: WorkerId, events: Sender<ReaperEvent>) -> Self {
        Self { id, events }
    }
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        // The reaper is gone only during shutdown; nothing to notify then.
        let _ = self.events.send(ReaperEvent::Exited(self.id));
    }
}

/// Handle to the running reaper thread.
#[derive(Debug)]
pub struct Reaper {
    events: Sender<ReaperEvent>,
    thread: JoinHandle<ReapSummary>,
}

impl Reaper {
    /// Starts the reaper thread.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Spawn` if the thread cannot be started.
    pub fn spawn(sweep_interval: Duration) -> ServerResult<Self> {
        let (events, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("wicket-reaper".to_string())
            .spawn(move || reap_loop(&inbox, sweep_interval))
            .map_err(ServerError::Spawn)?;

        Ok(Self { events, thread })
    }

    /// Returns a sender for worker exit notices.
    #[must_use]
    pub fn notifier(&self) -> Sender<ReaperEvent> {
        self.events.clone()
    }

    /// Hands a spawned worker to the reaper.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Reaper` if the reaper thread has stopped.
    pub fn register(&self, id: WorkerId, handle: JoinHandle<WorkerExit>) -> ServerResult<()> {
        self.events
            .send(ReaperEvent::Spawned(id, handle))
            .map_err(|_| ServerError::Reaper("reaper thread is not running".to_string()))
    }

    /// Stops the reaper once every worker has been reclaimed.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Reaper` if the reaper thread panicked.
    pub fn shutdown(self) -> ServerResult<ReapSummary> {
        let Self { events, thread } = self;
        drop(events);
        thread
            .join()
            .map_err(|payload| ServerError::Reaper(panic_message(payload.as_ref())))
    }
}

#[cfg(test)]
impl Reaper {
    /// A reaper whose thread has already stopped.
    pub(crate) fn stopped() -> Self {
        let (events, inbox) = mpsc::channel();
        drop(inbox);
        let thread = thread::spawn(ReapSummary::default);
        Self { events, thread }
    }
}

/// Runs until every sender is gone: the manager's and each worker's notice.
fn reap_loop(inbox: &Receiver<ReaperEvent>, sweep_interval: Duration) -> ReapSummary {
    let mut table = WorkerTable::new();
    let mut summary = ReapSummary::default();

    loop {
        match inbox.recv_timeout(sweep_interval) {
            Ok(event) => handle_event(&mut table, &mut summary, event),
            Err(RecvTimeoutError::Timeout) => {
                for (id, exit) in table.reap_all() {
                    summary.record(id, &exit);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for (id, exit) in table.join_all() {
        summary.record(id, &exit);
    }

    tracing::debug!(reaped = summary.total(), "reaper stopped");
    summary
}

fn handle_event(table: &mut WorkerTable, summary: &mut ReapSummary, event: ReaperEvent) {
    let reaped = match event {
        ReaperEvent::Spawned(id, handle) => table.insert(id, handle).map(|exit| (id, exit)),
        ReaperEvent::Exited(id) => {
            tracing::trace!(worker_id = %id, "exit notice");
            table.reap_exited(id).map(|exit| (id, exit))
        }
    };
    if let Some((id, exit)) = reaped {
        summary.record(id, &exit);
    }
}
