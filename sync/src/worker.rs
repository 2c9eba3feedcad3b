//! Background sync loop with cooperative cancellation

use std::time::Duration;
use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::events::{EventQueue, LogEvent};
use crate::mirror::MirrorEngine;
use crate::target::SyncTarget;

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
}

/// Runtime state of one running loop
#[derive(Debug)]
pub struct SyncSession {
    id: Uuid,
    target: SyncTarget,
    interval: Duration,
    started_at: DateTime<Local>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SyncSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}

/// Owns at most one background loop that reconciles a target every interval and reports
/// each tick to an [`EventQueue`].
#[derive(Debug)]
pub struct SyncWorker {
    engine: MirrorEngine,
    events: EventQueue,
    state: WorkerState,
    session: Option<SyncSession>,
}

impl SyncWorker {
    pub fn new(engine: MirrorEngine, events: EventQueue) -> Self {
        Self {
            engine,
            events,
            state: WorkerState::Idle,
            session: None,
        }
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// Fails with [`SyncError::AlreadyRunning`] if a session exists and with
    /// [`SyncError::WorkerStart`] when called outside a runtime; in both cases the worker
    /// state is unchanged.
    pub(crate) fn start(&mut self, target: SyncTarget, interval: Duration) -> Result<Uuid> {
        if self.session.is_some() {
            return Err(SyncError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::WorkerStart(e.to_string()))?;

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let span = info_span!("sync_session", session_id = %id);

        let handle = runtime.spawn(
            run_loop(
                self.engine.clone(),
                target.clone(),
                interval,
                cancel.clone(),
                self.events.clone(),
            )
            .instrument(span),
        );

        info!(session_id = %id, "Started sync worker for {}", target);

        self.session = Some(SyncSession {
            id,
            target,
            interval,
            started_at: Local::now(),
            cancel,
            handle,
        });
        self.state = WorkerState::Running;

        Ok(id)
    }

    /// Signal the loop to stop and wait until it has exited. An in-flight reconcile runs to
    /// completion first. Returns `false` when there was nothing to stop.
    pub async fn stop(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            self.state = WorkerState::Idle;
            return false;
        };

        self.state = WorkerState::Stopping;
        debug!(session_id = %session.id, "Stopping sync worker");
        session.cancel.cancel();

        if let Err(e) = session.handle.await {
            error!(session_id = %session.id, "Sync loop ended abnormally: {}", e);
            self.events.push(LogEvent::error(format!("Sync loop ended abnormally: {}", e)));
        }

        self.state = WorkerState::Idle;
        info!(session_id = %session.id, "Sync worker stopped");
        true
    }

    /// Remove and return all queued events, oldest first.
    pub fn drain_events(&self) -> Vec<LogEvent> {
        self.events.drain()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == WorkerState::Running
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.session.as_ref()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        // Can't join here; cancelling lets the loop exit after its current tick.
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }
}

async fn run_loop(
    engine: MirrorEngine,
    target: SyncTarget,
    interval: Duration,
    cancel: CancellationToken,
    events: EventQueue,
) {
    events.push(LogEvent::info(format!("Sync started: {}", target)));

    while !cancel.is_cancelled() {
        let outcome = engine.reconcile(target.source(), target.destination()).await;

        if let Err(e) = &outcome {
            warn!("Reconcile failed, retrying in {:?}: {}", interval, e);
        }
        events.push(LogEvent::from_outcome(&outcome));

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    events.push(LogEvent::info("Sync stopped"));
    debug!("Sync loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    async fn fixture() -> (TempDir, SyncTarget) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&source).await.unwrap();
        fs::create_dir_all(&dest).await.unwrap();
        fs::write(source.join("save.dat"), b"maxed").await.unwrap();
        (temp_dir, SyncTarget::new(source, dest))
    }

    #[tokio::test]
    async fn test_start_runs_first_tick_and_stop_joins() {
        let (_temp_dir, target) = fixture().await;
        let mut worker = SyncWorker::new(MirrorEngine::default(), EventQueue::new());
        assert_eq!(worker.state(), WorkerState::Idle);

        worker.start(target.clone(), Duration::from_millis(20)).unwrap();
        assert!(worker.is_running());
        assert_eq!(worker.session().unwrap().target(), &target);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(worker.stop().await);
        assert_eq!(worker.state(), WorkerState::Idle);
        assert!(worker.session().is_none());

        assert_eq!(fs::read(target.destination().join("save.dat")).await.unwrap(), b"maxed");

        let events = worker.drain_events();
        assert!(events.first().unwrap().message.starts_with("Sync started"));
        assert_eq!(events.last().unwrap().message, "Sync stopped");
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (_temp_dir, target) = fixture().await;
        let mut worker = SyncWorker::new(MirrorEngine::default(), EventQueue::new());

        let first = worker.start(target.clone(), Duration::from_millis(50)).unwrap();
        let err = worker.start(target, Duration::from_millis(50)).unwrap_err();

        assert!(matches!(err, SyncError::AlreadyRunning));
        assert_eq!(worker.session().unwrap().id(), first);
        worker.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_session_is_a_no_op() {
        let mut worker = SyncWorker::new(MirrorEngine::default(), EventQueue::new());
        assert!(!worker.stop().await);
        assert!(!worker.stop().await);
        assert!(worker.drain_events().is_empty());
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let temp_dir = TempDir::new().unwrap();
        let target = SyncTarget::new(temp_dir.path().join("a"), temp_dir.path().join("b"));
        let mut worker = SyncWorker::new(MirrorEngine::default(), EventQueue::new());

        let err = worker.start(target, Duration::from_secs(1)).unwrap_err();

        assert!(matches!(err, SyncError::WorkerStart(_)));
        assert_eq!(worker.state(), WorkerState::Idle);
        assert!(worker.session().is_none());
    }

    #[tokio::test]
    async fn test_stop_does_not_wait_for_full_interval() {
        let (_temp_dir, target) = fixture().await;
        let mut worker = SyncWorker::new(MirrorEngine::default(), EventQueue::new());

        worker.start(target, Duration::from_secs(3600)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(10), worker.stop()).await;
        assert_eq!(stopped, Ok(true));
    }

    #[tokio::test]
    async fn test_failures_are_reported_and_loop_keeps_running() {
        let temp_dir = TempDir::new().unwrap();
        let target = SyncTarget::new(temp_dir.path().join("missing"), temp_dir.path().join("dest"));
        let mut worker = SyncWorker::new(MirrorEngine::default(), EventQueue::new());

        worker.start(target, Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(worker.is_running());
        worker.stop().await;

        let errors = worker
            .drain_events()
            .into_iter()
            .filter(|e| e.level == crate::events::LogLevel::Error)
            .count();
        assert!(errors >= 2, "expected repeated failures, got {}", errors);
    }
}
