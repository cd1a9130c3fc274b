//! Background scan queue
//!
//! Owns every analysis task:
//! - Bounded concurrency through a semaphore
//! - One active task per scan id
//! - A supervisor per task that observes panics and logs outcomes
//! - Queue statistics

use crate::error::{OrchestratorError, ScanFailure};
use a11y_store::ScanStore;
use a11y_types::{ProjectId, Scan, ScanId, ScanStatus, ScanUpdate};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks spawned
    pub started: usize,
    /// Tasks that ended with a completed scan
    pub completed: usize,
    /// Tasks that ended with a failed scan
    pub failed: usize,
    /// Tasks that panicked
    pub panicked: usize,
    /// Tasks currently reserved or running
    pub active: usize,
}

/// Exclusive claim on a scan id
///
/// Released when dropped.
#[derive(Debug)]
pub struct Reservation {
    scan_id: ScanId,
    active: Arc<DashMap<ScanId, ()>>,
}

impl Reservation {
    /// Reserved scan
    #[inline]
    #[must_use]
    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.active.remove(&self.scan_id);
    }
}

/// Exclusive claim on starting a rescan of a whole project
///
/// Released when dropped.
#[derive(Debug)]
pub struct ProjectClaim {
    project_id: ProjectId,
    claims: Arc<DashMap<ProjectId, ()>>,
}

impl ProjectClaim {
    /// Claimed project
    #[inline]
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }
}

impl Drop for ProjectClaim {
    fn drop(&mut self) {
        self.claims.remove(&self.project_id);
    }
}

/// Awaitable handle on a background scan
#[derive(Debug)]
pub struct ScanHandle {
    scan_id: ScanId,
    outcome: oneshot::Receiver<Result<Scan, OrchestratorError>>,
}

impl ScanHandle {
    /// Scan being processed
    #[inline]
    #[must_use]
    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    /// Wait for the terminal scan record
    ///
    /// # Errors
    /// Returns [`OrchestratorError::Task`] if the terminal status could not be
    /// written or the task vanished without reporting.
    pub async fn wait(self) -> Result<Scan, OrchestratorError> {
        self.outcome
            .await
            .unwrap_or_else(|_| Err(OrchestratorError::Task("scan task dropped".to_string())))
    }
}

/// Bounded executor for scan attempts
pub struct ScanQueue {
    permits: Arc<Semaphore>,
    active: Arc<DashMap<ScanId, ()>>,
    projects: Arc<DashMap<ProjectId, ()>>,
    stats: Arc<Mutex<QueueStats>>,
    supervisors: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    store: Arc<dyn ScanStore>,
}

impl std::fmt::Debug for ScanQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanQueue")
            .field("available_permits", &self.permits.available_permits())
            .field("active", &self.active.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ScanQueue {
    /// Create a queue running at most `max_concurrent` analyses
    #[must_use]
    pub fn new(store: Arc<dyn ScanStore>, max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: Arc::new(DashMap::new()),
            projects: Arc::new(DashMap::new()),
            stats: Arc::new(Mutex::new(QueueStats::default())),
            supervisors: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            store,
        }
    }

    /// Claim `scan_id` for a new task
    ///
    /// # Errors
    /// - `OrchestratorError::Conflict` if a task for the scan is active
    /// - `OrchestratorError::ShuttingDown` after [`close`](Self::close)
    pub fn reserve(&self, scan_id: ScanId) -> Result<Reservation, OrchestratorError> {
        if self.is_closed() {
            return Err(OrchestratorError::ShuttingDown);
        }
        match self.active.entry(scan_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(OrchestratorError::Conflict(
                format!("scan {scan_id} is already running"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Reservation {
                    scan_id,
                    active: Arc::clone(&self.active),
                })
            }
        }
    }

    /// Claim `project_id` while its urls are being rescanned
    ///
    /// # Errors
    /// - `OrchestratorError::Conflict` if the project is already claimed
    /// - `OrchestratorError::ShuttingDown` after [`close`](Self::close)
    pub fn reserve_project(&self, project_id: ProjectId) -> Result<ProjectClaim, OrchestratorError> {
        if self.is_closed() {
            return Err(OrchestratorError::ShuttingDown);
        }
        match self.projects.entry(project_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(OrchestratorError::Conflict(
                format!("project {project_id} is already being rescanned"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(ProjectClaim {
                    project_id,
                    claims: Arc::clone(&self.projects),
                })
            }
        }
    }

    /// Run `attempt` in the background once a permit is free
    ///
    /// The attempt is expected to leave the scan terminal itself; if it panics
    /// the supervisor marks the scan failed.
    pub fn spawn<F>(&self, reservation: Reservation, attempt: F) -> ScanHandle
    where
        F: Future<Output = Result<Scan, OrchestratorError>> + Send + 'static,
    {
        let scan_id = reservation.scan_id;
        let permits = Arc::clone(&self.permits);
        let task = tokio::spawn(async move {
            let _reservation = reservation;
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| OrchestratorError::ShuttingDown)?;
            attempt.await
        });

        self.stats.lock().started += 1;
        tracing::debug!(%scan_id, "scan task spawned");

        let (tx, rx) = oneshot::channel();
        let stats = Arc::clone(&self.stats);
        let store = Arc::clone(&self.store);
        let supervisor = tokio::spawn(async move {
            let outcome = supervise(scan_id, task, store.as_ref(), &stats).await;
            // receiver may have been dropped; the outcome is already logged
            let _ = tx.send(outcome);
        });

        let mut supervisors = self.supervisors.lock();
        supervisors.retain(|h| !h.is_finished());
        supervisors.push(supervisor);

        ScanHandle {
            scan_id,
            outcome: rx,
        }
    }

    /// Whether a task for `scan_id` is reserved or running
    #[inline]
    #[must_use]
    pub fn is_active(&self, scan_id: ScanId) -> bool {
        self.active.contains_key(&scan_id)
    }

    /// Reserved or running tasks
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let mut stats = *self.stats.lock();
        stats.active = self.active.len();
        stats
    }

    /// Whether [`close`](Self::close) was called
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting new tasks
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Wait up to `timeout` for every spawned task to finish
    ///
    /// Returns `true` if the queue drained in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.supervisors.lock());
        let pending = handles.len();
        let drained = tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_ok();
        if drained {
            tracing::info!(tasks = pending, "scan queue drained");
        } else {
            tracing::warn!(tasks = pending, ?timeout, "scan queue drain timed out");
        }
        drained
    }
}

async fn supervise(
    scan_id: ScanId,
    task: JoinHandle<Result<Scan, OrchestratorError>>,
    store: &dyn ScanStore,
    stats: &Mutex<QueueStats>,
) -> Result<Scan, OrchestratorError> {
    match task.await {
        Ok(Ok(scan)) => {
            let mut stats = stats.lock();
            if scan.status == ScanStatus::Completed {
                stats.completed += 1;
                tracing::info!(
                    %scan_id,
                    method = scan.analysis_method.as_deref().unwrap_or_default(),
                    total = scan.summary.map_or(0, |s| s.total),
                    "scan completed"
                );
            } else {
                stats.failed += 1;
                tracing::error!(
                    %scan_id,
                    error = scan.error.as_deref().unwrap_or_default(),
                    "scan failed"
                );
            }
            Ok(scan)
        }
        Ok(Err(e)) => {
            stats.lock().failed += 1;
            tracing::error!(%scan_id, error = %e, "scan task ended without a terminal status");
            Err(e)
        }
        Err(join) => {
            let message = if join.is_panic() {
                panic_message(join.into_panic())
            } else {
                "task cancelled".to_string()
            };
            stats.lock().panicked += 1;
            tracing::error!(%scan_id, panic = %message, "scan task panicked");

            let failure = ScanFailure::Panicked(message);
            store
                .transition_scan(
                    scan_id,
                    &[ScanStatus::InProgress],
                    ScanUpdate::failed(failure.to_string(), Utc::now()),
                )
                .await
                .map_err(|e| {
                    tracing::error!(%scan_id, error = %e, "could not mark panicked scan failed");
                    OrchestratorError::from(e)
                })
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => payload
            .downcast_ref::<&'static str>()
            .map_or_else(|| "unknown panic".to_string(), |s| (*s).to_string()),
    }
}
