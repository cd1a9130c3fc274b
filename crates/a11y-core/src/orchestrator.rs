//! Scan orchestration
//!
//! Drives one scan attempt end-to-end:
//! 1. Move the scan into `in_progress` (create or reset)
//! 2. Run the analyzer chain under the scan deadline
//! 3. Store findings (fresh insert or reconciliation)
//! 4. Write a terminal status, whatever happened above

use crate::config::ScanConfig;
use crate::error::{OrchestratorError, ScanFailure};
use crate::queue::{QueueStats, ScanHandle, ScanQueue};
use crate::request::{NewScanRequest, RescanRequest, ScanRequest};
use crate::validation::validate_url;
use a11y_analysis::AnalyzerChain;
use a11y_reconcile::Reconciler;
use a11y_store::{ScanStore, StoreError};
use a11y_types::{
    ComplianceOptions, NewScan, ProjectId, Scan, ScanId, ScanStatus, ScanSummary, ScanUpdate,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// A scan moved into `in_progress` together with its background task
#[derive(Debug)]
pub struct StartedScan {
    /// Scan record as returned to the caller
    pub scan: Scan,
    /// Handle on the background attempt
    pub handle: ScanHandle,
}

/// How findings of an attempt are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    /// Bulk insert onto an empty scan
    Fresh,
    /// Diff against the stored findings
    Reconcile,
}

/// Everything a background attempt needs
#[derive(Clone)]
struct Attempt {
    store: Arc<dyn ScanStore>,
    chain: Arc<AnalyzerChain>,
    reconciler: Reconciler,
    config: ScanConfig,
}

/// Entry point for starting scans
#[derive(Clone)]
pub struct ScanOrchestrator {
    attempt: Attempt,
    queue: Arc<ScanQueue>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("chain", &self.attempt.chain)
            .field("config", &self.attempt.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl ScanOrchestrator {
    /// Create an orchestrator over `store` and `chain`
    #[must_use]
    pub fn new(store: Arc<dyn ScanStore>, chain: AnalyzerChain, config: ScanConfig) -> Self {
        let queue = Arc::new(ScanQueue::new(
            Arc::clone(&store),
            config.max_concurrent_scans,
        ));
        Self {
            attempt: Attempt {
                reconciler: Reconciler::new(Arc::clone(&store)),
                store,
                chain: Arc::new(chain),
                config,
            },
            queue,
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.attempt.config
    }

    /// Strategy names in preference order
    #[must_use]
    pub fn strategies(&self) -> Vec<&'static str> {
        self.attempt.chain.names()
    }

    /// Queue statistics
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Start a scan and return as soon as it is `in_progress`
    ///
    /// # Errors
    /// - `OrchestratorError::Validation` for a malformed url
    /// - `OrchestratorError::NotFound` for an unknown project or scan
    /// - `OrchestratorError::Conflict` if the scan is already running
    /// - `OrchestratorError::ShuttingDown` once shutdown began
    pub async fn start_scan(&self, request: ScanRequest) -> Result<StartedScan, OrchestratorError> {
        if self.queue.is_closed() {
            return Err(OrchestratorError::ShuttingDown);
        }
        match request {
            ScanRequest::New(request) => self.start_new(request).await,
            ScanRequest::Rescan(request) => self.start_rescan(request).await,
        }
    }

    async fn start_new(&self, request: NewScanRequest) -> Result<StartedScan, OrchestratorError> {
        let url = validate_url(&request.url)?;
        let project = self.attempt.store.get_project(request.project_id).await?;
        let options = request
            .options
            .unwrap_or_else(|| project.effective_compliance());

        let pending = self
            .attempt
            .store
            .create_scan(NewScan::new(project.id, url.clone()))
            .await?;
        let reservation = match self.queue.reserve(pending.id) {
            Ok(reservation) => reservation,
            Err(e) => {
                self.attempt.abandon(pending.id, &e).await;
                return Err(e);
            }
        };

        let scan = match self
            .attempt
            .store
            .transition_scan(
                pending.id,
                &[ScanStatus::Pending],
                ScanUpdate::started(Utc::now()),
            )
            .await
        {
            Ok(scan) => scan,
            Err(e) => {
                self.attempt.abandon(pending.id, &e).await;
                return Err(e.into());
            }
        };

        tracing::info!(scan_id = %scan.id, project_id = %project.id, url = %scan.url, "scan started");
        let attempt = self.attempt.clone();
        let handle = self.queue.spawn(
            reservation,
            attempt.run(scan.id, url, options, Persist::Fresh),
        );
        Ok(StartedScan { scan, handle })
    }

    async fn start_rescan(&self, request: RescanRequest) -> Result<StartedScan, OrchestratorError> {
        let url = validate_url(&request.url)?;
        let existing = self.attempt.store.get_scan(request.scan_id).await?;
        if existing.project_id != request.project_id {
            return Err(OrchestratorError::NotFound {
                entity: "scan",
                id: format!("{} in project {}", request.scan_id, request.project_id),
            });
        }
        let options = match request.options {
            Some(options) => options,
            None => self
                .attempt
                .store
                .get_project(existing.project_id)
                .await?
                .effective_compliance(),
        };

        let reservation = self.queue.reserve(existing.id)?;
        let scan = self
            .attempt
            .store
            .transition_scan(
                existing.id,
                &[ScanStatus::Pending, ScanStatus::Completed, ScanStatus::Failed],
                ScanUpdate::rescan(url.clone(), Utc::now()),
            )
            .await?;

        tracing::info!(scan_id = %scan.id, url = %scan.url, "rescan started");
        let attempt = self.attempt.clone();
        let handle = self.queue.spawn(
            reservation,
            attempt.run(scan.id, url, options, Persist::Reconcile),
        );
        Ok(StartedScan { scan, handle })
    }

    /// Rescan every url of a project
    ///
    /// Each url reuses its most recent scan, or gets a new one if it was never
    /// scanned. Project rescans are serialized per project. If starting one
    /// url fails, scans already started keep running and the error is
    /// returned.
    ///
    /// # Errors
    /// - `OrchestratorError::NotFound` for an unknown project
    /// - `OrchestratorError::Conflict` if any scan of the project is pending or
    ///   in progress, or another rescan of the project is being started
    pub async fn rescan_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<StartedScan>, OrchestratorError> {
        let _claim = self.queue.reserve_project(project_id)?;
        let project = self.attempt.store.get_project(project_id).await?;
        let scans = self.attempt.store.list_scans_for_project(project_id).await?;

        if let Some(busy) = scans
            .iter()
            .find(|s| s.status.is_active() || self.queue.is_active(s.id))
        {
            return Err(OrchestratorError::Conflict(format!(
                "project {project_id} has a scan in progress ({})",
                busy.id
            )));
        }

        let urls = self.attempt.store.list_urls(project_id).await?;
        let options = project.effective_compliance();
        let mut started = Vec::with_capacity(urls.len());

        for tracked in urls {
            let latest = scans
                .iter()
                .filter(|s| s.url == tracked.url)
                .max_by_key(|s| s.created_at);
            let request = match latest {
                Some(scan) => ScanRequest::rescan(project_id, scan.id, tracked.url),
                None => ScanRequest::new_scan(project_id, tracked.url),
            }
            .with_options(options);
            match self.start_scan(request).await {
                Ok(scan) => started.push(scan),
                Err(e) => {
                    tracing::warn!(
                        %project_id,
                        started = started.len(),
                        error = %e,
                        "project rescan stopped early"
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!(%project_id, scans = started.len(), "project rescan started");
        Ok(started)
    }

    /// Stop accepting scans and wait up to `timeout` for running ones
    ///
    /// Returns `true` if every task finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.queue.close();
        self.queue.drain(timeout).await
    }
}

impl Attempt {
    /// Background body of one scan attempt
    async fn run(
        self,
        scan_id: ScanId,
        url: String,
        options: ComplianceOptions,
        persist: Persist,
    ) -> Result<Scan, OrchestratorError> {
        let deadline = self.config.scan_timeout();
        let work = self.analyze_and_store(scan_id, &url, &options, persist);
        let outcome = match tokio::time::timeout(deadline, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanFailure::Deadline {
                secs: self.config.scan_timeout_secs,
            }),
        };

        match outcome {
            Ok((method, summary)) => {
                let completed = ScanUpdate::completed(summary, method, Utc::now());
                match self.finalize(scan_id, &[ScanStatus::InProgress], completed).await {
                    Ok(scan) => Ok(scan),
                    Err(e) => {
                        let message = format!("failed to record completion: {e}");
                        self.finalize(
                            scan_id,
                            &[ScanStatus::InProgress],
                            ScanUpdate::failed(message, Utc::now()),
                        )
                        .await
                        .map_err(OrchestratorError::from)
                    }
                }
            }
            Err(failure) => {
                tracing::debug!(%scan_id, error = %failure, "scan attempt failed");
                self.finalize(
                    scan_id,
                    &[ScanStatus::InProgress],
                    ScanUpdate::failed(failure.to_string(), Utc::now()),
                )
                .await
                .map_err(OrchestratorError::from)
            }
        }
    }

    async fn analyze_and_store(
        &self,
        scan_id: ScanId,
        url: &str,
        options: &ComplianceOptions,
        persist: Persist,
    ) -> Result<(&'static str, ScanSummary), ScanFailure> {
        let success = self.chain.analyze(url, options).await?;
        let summary = success.outcome.summary;
        let results = success.outcome.results;

        match persist {
            Persist::Fresh => {
                let inserted = self.reconciler.insert_fresh(scan_id, results).await?;
                tracing::debug!(%scan_id, inserted, "fresh scan findings stored");
            }
            Persist::Reconcile => {
                let report = self.reconciler.reconcile(scan_id, results).await?;
                tracing::debug!(
                    %scan_id,
                    added = report.added,
                    removed = report.removed,
                    updated = report.updated,
                    "rescan findings reconciled"
                );
            }
        }
        Ok((success.method, summary))
    }

    /// Close out a scan that was created but never started
    async fn abandon(&self, scan_id: ScanId, cause: &(dyn std::fmt::Display + Sync)) {
        let update = ScanUpdate::failed(format!("scan could not be started: {cause}"), Utc::now());
        let _ = self.finalize(scan_id, &[ScanStatus::Pending], update).await;
    }

    /// Write a terminal update, retrying transient store failures
    async fn finalize(
        &self,
        scan_id: ScanId,
        expected: &[ScanStatus],
        update: ScanUpdate,
    ) -> Result<Scan, StoreError> {
        let attempts = self.config.finalize_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self
                .store
                .transition_scan(scan_id, expected, update.clone())
                .await
            {
                Ok(scan) => return Ok(scan),
                Err(e) if e.is_conflict() || e.is_not_found() || attempt >= attempts => {
                    tracing::error!(%scan_id, error = %e, attempt, "could not write terminal scan status");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(%scan_id, error = %e, attempt, "terminal status write failed, retrying");
                    tokio::time::sleep(self.config.finalize_backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
