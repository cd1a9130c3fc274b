//! Transactional apply of reconciliation plans

use crate::error::ReconcileError;
use crate::plan::{plan, ReconcilePlan};
use a11y_store::{ResultTransaction, ScanStore, StoreError};
use a11y_types::{Finding, NewFinding, ScanId};
use chrono::Utc;
use std::sync::Arc;

/// Counts of applied changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    /// Findings inserted
    pub added: usize,
    /// Findings deleted
    pub removed: usize,
    /// Findings patched in place
    pub updated: usize,
    /// Matched findings left untouched
    pub unchanged: usize,
    /// Incoming duplicates dropped
    pub duplicates_collapsed: usize,
}

impl ReconcileReport {
    fn from_plan(plan: &ReconcilePlan) -> Self {
        Self {
            added: plan.to_add.len(),
            removed: plan.to_remove.len(),
            updated: plan.to_update.len(),
            unchanged: plan.unchanged,
            duplicates_collapsed: plan.duplicates_collapsed,
        }
    }

    /// Whether nothing was written
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// Writes scan findings through the store's transactions
///
/// Every method either commits all of its writes or none of them.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ScanStore>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn ScanStore>) -> Self {
        Self { store }
    }

    /// Merge `incoming` into the persisted findings of a rescanned scan
    ///
    /// # Errors
    /// Returns [`ReconcileError`] if any store operation fails; nothing is
    /// committed in that case.
    pub async fn reconcile(
        &self,
        scan_id: ScanId,
        incoming: Vec<NewFinding>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut tx = self.store.begin(scan_id).await.map_err(ReconcileError::Begin)?;

        let existing = match tx.list_results().await {
            Ok(existing) => existing,
            Err(e) => return Err(abort(tx, ReconcileError::Load(e)).await),
        };

        let now = Utc::now();
        let plan = plan(&existing, incoming, now);
        let report = ReconcileReport::from_plan(&plan);

        tracing::debug!(
            %scan_id,
            existing = existing.len(),
            add = report.added,
            remove = report.removed,
            update = report.updated,
            unchanged = report.unchanged,
            "reconciliation planned"
        );

        if plan.is_empty() {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(%scan_id, error = %e, "rollback of empty reconciliation failed");
            }
            return Ok(report);
        }

        if let Err(e) = apply(tx.as_mut(), scan_id, plan, now).await {
            return Err(abort(tx, e).await);
        }
        tx.commit().await.map_err(ReconcileError::Commit)?;

        tracing::info!(
            %scan_id,
            added = report.added,
            removed = report.removed,
            updated = report.updated,
            "findings reconciled"
        );
        Ok(report)
    }

    /// Insert the findings of a fresh scan
    ///
    /// Refuses to write onto a scan that already holds findings.
    ///
    /// # Errors
    /// Returns [`ReconcileError::NotEmpty`] for a non-empty scan and other
    /// variants for store failures; nothing is committed in either case.
    pub async fn insert_fresh(
        &self,
        scan_id: ScanId,
        results: Vec<NewFinding>,
    ) -> Result<usize, ReconcileError> {
        let mut tx = self.store.begin(scan_id).await.map_err(ReconcileError::Begin)?;

        let existing = match tx.list_results().await {
            Ok(existing) => existing.len(),
            Err(e) => return Err(abort(tx, ReconcileError::Load(e)).await),
        };
        if existing > 0 {
            return Err(abort(tx, ReconcileError::NotEmpty { scan_id, existing }).await);
        }

        let now = Utc::now();
        let rows: Vec<Finding> = results
            .into_iter()
            .map(|new| Finding::from_new(scan_id, new, now))
            .collect();
        let count = rows.len();

        if let Err(e) = tx.bulk_insert_results(rows).await {
            return Err(abort(tx, stage("insert", e)).await);
        }
        tx.commit().await.map_err(ReconcileError::Commit)?;

        tracing::debug!(%scan_id, inserted = count, "fresh findings stored");
        Ok(count)
    }
}

async fn apply(
    tx: &mut dyn ResultTransaction,
    scan_id: ScanId,
    plan: ReconcilePlan,
    now: chrono::DateTime<Utc>,
) -> Result<(), ReconcileError> {
    if !plan.to_remove.is_empty() {
        tx.bulk_delete_results(&plan.to_remove)
            .await
            .map_err(|e| stage("delete", e))?;
    }
    if !plan.to_add.is_empty() {
        let rows = plan
            .to_add
            .into_iter()
            .map(|new| Finding::from_new(scan_id, new, now))
            .collect();
        tx.bulk_insert_results(rows)
            .await
            .map_err(|e| stage("insert", e))?;
    }
    if !plan.to_update.is_empty() {
        tx.bulk_update_results(&plan.to_update)
            .await
            .map_err(|e| stage("update", e))?;
    }
    Ok(())
}

fn stage(stage: &'static str, source: StoreError) -> ReconcileError {
    ReconcileError::Apply { stage, source }
}

/// Roll back and hand back the original error
async fn abort(tx: Box<dyn ResultTransaction>, error: ReconcileError) -> ReconcileError {
    let scan_id = tx.scan_id();
    if let Err(e) = tx.rollback().await {
        tracing::warn!(%scan_id, error = %e, "rollback failed");
    }
    error
}
