//! Persistence gateway contracts

use crate::error::StoreError;
use a11y_types::{
    Finding, FindingId, NewProject, NewScan, Project, ProjectId, ProjectUrl, ResultPatch, Scan,
    ScanId, ScanStatus, ScanUpdate,
};
use async_trait::async_trait;

/// Durable store for projects, urls, scans and findings
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Create a project together with its urls
    ///
    /// Fails with [`StoreError::DuplicateUrl`] if any url is already tracked.
    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError>;

    /// Fetch a project
    async fn get_project(&self, id: ProjectId) -> Result<Project, StoreError>;

    /// All projects, newest first
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Track more urls under a project
    async fn add_urls(
        &self,
        project_id: ProjectId,
        urls: &[String],
    ) -> Result<Vec<ProjectUrl>, StoreError>;

    /// Urls of a project in insertion order
    async fn list_urls(&self, project_id: ProjectId) -> Result<Vec<ProjectUrl>, StoreError>;

    /// Create a pending scan
    async fn create_scan(&self, scan: NewScan) -> Result<Scan, StoreError>;

    /// Fetch a scan
    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError>;

    /// Apply an unconditional update
    ///
    /// Administrative write with no status check. Scan execution moves
    /// scans only through [`ScanStore::transition_scan`].
    async fn update_scan(&self, id: ScanId, update: ScanUpdate) -> Result<Scan, StoreError>;

    /// Apply `update` only if the scan's status is one of `expected`
    ///
    /// A status change in `update` must also be an allowed transition.
    /// Fails with [`StoreError::StatusConflict`] otherwise.
    async fn transition_scan(
        &self,
        id: ScanId,
        expected: &[ScanStatus],
        update: ScanUpdate,
    ) -> Result<Scan, StoreError>;

    /// Scans of a project, oldest first
    async fn list_scans_for_project(&self, project_id: ProjectId) -> Result<Vec<Scan>, StoreError>;

    /// Committed findings of a scan
    async fn list_results_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>, StoreError>;

    /// Open a transaction over one scan's findings
    async fn begin(&self, scan_id: ScanId) -> Result<Box<dyn ResultTransaction>, StoreError>;
}

/// Atomic unit of finding writes for one scan
///
/// Nothing is visible to readers until [`commit`](Self::commit) succeeds.
/// Dropping without committing discards every staged write.
#[async_trait]
pub trait ResultTransaction: Send {
    /// Scan this transaction writes to
    fn scan_id(&self) -> ScanId;

    /// Findings as seen inside the transaction
    async fn list_results(&mut self) -> Result<Vec<Finding>, StoreError>;

    /// Stage inserts; every finding must belong to [`scan_id`](Self::scan_id)
    async fn bulk_insert_results(&mut self, results: Vec<Finding>) -> Result<u64, StoreError>;

    /// Stage deletes
    async fn bulk_delete_results(&mut self, ids: &[FindingId]) -> Result<u64, StoreError>;

    /// Stage in-place patches
    async fn bulk_update_results(&mut self, patches: &[ResultPatch]) -> Result<u64, StoreError>;

    /// Make staged writes visible, all or nothing
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard staged writes
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
