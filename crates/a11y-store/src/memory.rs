//! In-memory store
//!
//! All state sits behind one `parking_lot::RwLock`. A transaction works on a
//! private copy of its scan's findings and records every staged operation;
//! commit replays those operations against the current state under the write
//! lock and swaps the result in only if all of them apply.

use crate::error::StoreError;
use crate::gateway::{ResultTransaction, ScanStore};
use a11y_types::{
    Finding, FindingId, NewProject, NewScan, Project, ProjectId, ProjectUrl, ResultPatch, Scan,
    ScanId, ScanStatus, ScanUpdate, UrlId,
};
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Findings = IndexMap<FindingId, Finding>;

#[derive(Debug, Default)]
struct State {
    projects: IndexMap<ProjectId, Project>,
    urls: IndexMap<UrlId, ProjectUrl>,
    scans: IndexMap<ScanId, Scan>,
    results: HashMap<ScanId, Findings>,
}

impl State {
    fn ensure_urls_free(&self, urls: &[String]) -> Result<(), StoreError> {
        for (i, url) in urls.iter().enumerate() {
            let taken = self.urls.values().any(|u| &u.url == url) || urls[..i].contains(url);
            if taken {
                return Err(StoreError::DuplicateUrl(url.clone()));
            }
        }
        Ok(())
    }

    fn insert_urls(&mut self, project_id: ProjectId, urls: &[String]) -> Vec<ProjectUrl> {
        let now = Utc::now();
        urls.iter()
            .map(|url| {
                let row = ProjectUrl {
                    id: UrlId::new(),
                    project_id,
                    url: url.clone(),
                    created_at: now,
                };
                self.urls.insert(row.id, row.clone());
                row
            })
            .collect()
    }
}

/// Process-local [`ScanStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed findings for a scan
    #[must_use]
    pub fn result_count(&self, scan_id: ScanId) -> usize {
        self.state.read().results.get(&scan_id).map_or(0, IndexMap::len)
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError> {
        let mut state = self.state.write();
        state.ensure_urls_free(&project.urls)?;

        let now = Utc::now();
        let record = Project {
            id: ProjectId::new(),
            name: project.name,
            compliance: project.compliance_options,
            created_at: now,
            updated_at: now,
        };
        state.projects.insert(record.id, record.clone());
        state.insert_urls(record.id, &project.urls);
        Ok(record)
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.state
            .read()
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("project", id))
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.state.read().projects.values().rev().cloned().collect())
    }

    async fn add_urls(
        &self,
        project_id: ProjectId,
        urls: &[String],
    ) -> Result<Vec<ProjectUrl>, StoreError> {
        let mut state = self.state.write();
        if !state.projects.contains_key(&project_id) {
            return Err(StoreError::not_found("project", project_id));
        }
        state.ensure_urls_free(urls)?;
        Ok(state.insert_urls(project_id, urls))
    }

    async fn list_urls(&self, project_id: ProjectId) -> Result<Vec<ProjectUrl>, StoreError> {
        let state = self.state.read();
        if !state.projects.contains_key(&project_id) {
            return Err(StoreError::not_found("project", project_id));
        }
        Ok(state
            .urls
            .values()
            .filter(|u| u.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create_scan(&self, scan: NewScan) -> Result<Scan, StoreError> {
        let mut state = self.state.write();
        if !state.projects.contains_key(&scan.project_id) {
            return Err(StoreError::not_found("project", scan.project_id));
        }
        let record = Scan::pending(scan.project_id, scan.url, Utc::now());
        state.scans.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        self.state
            .read()
            .scans
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("scan", id))
    }

    async fn update_scan(&self, id: ScanId, update: ScanUpdate) -> Result<Scan, StoreError> {
        let mut state = self.state.write();
        let scan = state
            .scans
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("scan", id))?;
        update.apply_to(scan);
        Ok(scan.clone())
    }

    async fn transition_scan(
        &self,
        id: ScanId,
        expected: &[ScanStatus],
        update: ScanUpdate,
    ) -> Result<Scan, StoreError> {
        let mut state = self.state.write();
        let scan = state
            .scans
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("scan", id))?;

        let allowed = expected.contains(&scan.status)
            && update
                .status
                .map_or(true, |to| scan.status.can_transition_to(to));
        if !allowed {
            return Err(StoreError::StatusConflict {
                scan_id: id,
                actual: scan.status,
                expected: expected.to_vec(),
            });
        }

        update.apply_to(scan);
        Ok(scan.clone())
    }

    async fn list_scans_for_project(&self, project_id: ProjectId) -> Result<Vec<Scan>, StoreError> {
        let state = self.state.read();
        if !state.projects.contains_key(&project_id) {
            return Err(StoreError::not_found("project", project_id));
        }
        Ok(state
            .scans
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_results_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>, StoreError> {
        let state = self.state.read();
        if !state.scans.contains_key(&scan_id) {
            return Err(StoreError::not_found("scan", scan_id));
        }
        Ok(state
            .results
            .get(&scan_id)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn begin(&self, scan_id: ScanId) -> Result<Box<dyn ResultTransaction>, StoreError> {
        let view = {
            let state = self.state.read();
            if !state.scans.contains_key(&scan_id) {
                return Err(StoreError::not_found("scan", scan_id));
            }
            state.results.get(&scan_id).cloned().unwrap_or_default()
        };
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            scan_id,
            view,
            ops: Vec::new(),
        }))
    }
}

#[derive(Debug, Clone)]
enum StagedOp {
    Insert(Vec<Finding>),
    Delete(Vec<FindingId>),
    Update(Vec<ResultPatch>),
}

impl StagedOp {
    fn apply(&self, scan_id: ScanId, findings: &mut Findings) -> Result<u64, StoreError> {
        match self {
            StagedOp::Insert(rows) => {
                for row in rows {
                    if row.scan_id != scan_id {
                        return Err(StoreError::InvalidWrite(format!(
                            "finding {} belongs to scan {}, not {scan_id}",
                            row.id, row.scan_id
                        )));
                    }
                    if findings.contains_key(&row.id) {
                        return Err(StoreError::InvalidWrite(format!(
                            "finding {} already exists",
                            row.id
                        )));
                    }
                    findings.insert(row.id, row.clone());
                }
                Ok(rows.len() as u64)
            }
            StagedOp::Delete(ids) => {
                for id in ids {
                    // shift_remove keeps insertion order for the survivors
                    if findings.shift_remove(id).is_none() {
                        return Err(StoreError::not_found("finding", id));
                    }
                }
                Ok(ids.len() as u64)
            }
            StagedOp::Update(patches) => {
                for patch in patches {
                    let finding = findings
                        .get_mut(&patch.id)
                        .ok_or_else(|| StoreError::not_found("finding", patch.id))?;
                    finding.apply_patch(patch);
                }
                Ok(patches.len() as u64)
            }
        }
    }
}

struct MemoryTransaction {
    state: Arc<RwLock<State>>,
    scan_id: ScanId,
    view: Findings,
    ops: Vec<StagedOp>,
}

impl MemoryTransaction {
    fn stage(&mut self, op: StagedOp) -> Result<u64, StoreError> {
        let affected = op.apply(self.scan_id, &mut self.view)?;
        self.ops.push(op);
        Ok(affected)
    }
}

#[async_trait]
impl ResultTransaction for MemoryTransaction {
    fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    async fn list_results(&mut self) -> Result<Vec<Finding>, StoreError> {
        Ok(self.view.values().cloned().collect())
    }

    async fn bulk_insert_results(&mut self, results: Vec<Finding>) -> Result<u64, StoreError> {
        self.stage(StagedOp::Insert(results))
    }

    async fn bulk_delete_results(&mut self, ids: &[FindingId]) -> Result<u64, StoreError> {
        self.stage(StagedOp::Delete(ids.to_vec()))
    }

    async fn bulk_update_results(&mut self, patches: &[ResultPatch]) -> Result<u64, StoreError> {
        self.stage(StagedOp::Update(patches.to_vec()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if !state.scans.contains_key(&self.scan_id) {
            return Err(StoreError::not_found("scan", self.scan_id));
        }

        let mut findings = state.results.get(&self.scan_id).cloned().unwrap_or_default();
        for op in &self.ops {
            op.apply(self.scan_id, &mut findings)?;
        }
        state.results.insert(self.scan_id, findings);

        tracing::trace!(scan_id = %self.scan_id, ops = self.ops.len(), "transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        tracing::trace!(scan_id = %self.scan_id, ops = self.ops.len(), "transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a11y_types::{FieldChange, NewFinding, Severity};
    use pretty_assertions::assert_eq;

    async fn seeded() -> (MemoryStore, Scan) {
        let store = MemoryStore::new();
        let project = store
            .create_project(NewProject::new("Docs").with_urls(["https://a.com"]))
            .await
            .unwrap();
        let scan = store
            .create_scan(NewScan::new(project.id, "https://a.com"))
            .await
            .unwrap();
        (store, scan)
    }

    fn finding(scan_id: ScanId, message: &str) -> Finding {
        Finding::from_new(
            scan_id,
            NewFinding::new("https://a.com", message, Severity::Serious),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let (store, scan) = seeded().await;
        let mut tx = store.begin(scan.id).await.unwrap();
        tx.bulk_insert_results(vec![finding(scan.id, "a")]).await.unwrap();
        assert_eq!(tx.list_results().await.unwrap().len(), 1);
        assert_eq!(store.result_count(scan.id), 0);

        drop(tx);
        assert_eq!(store.result_count(scan.id), 0);
    }

    #[tokio::test]
    async fn commit_applies_every_operation() {
        let (store, scan) = seeded().await;
        let keep = finding(scan.id, "keep");
        let gone = finding(scan.id, "gone");
        let mut tx = store.begin(scan.id).await.unwrap();
        tx.bulk_insert_results(vec![keep.clone(), gone.clone()])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(scan.id).await.unwrap();
        tx.bulk_delete_results(&[gone.id]).await.unwrap();
        tx.bulk_update_results(&[ResultPatch {
            id: keep.id,
            changes: vec![FieldChange::Help(Some("fixed".into()))],
            updated_at: Utc::now(),
        }])
        .await
        .unwrap();
        tx.bulk_insert_results(vec![finding(scan.id, "new")])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let results = store.list_results_for_scan(scan.id).await.unwrap();
        let messages: Vec<_> = results.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["keep", "new"]);
        assert_eq!(results[0].help.as_deref(), Some("fixed"));
        assert_eq!(results[0].id, keep.id);
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_untouched() {
        let (store, scan) = seeded().await;
        let existing = finding(scan.id, "existing");
        let mut tx = store.begin(scan.id).await.unwrap();
        tx.bulk_insert_results(vec![existing.clone()]).await.unwrap();
        tx.commit().await.unwrap();

        // both transactions see `existing`; the second delete loses at commit
        let mut first = store.begin(scan.id).await.unwrap();
        let mut second = store.begin(scan.id).await.unwrap();
        first.bulk_delete_results(&[existing.id]).await.unwrap();
        first.commit().await.unwrap();

        second.bulk_insert_results(vec![finding(scan.id, "added")]).await.unwrap();
        second.bulk_delete_results(&[existing.id]).await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.result_count(scan.id), 0);
    }

    #[tokio::test]
    async fn staging_rejects_foreign_findings() {
        let (store, scan) = seeded().await;
        let mut tx = store.begin(scan.id).await.unwrap();
        let err = tx
            .bulk_insert_results(vec![finding(ScanId::new(), "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidWrite(_)));
    }

    #[tokio::test]
    async fn transition_is_compare_and_swap() {
        let (store, scan) = seeded().await;
        let now = Utc::now();
        let started = store
            .transition_scan(scan.id, &[ScanStatus::Pending], ScanUpdate::started(now))
            .await
            .unwrap();
        assert_eq!(started.status, ScanStatus::InProgress);

        let err = store
            .transition_scan(
                scan.id,
                &[ScanStatus::Pending, ScanStatus::Completed, ScanStatus::Failed],
                ScanUpdate::rescan("https://a.com", now),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusConflict {
                actual: ScanStatus::InProgress,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn transition_rejects_disallowed_status_change() {
        let (store, scan) = seeded().await;
        let err = store
            .transition_scan(
                scan.id,
                &[ScanStatus::Pending],
                ScanUpdate::completed(Default::default(), "browser", Utc::now()),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn urls_are_globally_unique() {
        let (store, _) = seeded().await;
        let err = store
            .create_project(NewProject::new("Other").with_urls(["https://a.com"]))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateUrl("https://a.com".into()));
    }

    #[tokio::test]
    async fn missing_entities_are_not_found() {
        let store = MemoryStore::new();
        assert!(store.get_scan(ScanId::new()).await.unwrap_err().is_not_found());
        assert!(store.begin(ScanId::new()).await.is_err());
        assert!(store
            .create_scan(NewScan::new(ProjectId::new(), "https://a.com"))
            .await
            .unwrap_err()
            .is_not_found());
    }
}
