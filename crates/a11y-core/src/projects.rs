//! Project and result read/write services

use crate::error::OrchestratorError;
use crate::query::{ResultPage, ResultQuery};
use crate::validation::{validate_new_project, validate_urls};
use a11y_store::ScanStore;
use a11y_types::{Finding, NewProject, Project, ProjectId, ProjectUrl, Scan, ScanId, ScanStatus};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;

/// A project with its tracked urls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    /// Project record
    #[serde(flatten)]
    pub project: Project,
    /// Urls in insertion order
    pub urls: Vec<ProjectUrl>,
}

/// Project CRUD and result aggregation over a [`ScanStore`]
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn ScanStore>,
}

impl std::fmt::Debug for ProjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectService").finish_non_exhaustive()
    }
}

impl ProjectService {
    /// Create a service over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn ScanStore>) -> Self {
        Self { store }
    }

    /// Validate and create a project
    ///
    /// # Errors
    /// `Validation` for bad input or a url tracked by another project.
    pub async fn create_project(
        &self,
        project: NewProject,
    ) -> Result<ProjectDetails, OrchestratorError> {
        let project = validate_new_project(project)?;
        let created = self.store.create_project(project).await?;
        let urls = self.store.list_urls(created.id).await?;
        tracing::info!(project_id = %created.id, urls = urls.len(), "project created");
        Ok(ProjectDetails {
            project: created,
            urls,
        })
    }

    /// Track more urls under an existing project
    ///
    /// Returns the project with every url it now tracks.
    ///
    /// # Errors
    /// `NotFound` for an unknown project, `Validation` for bad urls, a total
    /// above the per-project limit or a url tracked elsewhere.
    pub async fn add_urls(
        &self,
        project_id: ProjectId,
        urls: Vec<String>,
    ) -> Result<ProjectDetails, OrchestratorError> {
        let tracked = self.store.list_urls(project_id).await?;
        let urls = validate_urls(&urls, tracked.len())?;
        let added = self.store.add_urls(project_id, &urls).await?;
        tracing::info!(%project_id, added = added.len(), "project urls added");
        self.get_project(project_id).await
    }

    /// Project with its urls
    ///
    /// # Errors
    /// `NotFound` for an unknown project.
    pub async fn get_project(&self, id: ProjectId) -> Result<ProjectDetails, OrchestratorError> {
        let project = self.store.get_project(id).await?;
        let urls = self.store.list_urls(id).await?;
        Ok(ProjectDetails { project, urls })
    }

    /// All projects, newest first
    ///
    /// # Errors
    /// Store failures.
    pub async fn list_projects(&self) -> Result<Vec<Project>, OrchestratorError> {
        Ok(self.store.list_projects().await?)
    }

    /// Scans of a project, oldest first
    ///
    /// # Errors
    /// `NotFound` for an unknown project.
    pub async fn list_scans(&self, project_id: ProjectId) -> Result<Vec<Scan>, OrchestratorError> {
        Ok(self.store.list_scans_for_project(project_id).await?)
    }

    /// One scan record
    ///
    /// # Errors
    /// `NotFound` for an unknown scan.
    pub async fn get_scan(&self, id: ScanId) -> Result<Scan, OrchestratorError> {
        Ok(self.store.get_scan(id).await?)
    }

    /// Committed findings of one scan
    ///
    /// # Errors
    /// `NotFound` for an unknown scan.
    pub async fn scan_results(&self, id: ScanId) -> Result<Vec<Finding>, OrchestratorError> {
        self.store.get_scan(id).await?;
        Ok(self.store.list_results_for_scan(id).await?)
    }

    /// Paginated findings across the project's completed scans
    ///
    /// # Errors
    /// `NotFound` for an unknown project.
    pub async fn project_results(
        &self,
        project_id: ProjectId,
        query: &ResultQuery,
    ) -> Result<ResultPage, OrchestratorError> {
        let findings = self.completed_findings(project_id).await?;
        Ok(query.apply(findings))
    }

    /// Every matching finding, unpaginated, for export
    ///
    /// # Errors
    /// `NotFound` for an unknown project.
    pub async fn export_results(
        &self,
        project_id: ProjectId,
        query: &ResultQuery,
    ) -> Result<Vec<Finding>, OrchestratorError> {
        let findings = self.completed_findings(project_id).await?;
        Ok(query.select(findings))
    }

    async fn completed_findings(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Finding>, OrchestratorError> {
        let scans = self.store.list_scans_for_project(project_id).await?;
        let loads = scans
            .iter()
            .filter(|s| s.status == ScanStatus::Completed)
            .map(|s| self.store.list_results_for_scan(s.id));
        let per_scan = try_join_all(loads).await?;
        Ok(per_scan.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a11y_store::MemoryStore;

    fn service() -> ProjectService {
        ProjectService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_returns_urls_in_order() {
        let svc = service();
        let details = svc
            .create_project(NewProject::new(" Site ").with_urls(["https://a.com", "https://a.com/b"]))
            .await
            .unwrap();
        assert_eq!(details.project.name, "Site");
        let urls: Vec<_> = details.urls.iter().map(|u| u.url.as_str()).collect();
        assert_eq!(urls, ["https://a.com", "https://a.com/b"]);

        let fetched = svc.get_project(details.project.id).await.unwrap();
        assert_eq!(fetched, details);
    }

    #[tokio::test]
    async fn url_owned_by_another_project_is_a_validation_error() {
        let svc = service();
        svc.create_project(NewProject::new("A").with_urls(["https://a.com"]))
            .await
            .unwrap();
        let err = svc
            .create_project(NewProject::new("B").with_urls(["https://a.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let svc = service();
        assert!(matches!(
            svc.get_project(ProjectId::new()).await,
            Err(OrchestratorError::NotFound { entity: "project", .. })
        ));
        assert!(matches!(
            svc.scan_results(ScanId::new()).await,
            Err(OrchestratorError::NotFound { entity: "scan", .. })
        ));
    }

    #[tokio::test]
    async fn project_without_completed_scans_has_empty_results() {
        let svc = service();
        let details = svc
            .create_project(NewProject::new("A").with_urls(["https://a.com"]))
            .await
            .unwrap();
        let page = svc
            .project_results(details.project.id, &ResultQuery::new())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn added_urls_follow_existing_ones() {
        let svc = service();
        let details = svc
            .create_project(NewProject::new("A").with_urls(["https://a.com"]))
            .await
            .unwrap();
        let id = details.project.id;

        let updated = svc
            .add_urls(id, vec![" https://a.com/docs ".into()])
            .await
            .unwrap();
        let urls: Vec<_> = updated.urls.iter().map(|u| u.url.as_str()).collect();
        assert_eq!(urls, ["https://a.com", "https://a.com/docs"]);

        assert!(matches!(
            svc.add_urls(id, vec!["https://a.com".into()]).await,
            Err(OrchestratorError::Validation(_))
        ));
        assert!(matches!(
            svc.add_urls(id, vec!["not a url".into()]).await,
            Err(OrchestratorError::Validation(_))
        ));
        assert!(matches!(
            svc.add_urls(ProjectId::new(), vec!["https://b.com".into()]).await,
            Err(OrchestratorError::NotFound { entity: "project", .. })
        ));
        assert_eq!(svc.get_project(id).await.unwrap().urls.len(), 2);
    }
}
