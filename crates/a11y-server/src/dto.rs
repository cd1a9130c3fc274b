//! Request and response bodies

use a11y_core::{ResultParams, ScanRequest};
use a11y_types::{ComplianceOptions, Finding, NewProject, ProjectId, Scan, ScanId};
use serde::{Deserialize, Serialize};

/// `POST /projects`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectBody {
    /// Display name
    pub name: String,
    /// Urls to track
    #[serde(default)]
    pub urls: Vec<String>,
    /// Default rule sets
    pub compliance_options: Option<ComplianceOptions>,
}

impl From<CreateProjectBody> for NewProject {
    fn from(body: CreateProjectBody) -> Self {
        NewProject {
            name: body.name,
            urls: body.urls,
            compliance_options: body.compliance_options,
        }
    }
}

/// `POST /projects/{id}/urls`
#[derive(Debug, Clone, Deserialize)]
pub struct AddUrlsBody {
    /// Urls to start tracking
    pub urls: Vec<String>,
}

/// `POST /scans`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScanBody {
    /// Owning project
    pub project_id: ProjectId,
    /// Target url
    pub url: String,
    /// Rule sets for this run
    pub compliance_options: Option<ComplianceOptions>,
    /// Existing scan to rerun
    pub scan_id: Option<ScanId>,
}

impl From<StartScanBody> for ScanRequest {
    fn from(body: StartScanBody) -> Self {
        let request = match body.scan_id {
            Some(scan_id) => ScanRequest::rescan(body.project_id, scan_id, body.url),
            None => ScanRequest::new_scan(body.project_id, body.url),
        };
        match body.compliance_options {
            Some(options) => request.with_options(options),
            None => request,
        }
    }
}

/// `GET /export` query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportParams {
    /// `json`, `excel` or `pdf`
    pub format: Option<String>,
    /// Project whose results are exported
    pub project_id: Option<ProjectId>,
    /// Ordering
    pub sort_by: Option<String>,
    /// Search text
    pub search: Option<String>,
    /// Comma-separated severities
    pub severity_filters: Option<String>,
    /// Comma-separated compliance filters
    pub compliance_filters: Option<String>,
    /// Group by severity
    pub organize_by_severity: Option<bool>,
}

impl ExportParams {
    /// Result filters, unpaginated
    #[must_use]
    pub fn result_params(&self) -> ResultParams {
        ResultParams {
            sort_by: self.sort_by.clone(),
            search: self.search.clone(),
            severity_filters: self.severity_filters.clone(),
            compliance_filters: self.compliance_filters.clone(),
            ..ResultParams::default()
        }
    }
}

/// `POST /export`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBody {
    /// `json`, `excel` or `pdf`
    pub format: String,
    /// Findings to render
    #[serde(default)]
    pub data: Vec<Finding>,
    /// Embed screenshots
    #[serde(default)]
    pub include_screenshots: bool,
    /// Group by severity
    #[serde(default)]
    pub organize_by_severity: bool,
    /// Document title
    pub title: Option<String>,
}

/// `POST /projects/{id}/rescan`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescanResponse {
    /// Project rescanned
    pub project_id: ProjectId,
    /// Scans now in progress
    pub scans: Vec<Scan>,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
}
