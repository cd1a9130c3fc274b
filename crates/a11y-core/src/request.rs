//! Scan requests

use a11y_types::{ComplianceOptions, ProjectId, ScanId};

/// First scan of a url: creates a new scan record
#[derive(Debug, Clone, PartialEq)]
pub struct NewScanRequest {
    /// Owning project
    pub project_id: ProjectId,
    /// Target url
    pub url: String,
    /// Rule sets; the project's configuration when `None`
    pub options: Option<ComplianceOptions>,
}

/// Re-run of an existing scan record, updated in place
#[derive(Debug, Clone, PartialEq)]
pub struct RescanRequest {
    /// Project the scan must belong to
    pub project_id: ProjectId,
    /// Scan to reset
    pub scan_id: ScanId,
    /// Target url (overwrites the stored one)
    pub url: String,
    /// Rule sets; the project's configuration when `None`
    pub options: Option<ComplianceOptions>,
}

/// What to scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanRequest {
    /// Create and run a new scan
    New(NewScanRequest),
    /// Reset and re-run an existing scan
    Rescan(RescanRequest),
}

impl ScanRequest {
    /// New-scan request
    #[must_use]
    pub fn new_scan(project_id: ProjectId, url: impl Into<String>) -> Self {
        Self::New(NewScanRequest {
            project_id,
            url: url.into(),
            options: None,
        })
    }

    /// Rescan request for a scan of `project_id`
    #[must_use]
    pub fn rescan(project_id: ProjectId, scan_id: ScanId, url: impl Into<String>) -> Self {
        Self::Rescan(RescanRequest {
            project_id,
            scan_id,
            url: url.into(),
            options: None,
        })
    }

    /// With explicit compliance options
    #[must_use]
    pub fn with_options(mut self, options: ComplianceOptions) -> Self {
        match &mut self {
            Self::New(r) => r.options = Some(options),
            Self::Rescan(r) => r.options = Some(options),
        }
        self
    }

    /// Owning project
    #[inline]
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        match self {
            Self::New(r) => r.project_id,
            Self::Rescan(r) => r.project_id,
        }
    }

    /// Target url
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::New(r) => &r.url,
            Self::Rescan(r) => &r.url,
        }
    }

    /// Whether this re-runs an existing scan
    #[inline]
    #[must_use]
    pub fn is_rescan(&self) -> bool {
        matches!(self, Self::Rescan(_))
    }
}
