//! Projects and their tracked urls

use crate::compliance::ComplianceOptions;
use crate::ids::{ProjectId, UrlId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named set of urls scanned together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project id
    pub id: ProjectId,
    /// Display name
    pub name: String,
    /// Default compliance configuration for scans of this project
    pub compliance: Option<ComplianceOptions>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Compliance options to use when a request does not specify any
    #[inline]
    #[must_use]
    pub fn effective_compliance(&self) -> ComplianceOptions {
        self.compliance.unwrap_or_default()
    }
}

/// A url tracked by exactly one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUrl {
    /// Url id
    pub id: UrlId,
    /// Owning project
    pub project_id: ProjectId,
    /// Absolute url (globally unique)
    pub url: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    /// Display name
    pub name: String,
    /// Urls to track
    #[serde(default)]
    pub urls: Vec<String>,
    /// Compliance configuration
    #[serde(default)]
    pub compliance_options: Option<ComplianceOptions>,
}

impl NewProject {
    /// Create input with a name and no urls
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            urls: Vec::new(),
            compliance_options: None,
        }
    }

    /// With urls
    #[inline]
    #[must_use]
    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// With compliance options
    #[inline]
    #[must_use]
    pub fn with_compliance(mut self, options: ComplianceOptions) -> Self {
        self.compliance_options = Some(options);
        self
    }
}
