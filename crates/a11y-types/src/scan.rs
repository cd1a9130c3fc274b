//! Scan records and their lifecycle

use crate::error::ParseError;
use crate::ids::{ProjectId, ScanId};
use crate::severity::ScanSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Created, not yet started
    Pending,
    /// Analysis running
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl ScanStatus {
    /// Snake-case label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::InProgress => "in_progress",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    /// Whether the scan is finished
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Whether the scan is queued or running
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, ScanStatus::Pending | ScanStatus::InProgress)
    }

    /// Statuses reachable from this one
    ///
    /// Terminal statuses only lead back to `InProgress`, which is the rescan reset.
    #[must_use]
    pub fn allowed_transitions(&self) -> &'static [ScanStatus] {
        use ScanStatus::*;
        match self {
            Pending => &[InProgress, Failed],
            InProgress => &[Completed, Failed],
            Completed => &[InProgress],
            Failed => &[InProgress],
        }
    }

    /// Whether moving to `to` is legal
    #[inline]
    #[must_use]
    pub fn can_transition_to(&self, to: ScanStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "in_progress" => Ok(ScanStatus::InProgress),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(ParseError::ScanStatus(s.to_string())),
        }
    }
}

/// One analysis record for a single url within a project
///
/// Rescans update the same record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    /// Scan id
    pub id: ScanId,
    /// Owning project
    pub project_id: ProjectId,
    /// Target url
    pub url: String,
    /// Lifecycle status
    pub status: ScanStatus,
    /// When the current attempt started
    pub started_at: Option<DateTime<Utc>>,
    /// When the current attempt finished
    pub completed_at: Option<DateTime<Utc>>,
    /// Issue counts (set only on completion)
    pub summary: Option<ScanSummary>,
    /// Winning analysis strategy
    pub analysis_method: Option<String>,
    /// Failure message
    pub error: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Scan {
    /// Create a pending scan record
    #[must_use]
    pub fn pending(project_id: ProjectId, url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ScanId::new(),
            project_id,
            url: url.into(),
            status: ScanStatus::Pending,
            started_at: None,
            completed_at: None,
            summary: None,
            analysis_method: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    /// Owning project
    pub project_id: ProjectId,
    /// Target url
    pub url: String,
}

impl NewScan {
    /// Create scan input
    #[inline]
    #[must_use]
    pub fn new(project_id: ProjectId, url: impl Into<String>) -> Self {
        Self {
            project_id,
            url: url.into(),
        }
    }
}

/// Partial update of a scan record
///
/// `None` leaves a field unchanged; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanUpdate {
    /// New status
    pub status: Option<ScanStatus>,
    /// New target url
    pub url: Option<String>,
    /// New start time
    pub started_at: Option<Option<DateTime<Utc>>>,
    /// New completion time
    pub completed_at: Option<Option<DateTime<Utc>>>,
    /// New summary
    pub summary: Option<Option<ScanSummary>>,
    /// New analysis method
    pub analysis_method: Option<Option<String>>,
    /// New error message
    pub error: Option<Option<String>>,
    /// Modification time
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScanUpdate {
    /// Move a freshly created scan into `InProgress`
    #[must_use]
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(ScanStatus::InProgress),
            started_at: Some(Some(now)),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    /// Reset an existing scan for a rescan of `url`
    ///
    /// Clears every field written by the previous attempt.
    #[must_use]
    pub fn rescan(url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(ScanStatus::InProgress),
            url: Some(url.into()),
            started_at: Some(Some(now)),
            completed_at: Some(None),
            summary: Some(None),
            analysis_method: Some(None),
            error: Some(None),
            updated_at: Some(now),
        }
    }

    /// Record a successful attempt
    #[must_use]
    pub fn completed(summary: ScanSummary, method: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(ScanStatus::Completed),
            completed_at: Some(Some(now)),
            summary: Some(Some(summary)),
            analysis_method: Some(Some(method.into())),
            error: Some(None),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    /// Record a failed attempt
    ///
    /// Summary counters are left unset.
    #[must_use]
    pub fn failed(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(ScanStatus::Failed),
            completed_at: Some(Some(now)),
            error: Some(Some(message.into())),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    /// Apply this update to a scan record
    pub fn apply_to(&self, scan: &mut Scan) {
        if let Some(status) = self.status {
            scan.status = status;
        }
        if let Some(url) = &self.url {
            scan.url.clone_from(url);
        }
        if let Some(started_at) = self.started_at {
            scan.started_at = started_at;
        }
        if let Some(completed_at) = self.completed_at {
            scan.completed_at = completed_at;
        }
        if let Some(summary) = self.summary {
            scan.summary = summary;
        }
        if let Some(method) = &self.analysis_method {
            scan.analysis_method.clone_from(method);
        }
        if let Some(error) = &self.error {
            scan.error.clone_from(error);
        }
        if let Some(updated_at) = self.updated_at {
            scan.updated_at = updated_at;
        }
    }
}
