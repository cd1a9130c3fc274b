//! Accessibility findings and in-place patches

use crate::ids::{FindingId, ScanId};
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted accessibility issue detected during a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Finding id
    pub id: FindingId,
    /// Owning scan
    pub scan_id: ScanId,
    /// Page url the issue was found on
    pub url: String,
    /// Rule message
    pub message: String,
    /// Offending element snippet
    pub element: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Raw engine impact
    pub impact: Option<String>,
    /// Help text or link
    pub help: Option<String>,
    /// Selector path to the element
    pub element_path: Option<String>,
    /// Compliance-standard labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// Structured engine details
    pub details: Option<serde_json::Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Finding {
    /// Persist a new finding under `scan_id`
    #[must_use]
    pub fn from_new(scan_id: ScanId, new: NewFinding, now: DateTime<Utc>) -> Self {
        Self {
            id: FindingId::new(),
            scan_id,
            url: new.url,
            message: new.message,
            element: new.element,
            severity: new.severity,
            impact: new.impact,
            help: new.help,
            element_path: new.element_path,
            tags: new.tags,
            details: new.details,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a single field change
    pub fn apply_change(&mut self, change: &FieldChange) {
        match change {
            FieldChange::Help(help) => self.help.clone_from(help),
            FieldChange::Impact(impact) => self.impact.clone_from(impact),
            FieldChange::Tags(tags) => self.tags.clone_from(tags),
            FieldChange::ElementPath(path) => self.element_path.clone_from(path),
            FieldChange::Details(details) => self.details.clone_from(details),
        }
    }

    /// Apply a whole patch, bumping the modification time
    pub fn apply_patch(&mut self, patch: &ResultPatch) {
        for change in &patch.changes {
            self.apply_change(change);
        }
        self.updated_at = patch.updated_at;
    }
}

/// A finding produced by an analyzer, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFinding {
    /// Page url the issue was found on
    pub url: String,
    /// Rule message
    pub message: String,
    /// Offending element snippet
    pub element: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Raw engine impact
    pub impact: Option<String>,
    /// Help text or link
    pub help: Option<String>,
    /// Selector path to the element
    pub element_path: Option<String>,
    /// Compliance-standard labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// Structured engine details
    pub details: Option<serde_json::Value>,
}

impl NewFinding {
    /// Create a finding with its identity fields only
    #[must_use]
    pub fn new(url: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            element: None,
            severity,
            impact: None,
            help: None,
            element_path: None,
            tags: Vec::new(),
            details: None,
        }
    }

    /// With element snippet
    #[inline]
    #[must_use]
    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// With raw impact
    #[inline]
    #[must_use]
    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }

    /// With help text
    #[inline]
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// With element selector path
    #[inline]
    #[must_use]
    pub fn with_element_path(mut self, path: impl Into<String>) -> Self {
        self.element_path = Some(path.into());
        self
    }

    /// With tags
    #[inline]
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// With structured details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// New value for one mutable (non-identity) finding field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FieldChange {
    /// Help text
    Help(Option<String>),
    /// Raw impact
    Impact(Option<String>),
    /// Tags (ordered)
    Tags(Vec<String>),
    /// Selector path
    ElementPath(Option<String>),
    /// Structured details
    Details(Option<serde_json::Value>),
}

impl FieldChange {
    /// Field name
    #[inline]
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            FieldChange::Help(_) => "help",
            FieldChange::Impact(_) => "impact",
            FieldChange::Tags(_) => "tags",
            FieldChange::ElementPath(_) => "elementPath",
            FieldChange::Details(_) => "details",
        }
    }
}

/// In-place update of a persisted finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPatch {
    /// Target finding
    pub id: FindingId,
    /// Changed fields
    pub changes: Vec<FieldChange>,
    /// New modification time
    pub updated_at: DateTime<Utc>,
}

impl ResultPatch {
    /// Whether the patch touches `field`
    #[must_use]
    pub fn touches(&self, field: &str) -> bool {
        self.changes.iter().any(|c| c.field() == field)
    }
}
