//! Error types for A11y Core
//!
//! Provides error handling for:
//! - Input validation
//! - Missing projects and scans
//! - Scans already running (conflicts)
//! - Store failures outside a scan attempt
//!
//! Failures inside a background attempt never surface here; they end as a
//! failed scan carrying a [`ScanFailure`] message.

use a11y_analysis::ChainExhausted;
use a11y_reconcile::ReconcileError;
use a11y_store::StoreError;

/// Invalid caller input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Offending field (camelCase, as sent by clients)
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

impl ValidationError {
    /// Create a validation error
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Main orchestration error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestratorError {
    /// Bad input
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Missing project or scan
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Scan already pending or running
    #[error("conflict: {0}")]
    Conflict(String),

    /// Queue no longer accepts work
    #[error("scan queue is shutting down")]
    ShuttingDown,

    /// Store failure
    #[error("store error: {0}")]
    Store(StoreError),

    /// Background task ended without a scan record
    #[error("scan task failed: {0}")]
    Task(String),
}

impl OrchestratorError {
    /// Whether the caller can fix the request
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Conflict(_)
        )
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::StatusConflict {
                scan_id, actual, ..
            } => Self::Conflict(format!("scan {scan_id} is already {actual}")),
            StoreError::DuplicateUrl(url) => Self::Validation(ValidationError::new(
                "urls",
                format!("{url} is already tracked by a project"),
            )),
            other => Self::Store(other),
        }
    }
}

/// Why a scan attempt ended in `failed`
///
/// The `Display` text becomes the scan's error message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanFailure {
    /// Every analysis strategy failed
    #[error(transparent)]
    Exhausted(#[from] ChainExhausted),

    /// Findings could not be stored; nothing was committed
    #[error("failed to persist findings: {0}")]
    Persist(#[from] ReconcileError),

    /// Attempt exceeded its overall deadline
    #[error("scan timed out after {secs}s")]
    Deadline {
        /// Deadline in seconds
        secs: u64,
    },

    /// Background task panicked
    #[error("scan task panicked: {0}")]
    Panicked(String),
}
