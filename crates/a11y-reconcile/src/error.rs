//! Reconciliation errors

use a11y_store::StoreError;
use a11y_types::ScanId;

/// Reconciliation failure; the transaction was not committed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    /// Transaction could not be opened
    #[error("failed to open transaction: {0}")]
    Begin(#[source] StoreError),

    /// Existing findings could not be read
    #[error("failed to load existing findings: {0}")]
    Load(#[source] StoreError),

    /// A staged write failed
    #[error("failed to {stage} findings: {source}")]
    Apply {
        /// `insert`, `delete` or `update`
        stage: &'static str,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Commit failed
    #[error("failed to commit findings: {0}")]
    Commit(#[source] StoreError),

    /// Fresh insert onto a scan that already holds findings
    #[error("scan {scan_id} already holds {existing} findings")]
    NotEmpty {
        /// Target scan
        scan_id: ScanId,
        /// Findings already present
        existing: usize,
    },
}

impl ReconcileError {
    /// Underlying store error, if any
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Begin(e) | Self::Load(e) | Self::Commit(e) => Some(e),
            Self::Apply { source, .. } => Some(source),
            Self::NotEmpty { .. } => None,
        }
    }
}
