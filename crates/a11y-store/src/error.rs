//! Store errors

use a11y_types::{ScanId, ScanStatus};

/// Persistence gateway error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Compare-and-swap on scan status lost
    #[error("scan {scan_id} is {actual}, expected one of {expected:?}")]
    StatusConflict {
        /// Scan id
        scan_id: ScanId,
        /// Status found in the store
        actual: ScanStatus,
        /// Statuses the caller accepted
        expected: Vec<ScanStatus>,
    },

    /// Url already tracked by some project
    #[error("url already registered: {0}")]
    DuplicateUrl(String),

    /// Staged operation is inconsistent with stored state
    #[error("invalid write: {0}")]
    InvalidWrite(String),

    /// Backend failure
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Not-found error for `entity`
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this is a not-found error
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a conflict with concurrent state
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::StatusConflict { .. } | Self::DuplicateUrl(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            if db.is_unique_violation() {
                return Self::InvalidWrite(db.message().to_string());
            }
        }
        Self::Database(err.to_string())
    }
}
