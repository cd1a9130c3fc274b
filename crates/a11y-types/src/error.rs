//! Parse errors for model value types

/// Failure to parse a model value from its string form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Unknown severity label
    #[error("unknown severity: {0}")]
    Severity(String),

    /// Unknown scan status label
    #[error("unknown scan status: {0}")]
    ScanStatus(String),

    /// Unknown WCAG conformance level
    #[error("unknown WCAG level: {0}")]
    WcagLevel(String),

    /// Unknown compliance filter
    #[error("unknown compliance filter: {0}")]
    ComplianceFilter(String),

    /// Malformed identifier
    #[error("invalid {kind} id: {value}")]
    Id {
        /// Entity kind
        kind: &'static str,
        /// Rejected input
        value: String,
    },
}
