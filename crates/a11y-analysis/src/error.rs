//! Analysis errors

/// Failure of a single analysis strategy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// Strategy not configured or not installed
    #[error("strategy unavailable: {0}")]
    Unavailable(String),

    /// Network failure talking to the page or engine
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Requested url
        url: String,
    },

    /// Strategy exceeded its own timeout
    #[error("timed out after {secs}s")]
    Timeout {
        /// Timeout in seconds
        secs: u64,
    },

    /// External checker process failed
    #[error("checker exited with code {code:?}: {stderr}")]
    Process {
        /// Exit code, if any
        code: Option<i32>,
        /// Trimmed stderr
        stderr: String,
    },

    /// Engine output could not be parsed
    #[error("invalid engine output: {0}")]
    InvalidOutput(String),

    /// Url rejected by the strategy
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl AnalysisError {
    /// Whether retrying the same strategy could succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout { .. } | Self::HttpStatus { status: 500..=599, .. }
        )
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration
            return Self::Network(format!("request timed out: {err}"));
        }
        if let Some(status) = err.status() {
            return Self::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            };
        }
        if err.is_decode() {
            return Self::InvalidOutput(err.to_string());
        }
        Self::Network(err.to_string())
    }
}
