//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scan orchestration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Overall deadline per scan attempt in seconds
    pub scan_timeout_secs: u64,
    /// Maximum analyses running at once
    pub max_concurrent_scans: usize,
    /// Attempts at writing a scan's terminal status
    pub finalize_attempts: u32,
    /// Delay between finalize attempts in milliseconds
    pub finalize_backoff_ms: u64,
}

impl ScanConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With scan deadline
    #[inline]
    #[must_use]
    pub fn with_scan_timeout(mut self, secs: u64) -> Self {
        self.scan_timeout_secs = secs;
        self
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_scans(mut self, max: usize) -> Self {
        self.max_concurrent_scans = max.max(1);
        self
    }

    /// With finalize retry policy
    #[inline]
    #[must_use]
    pub fn with_finalize_retries(mut self, attempts: u32, backoff_ms: u64) -> Self {
        self.finalize_attempts = attempts.max(1);
        self.finalize_backoff_ms = backoff_ms;
        self
    }

    /// Scan deadline
    #[inline]
    #[must_use]
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Delay before finalize attempt `n` (1-based)
    #[inline]
    #[must_use]
    pub fn finalize_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.finalize_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 300,
            max_concurrent_scans: 4,
            finalize_attempts: 3,
            finalize_backoff_ms: 200,
        }
    }
}
