//! Finding severities and per-scan severity counts

use crate::error::ParseError;
use crate::finding::NewFinding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of an accessibility finding
///
/// Mirrors the impact levels reported by axe-style rule engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks access for some users
    Critical,
    /// Seriously degrades access
    Serious,
    /// Causes some difficulty
    Moderate,
    /// Annoyance or minor barrier
    Minor,
}

impl Severity {
    /// All severities, most severe first
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Serious,
        Severity::Moderate,
        Severity::Minor,
    ];

    /// Numeric rank (higher is more severe)
    #[inline]
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::Serious => 3,
            Severity::Moderate => 2,
            Severity::Minor => 1,
        }
    }

    /// Lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Serious => "serious",
            Severity::Moderate => "moderate",
            Severity::Minor => "minor",
        }
    }

    /// Map a raw engine impact string to a severity
    ///
    /// Unknown or missing impacts fall back to [`Severity::Moderate`].
    #[must_use]
    pub fn from_impact(impact: Option<&str>) -> Self {
        impact
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(Severity::Moderate)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "serious" => Ok(Severity::Serious),
            "moderate" => Ok(Severity::Moderate),
            "minor" => Ok(Severity::Minor),
            _ => Err(ParseError::Severity(s.to_string())),
        }
    }
}

/// Issue counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Critical findings
    pub critical: u32,
    /// Serious findings
    pub serious: u32,
    /// Moderate findings
    pub moderate: u32,
    /// Minor findings
    pub minor: u32,
    /// Total findings
    pub total: u32,
}

impl ScanSummary {
    /// Empty summary
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finding of the given severity
    #[inline]
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Serious => self.serious += 1,
            Severity::Moderate => self.moderate += 1,
            Severity::Minor => self.minor += 1,
        }
        self.total += 1;
    }

    /// Count for a single severity
    #[inline]
    #[must_use]
    pub fn count(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Serious => self.serious,
            Severity::Moderate => self.moderate,
            Severity::Minor => self.minor,
        }
    }

    /// Summarize a set of severities
    pub fn from_severities(severities: impl IntoIterator<Item = Severity>) -> Self {
        let mut summary = Self::new();
        for severity in severities {
            summary.record(severity);
        }
        summary
    }

    /// Summarize freshly analyzed findings
    #[must_use]
    pub fn from_findings(findings: &[NewFinding]) -> Self {
        Self::from_severities(findings.iter().map(|f| f.severity))
    }
}
