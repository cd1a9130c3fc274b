//! The analysis capability shared by every strategy

use crate::error::AnalysisError;
use a11y_types::{ComplianceOptions, NewFinding, ScanSummary};
use async_trait::async_trait;

/// Normalized output of one analysis run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisOutcome {
    /// Findings, one per offending element
    pub results: Vec<NewFinding>,
    /// Counts by severity
    pub summary: ScanSummary,
}

impl AnalysisOutcome {
    /// Build an outcome, deriving the summary from the findings
    #[must_use]
    pub fn from_results(results: Vec<NewFinding>) -> Self {
        let summary = ScanSummary::from_findings(&results);
        Self { results, summary }
    }

    /// Whether the page is free of findings
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.results.is_empty()
    }
}

/// Capability: analyze a url under given compliance options
///
/// Implementations are independent and interchangeable; the orchestrator only
/// sees this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Strategy name, recorded as the scan's analysis method
    fn name(&self) -> &'static str;

    /// Analyze `url`
    ///
    /// # Errors
    /// Returns [`AnalysisError`] when the engine cannot produce results.
    async fn analyze(
        &self,
        url: &str,
        options: &ComplianceOptions,
    ) -> Result<AnalysisOutcome, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use a11y_types::Severity;

    #[test]
    fn outcome_summary_matches_results() {
        let outcome = AnalysisOutcome::from_results(vec![
            NewFinding::new("https://a.com", "Missing alt", Severity::Critical),
            NewFinding::new("https://a.com", "Low contrast", Severity::Serious),
        ]);
        assert_eq!(outcome.summary.total, 2);
        assert_eq!(outcome.summary.critical, 1);
        assert!(!outcome.is_clean());
    }

    #[test]
    fn empty_outcome_is_clean() {
        assert!(AnalysisOutcome::from_results(Vec::new()).is_clean());
    }
}
