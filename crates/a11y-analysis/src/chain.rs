//! Ordered strategy fallback
//!
//! Provides [`AnalyzerChain`], which tries each configured [`Analyzer`] in
//! preference order and stops at the first success.

use crate::analyzer::{AnalysisOutcome, Analyzer};
use crate::error::AnalysisError;
use a11y_types::ComplianceOptions;
use std::fmt;
use std::sync::Arc;

/// One strategy's failure
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    /// Strategy name
    pub strategy: &'static str,
    /// Cause
    pub error: AnalysisError,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Result of the first strategy that succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSuccess {
    /// Name of the succeeding strategy
    pub method: &'static str,
    /// Its normalized outcome
    pub outcome: AnalysisOutcome,
    /// Strategies that failed before it
    pub failures: Vec<StrategyFailure>,
}

/// Every strategy failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("all analysis strategies failed: {}", join_failures(.failures))]
pub struct ChainExhausted {
    /// Failures in attempt order
    pub failures: Vec<StrategyFailure>,
}

fn join_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Analyzers in preference order
#[derive(Clone)]
pub struct AnalyzerChain {
    strategies: Vec<Arc<dyn Analyzer>>,
}

impl fmt::Debug for AnalyzerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerChain")
            .field("strategies", &self.names())
            .finish()
    }
}

impl AnalyzerChain {
    /// Create a chain
    ///
    /// # Errors
    /// Returns [`AnalysisError::Unavailable`] if `strategies` is empty.
    pub fn new(strategies: Vec<Arc<dyn Analyzer>>) -> Result<Self, AnalysisError> {
        if strategies.is_empty() {
            return Err(AnalysisError::Unavailable(
                "no analysis strategy configured".to_string(),
            ));
        }
        Ok(Self { strategies })
    }

    /// Strategy names in order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Number of strategies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Always false; an empty chain cannot be built
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order until one succeeds
    ///
    /// # Errors
    /// Returns [`ChainExhausted`] listing every failure when no strategy
    /// succeeds.
    pub async fn analyze(
        &self,
        url: &str,
        options: &ComplianceOptions,
    ) -> Result<ChainSuccess, ChainExhausted> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let method = strategy.name();
            match strategy.analyze(url, options).await {
                Ok(outcome) => {
                    tracing::info!(
                        url,
                        method,
                        issues = outcome.summary.total,
                        fallbacks = failures.len(),
                        "analysis succeeded"
                    );
                    return Ok(ChainSuccess {
                        method,
                        outcome,
                        failures,
                    });
                }
                Err(error) => {
                    tracing::warn!(url, method, %error, "analysis strategy failed, trying next");
                    failures.push(StrategyFailure {
                        strategy: method,
                        error,
                    });
                }
            }
        }

        Err(ChainExhausted { failures })
    }
}
