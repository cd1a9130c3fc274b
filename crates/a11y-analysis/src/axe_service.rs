//! HTTP axe service strategy

use crate::analyzer::{AnalysisOutcome, Analyzer};
use crate::axe::{normalize_output, AxeOutput};
use crate::config::STRATEGY_AXE_SERVICE;
use crate::error::AnalysisError;
use a11y_types::ComplianceOptions;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    url: &'a str,
    tags: Vec<String>,
}

/// Posts `{url, tags}` to an axe-compatible service and normalizes the reply
#[derive(Debug, Clone)]
pub struct AxeServiceAnalyzer {
    endpoint: String,
    client: reqwest::Client,
}

impl AxeServiceAnalyzer {
    /// Create an analyzer for `endpoint`
    ///
    /// # Errors
    /// Returns [`AnalysisError::Network`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    /// Service endpoint
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Analyzer for AxeServiceAnalyzer {
    fn name(&self) -> &'static str {
        STRATEGY_AXE_SERVICE
    }

    async fn analyze(
        &self,
        url: &str,
        options: &ComplianceOptions,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let request = AnalyzeRequest {
            url,
            tags: options.rule_tags(),
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::HttpStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body = response.bytes().await?;
        let output: AxeOutput = serde_json::from_slice(&body)
            .map_err(|e| AnalysisError::InvalidOutput(e.to_string()))?;

        let outcome = AnalysisOutcome::from_results(normalize_output(url, output));
        tracing::debug!(
            url,
            endpoint = %self.endpoint,
            issues = outcome.summary.total,
            "axe service analysis complete"
        );
        Ok(outcome)
    }
}
