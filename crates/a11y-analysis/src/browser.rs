//! Browser-driven checker run as an external command

use crate::analyzer::{AnalysisOutcome, Analyzer};
use crate::axe::{normalize_output, AxeOutput};
use crate::config::STRATEGY_BROWSER;
use crate::error::AnalysisError;
use a11y_types::ComplianceOptions;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Longest stderr excerpt carried in an error
const STDERR_LIMIT: usize = 2048;

/// Runs an axe-compatible CLI and parses its JSON stdout
///
/// Argument templates may contain `{url}` and `{tags}` (comma-separated rule
/// tags). The child is killed if the timeout elapses.
#[derive(Debug, Clone)]
pub struct BrowserAnalyzer {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl BrowserAnalyzer {
    /// Create an analyzer running `command` with the default arguments
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args: crate::config::BrowserConfig::default().args,
            timeout,
        }
    }

    /// With argument templates
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn render_args(&self, url: &str, options: &ComplianceOptions) -> Vec<String> {
        let tags = options.rule_tags().join(",");
        self.args
            .iter()
            .map(|arg| arg.replace("{url}", url).replace("{tags}", &tags))
            .collect()
    }
}

#[async_trait]
impl Analyzer for BrowserAnalyzer {
    fn name(&self) -> &'static str {
        STRATEGY_BROWSER
    }

    async fn analyze(
        &self,
        url: &str,
        options: &ComplianceOptions,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let args = self.render_args(url, options);
        tracing::debug!(command = %self.command, ?args, "running browser checker");

        let child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    AnalysisError::Unavailable(format!("{} not found", self.command))
                }
                _ => AnalysisError::Process {
                    code: None,
                    stderr: e.to_string(),
                },
            })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| AnalysisError::Process {
                code: None,
                stderr: e.to_string(),
            })?,
            Err(_) => {
                return Err(AnalysisError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut stderr = stderr.trim().to_string();
            if stderr.len() > STDERR_LIMIT {
                let cut = (0..=STDERR_LIMIT)
                    .rev()
                    .find(|i| stderr.is_char_boundary(*i))
                    .unwrap_or(0);
                stderr.truncate(cut);
            }
            return Err(AnalysisError::Process {
                code: output.status.code(),
                stderr,
            });
        }

        let parsed: AxeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| AnalysisError::InvalidOutput(e.to_string()))?;
        Ok(AnalysisOutcome::from_results(normalize_output(url, parsed)))
    }
}
