//! Strategy configuration and chain assembly

use crate::analyzer::Analyzer;
use crate::axe_service::AxeServiceAnalyzer;
use crate::browser::BrowserAnalyzer;
use crate::chain::AnalyzerChain;
use crate::error::AnalysisError;
use crate::html::HtmlValidatorAnalyzer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Name of the HTTP axe service strategy
pub const STRATEGY_AXE_SERVICE: &str = "axe-service";
/// Name of the browser command strategy
pub const STRATEGY_BROWSER: &str = "browser";
/// Name of the static HTML strategy
pub const STRATEGY_HTML_VALIDATOR: &str = "html-validator";

/// Analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Strategy preference order
    pub strategies: Vec<String>,
    /// HTTP axe service
    pub axe_service: AxeServiceConfig,
    /// Browser command
    pub browser: BrowserConfig,
    /// Static HTML checks
    pub html_validator: HtmlValidatorConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                STRATEGY_AXE_SERVICE.to_string(),
                STRATEGY_BROWSER.to_string(),
                STRATEGY_HTML_VALIDATOR.to_string(),
            ],
            axe_service: AxeServiceConfig::default(),
            browser: BrowserConfig::default(),
            html_validator: HtmlValidatorConfig::default(),
        }
    }
}

/// HTTP axe service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxeServiceConfig {
    /// Endpoint accepting `{url, tags}`; strategy is skipped when unset
    pub endpoint: Option<String>,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for AxeServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 60,
        }
    }
}

impl AxeServiceConfig {
    /// Request timeout as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Browser command settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Checker executable; strategy is skipped when unset
    pub command: Option<String>,
    /// Argument templates; `{url}` and `{tags}` are substituted
    pub args: Vec<String>,
    /// Process timeout
    pub timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: ["{url}", "--tags", "{tags}", "--stdout"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 90,
        }
    }
}

impl BrowserConfig {
    /// Process timeout as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Static HTML check settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlValidatorConfig {
    /// Whether the strategy takes part in the chain
    pub enabled: bool,
    /// Page fetch timeout
    pub timeout_secs: u64,
    /// User agent sent when fetching pages
    pub user_agent: String,
}

impl Default for HtmlValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            user_agent: format!("a11y-scan/{}", crate::VERSION),
        }
    }
}

impl HtmlValidatorConfig {
    /// Fetch timeout as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Assemble the strategy chain in configured order
///
/// Strategies without the settings they need are skipped.
///
/// # Errors
/// Returns [`AnalysisError::Unavailable`] for an unknown strategy name or when
/// no strategy remains, and propagates client construction failures.
pub fn build_chain(config: &AnalysisConfig) -> Result<AnalyzerChain, AnalysisError> {
    let mut strategies: Vec<Arc<dyn Analyzer>> = Vec::with_capacity(config.strategies.len());

    for name in &config.strategies {
        match name.as_str() {
            STRATEGY_AXE_SERVICE => match &config.axe_service.endpoint {
                Some(endpoint) => strategies.push(Arc::new(AxeServiceAnalyzer::new(
                    endpoint.clone(),
                    config.axe_service.timeout(),
                )?)),
                None => tracing::debug!(strategy = %name, "skipping strategy: no endpoint"),
            },
            STRATEGY_BROWSER => match &config.browser.command {
                Some(command) => strategies.push(Arc::new(
                    BrowserAnalyzer::new(command.clone(), config.browser.timeout())
                        .with_args(config.browser.args.clone()),
                )),
                None => tracing::debug!(strategy = %name, "skipping strategy: no command"),
            },
            STRATEGY_HTML_VALIDATOR => {
                if config.html_validator.enabled {
                    strategies.push(Arc::new(HtmlValidatorAnalyzer::new(
                        config.html_validator.timeout(),
                        &config.html_validator.user_agent,
                    )?));
                } else {
                    tracing::debug!(strategy = %name, "skipping strategy: disabled");
                }
            }
            other => {
                return Err(AnalysisError::Unavailable(format!(
                    "unknown strategy '{other}'"
                )))
            }
        }
    }

    AnalyzerChain::new(strategies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_chain_keeps_only_configured_strategies() {
        let chain = build_chain(&AnalysisConfig::default()).unwrap();
        assert_eq!(chain.names(), vec![STRATEGY_HTML_VALIDATOR]);
    }

    #[test]
    fn chain_follows_configured_order() {
        let config = AnalysisConfig {
            strategies: vec![
                STRATEGY_BROWSER.to_string(),
                STRATEGY_HTML_VALIDATOR.to_string(),
                STRATEGY_AXE_SERVICE.to_string(),
            ],
            axe_service: AxeServiceConfig {
                endpoint: Some("http://localhost:9000/analyze".into()),
                ..AxeServiceConfig::default()
            },
            browser: BrowserConfig {
                command: Some("axe".into()),
                ..BrowserConfig::default()
            },
            html_validator: HtmlValidatorConfig::default(),
        };
        let chain = build_chain(&config).unwrap();
        assert_eq!(
            chain.names(),
            vec![STRATEGY_BROWSER, STRATEGY_HTML_VALIDATOR, STRATEGY_AXE_SERVICE]
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let config = AnalysisConfig {
            strategies: vec!["lighthouse".into()],
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            build_chain(&config),
            Err(AnalysisError::Unavailable(msg)) if msg.contains("lighthouse")
        ));
    }

    #[test]
    fn empty_chain_is_unavailable() {
        let config = AnalysisConfig {
            html_validator: HtmlValidatorConfig {
                enabled: false,
                ..HtmlValidatorConfig::default()
            },
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            build_chain(&config),
            Err(AnalysisError::Unavailable(_))
        ));
    }

    #[test]
    fn deserializes_partial_toml_style_json() {
        let config: AnalysisConfig = serde_json::from_value(serde_json::json!({
            "axe_service": { "endpoint": "http://axe:3000" }
        }))
        .unwrap();
        assert_eq!(config.axe_service.timeout_secs, 60);
        assert_eq!(config.strategies.len(), 3);
    }
}
