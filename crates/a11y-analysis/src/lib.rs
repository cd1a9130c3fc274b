//! A11y Analysis - accessibility analysis strategies
//!
//! Every rule engine is a black box behind the [`Analyzer`] trait. Concrete
//! strategies, in default preference order:
//!
//! - [`AxeServiceAnalyzer`]: posts the url to an axe-compatible HTTP service
//! - [`BrowserAnalyzer`]: runs an external browser-driven checker command
//! - [`HtmlValidatorAnalyzer`]: fetches the page and runs static HTML checks
//!
//! [`AnalyzerChain`] tries them in order; the first success wins and an
//! exhausted chain reports every failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use a11y_analysis::{build_chain, AnalysisConfig};
//! use a11y_types::ComplianceOptions;
//!
//! let chain = build_chain(&AnalysisConfig::default())?;
//! let success = chain.analyze("https://example.com", &ComplianceOptions::default()).await?;
//! println!("{} found {} issues", success.method, success.outcome.summary.total);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod analyzer;
mod axe;
mod axe_service;
mod browser;
mod chain;
mod config;
mod error;
mod html;

pub use analyzer::{AnalysisOutcome, Analyzer};
pub use axe::{normalize_output, normalize_results, AxeNode, AxeOutput, AxeResults, AxeViolation};
pub use axe_service::AxeServiceAnalyzer;
pub use browser::BrowserAnalyzer;
pub use chain::{AnalyzerChain, ChainExhausted, ChainSuccess, StrategyFailure};
pub use config::{
    build_chain, AnalysisConfig, AxeServiceConfig, BrowserConfig, HtmlValidatorConfig,
    STRATEGY_AXE_SERVICE, STRATEGY_BROWSER, STRATEGY_HTML_VALIDATOR,
};
pub use error::AnalysisError;
pub use html::{check_document, HtmlRule, HtmlValidatorAnalyzer};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
