//! Server configuration
//!
//! Layers, later wins:
//! 1. Built-in defaults
//! 2. TOML file given with `--config`
//! 3. Environment (`A11Y_BIND`, `A11Y_AXE_ENDPOINT`, `A11Y_BROWSER_COMMAND`,
//!    `DATABASE_URL`, `A11Y_SCAN_TIMEOUT_SECS`)
//! 4. Command-line flags

use a11y_analysis::{AnalysisConfig, AxeServiceConfig, BrowserConfig, HtmlValidatorConfig};
use a11y_core::ScanConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// I/O cause
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`AppConfig`]
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser cause
        #[source]
        source: toml::de::Error,
    },

    /// Environment variable holds an unusable value
    #[error("invalid value for {key}: {value}")]
    Env {
        /// Variable name
        key: &'static str,
        /// Rejected value
        value: String,
    },
}

/// Command-line flags
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "a11y-server", version, about = "Accessibility scan dashboard API")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Axe-compatible analysis endpoint
    #[arg(long)]
    pub axe_endpoint: Option<String>,

    /// Browser checker executable
    #[arg(long)]
    pub browser_command: Option<String>,

    /// Postgres connection url
    #[arg(long)]
    pub database_url: Option<String>,

    /// Overall deadline per scan in seconds
    #[arg(long)]
    pub scan_timeout_secs: Option<u64>,

    /// Maximum concurrent analyses
    #[arg(long)]
    pub max_concurrent_scans: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// JSON log output
    pub log_json: bool,
    /// Seconds to wait for running scans on shutdown
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_json: false,
            shutdown_grace_secs: 30,
        }
    }
}

/// Scan orchestration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Overall deadline per scan in seconds
    pub timeout_secs: u64,
    /// Maximum concurrent analyses
    pub max_concurrent_scans: usize,
    /// Strategy preference order
    pub strategies: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        let scan = ScanConfig::default();
        Self {
            timeout_secs: scan.scan_timeout_secs,
            max_concurrent_scans: scan.max_concurrent_scans,
            strategies: AnalysisConfig::default().strategies,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres url; the in-memory store is used when unset
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Orchestration
    pub scan: ScanSection,
    /// Axe service strategy
    pub axe: AxeServiceConfig,
    /// Browser strategy
    pub browser: BrowserConfig,
    /// Static HTML strategy
    pub html: HtmlValidatorConfig,
    /// Persistence
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every layer for `cli`
    ///
    /// # Errors
    /// Returns [`ConfigError`] for an unreadable or invalid file or a bad
    /// environment value.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config
            .with_env(|key| std::env::var(key).ok())?
            .with_cli(cli))
    }

    /// Parse a TOML file over the defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// # Errors
    /// Returns [`ConfigError::Env`] for an unparsable address or number.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("A11Y_BIND") {
            self.server.bind = value.parse().map_err(|_| ConfigError::Env {
                key: "A11Y_BIND",
                value,
            })?;
        }
        if let Some(value) = lookup("A11Y_AXE_ENDPOINT") {
            self.axe.endpoint = Some(value);
        }
        if let Some(value) = lookup("A11Y_BROWSER_COMMAND") {
            self.browser.command = Some(value);
        }
        if let Some(value) = lookup("DATABASE_URL") {
            self.database.url = Some(value);
        }
        if let Some(value) = lookup("A11Y_SCAN_TIMEOUT_SECS") {
            self.scan.timeout_secs = value.parse().map_err(|_| ConfigError::Env {
                key: "A11Y_SCAN_TIMEOUT_SECS",
                value,
            })?;
        }
        Ok(self)
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.server.bind = bind;
        }
        if let Some(endpoint) = &cli.axe_endpoint {
            self.axe.endpoint = Some(endpoint.clone());
        }
        if let Some(command) = &cli.browser_command {
            self.browser.command = Some(command.clone());
        }
        if let Some(url) = &cli.database_url {
            self.database.url = Some(url.clone());
        }
        if let Some(secs) = cli.scan_timeout_secs {
            self.scan.timeout_secs = secs;
        }
        if let Some(max) = cli.max_concurrent_scans {
            self.scan.max_concurrent_scans = max;
        }
        if cli.log_json {
            self.server.log_json = true;
        }
        self
    }

    /// With listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.server.bind = bind;
        self
    }

    /// With axe service endpoint
    #[must_use]
    pub fn with_axe_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.axe.endpoint = Some(endpoint.into());
        self
    }

    /// With strategy order
    #[must_use]
    pub fn with_strategies<I, S>(mut self, strategies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scan.strategies = strategies.into_iter().map(Into::into).collect();
        self
    }

    /// Orchestrator settings
    #[must_use]
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::new()
            .with_scan_timeout(self.scan.timeout_secs)
            .with_max_concurrent_scans(self.scan.max_concurrent_scans)
    }

    /// Analyzer chain settings
    #[must_use]
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            strategies: self.scan.strategies.clone(),
            axe_service: self.axe.clone(),
            browser: self.browser.clone(),
            html_validator: self.html.clone(),
        }
    }

    /// Shutdown grace period
    #[inline]
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = AppConfig::new();
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.scan.timeout_secs, 300);
        assert_eq!(
            config.scan.strategies,
            vec!["axe-service", "browser", "html-validator"]
        );
        assert!(config.database.url.is_none());
    }

    #[test]
    fn file_then_env_then_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "0.0.0.0:9000"

[scan]
timeout_secs = 60
strategies = ["html-validator"]

[axe]
endpoint = "http://from-file:3000/analyze"
"#
        )
        .unwrap();

        let from_file = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(from_file.server.bind.port(), 9000);
        assert_eq!(from_file.scan.strategies, vec!["html-validator"]);
        assert_eq!(from_file.scan.max_concurrent_scans, 4);

        let env: HashMap<&str, &str> = HashMap::from([
            ("A11Y_AXE_ENDPOINT", "http://from-env:3000/analyze"),
            ("A11Y_SCAN_TIMEOUT_SECS", "120"),
        ]);
        let with_env = from_file
            .with_env(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(with_env.axe.endpoint.as_deref(), Some("http://from-env:3000/analyze"));
        assert_eq!(with_env.scan.timeout_secs, 120);

        let cli = Cli {
            scan_timeout_secs: Some(15),
            log_json: true,
            ..Cli::default()
        };
        let final_config = with_env.with_cli(&cli);
        assert_eq!(final_config.scan.timeout_secs, 15);
        assert!(final_config.server.log_json);
        assert_eq!(final_config.server.bind.port(), 9000);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let err = AppConfig::new()
            .with_env(|k| (k == "A11Y_BIND").then(|| "not-an-address".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "A11Y_BIND", .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/a11y.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn derived_configs() {
        let config = AppConfig::new().with_axe_endpoint("http://axe").with_strategies(["axe-service"]);
        let analysis = config.analysis_config();
        assert_eq!(analysis.strategies, vec!["axe-service"]);
        assert_eq!(analysis.axe_service.endpoint.as_deref(), Some("http://axe"));
        assert_eq!(config.scan_config().scan_timeout_secs, 300);
    }
}
