//! Report export
//!
//! Binary formats are produced by external renderers plugged into a
//! [`RendererRegistry`]; only JSON ships built in.

use a11y_types::{Finding, ScanSummary, Severity};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// JSON document
    Json,
    /// Spreadsheet
    Excel,
    /// PDF document
    Pdf,
}

impl ReportFormat {
    /// Lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Excel => "excel",
            ReportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "excel" | "xlsx" => Ok(ReportFormat::Excel),
            "pdf" => Ok(ReportFormat::Pdf),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Report errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    /// Format label not recognized
    #[error("unknown report format: {0}")]
    UnknownFormat(String),

    /// No renderer installed for the format
    #[error("no renderer installed for {0} reports")]
    Unsupported(ReportFormat),

    /// Renderer failed
    #[error("report rendering failed: {0}")]
    Render(String),
}

/// What to render
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    /// Output format
    pub format: ReportFormat,
    /// Findings to include, already filtered and sorted
    pub findings: Vec<Finding>,
    /// Embed element screenshots where the renderer supports them
    pub include_screenshots: bool,
    /// Group findings by severity
    pub organize_by_severity: bool,
    /// Document title
    pub title: String,
}

impl ReportRequest {
    /// Request with default presentation options
    #[must_use]
    pub fn new(format: ReportFormat, findings: Vec<Finding>) -> Self {
        Self {
            format,
            findings,
            include_screenshots: false,
            organize_by_severity: false,
            title: "Accessibility report".to_string(),
        }
    }

    /// With severity grouping
    #[inline]
    #[must_use]
    pub fn with_organize_by_severity(mut self, enabled: bool) -> Self {
        self.organize_by_severity = enabled;
        self
    }

    /// With screenshots
    #[inline]
    #[must_use]
    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.include_screenshots = enabled;
        self
    }

    /// With title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Rendered document ready for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    /// MIME type
    pub content_type: &'static str,
    /// Suggested file name
    pub file_name: String,
    /// Document bytes
    pub body: Vec<u8>,
}

/// Renders findings into one format
pub trait ReportRenderer: Send + Sync {
    /// Format produced
    fn format(&self) -> ReportFormat;

    /// Render `request`
    ///
    /// # Errors
    /// Returns [`ReportError::Render`] when the document cannot be produced.
    fn render(&self, request: &ReportRequest) -> Result<RenderedReport, ReportError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    title: &'a str,
    generated_at: chrono::DateTime<Utc>,
    summary: ScanSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    findings: Option<&'a [Finding]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    by_severity: Option<Vec<SeverityGroup<'a>>>,
}

#[derive(Serialize)]
struct SeverityGroup<'a> {
    severity: Severity,
    findings: Vec<&'a Finding>,
}

/// Built-in JSON renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }

    fn render(&self, request: &ReportRequest) -> Result<RenderedReport, ReportError> {
        let summary = ScanSummary::from_severities(request.findings.iter().map(|f| f.severity));
        let by_severity = request.organize_by_severity.then(|| {
            Severity::ALL
                .iter()
                .map(|&severity| SeverityGroup {
                    severity,
                    findings: request
                        .findings
                        .iter()
                        .filter(|f| f.severity == severity)
                        .collect(),
                })
                .filter(|group| !group.findings.is_empty())
                .collect()
        });
        let report = JsonReport {
            title: &request.title,
            generated_at: Utc::now(),
            summary,
            findings: (!request.organize_by_severity).then_some(request.findings.as_slice()),
            by_severity,
        };

        let body = serde_json::to_vec_pretty(&report).map_err(|e| ReportError::Render(e.to_string()))?;
        Ok(RenderedReport {
            content_type: "application/json",
            file_name: format!("accessibility-report-{}.json", Utc::now().format("%Y%m%d-%H%M%S")),
            body,
        })
    }
}

/// Renderers by format
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<ReportFormat, Arc<dyn ReportRenderer>>,
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

impl RendererRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in renderers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonRenderer));
        registry
    }

    /// Install or replace the renderer for its format
    pub fn register(&mut self, renderer: Arc<dyn ReportRenderer>) {
        self.renderers.insert(renderer.format(), renderer);
    }

    /// Installed formats
    #[must_use]
    pub fn formats(&self) -> Vec<ReportFormat> {
        let mut formats: Vec<_> = self.renderers.keys().copied().collect();
        formats.sort_by_key(ReportFormat::as_str);
        formats
    }

    /// Render with the renderer for `request.format`
    ///
    /// # Errors
    /// [`ReportError::Unsupported`] if none is installed.
    pub fn render(&self, request: &ReportRequest) -> Result<RenderedReport, ReportError> {
        let renderer = self
            .renderers
            .get(&request.format)
            .ok_or(ReportError::Unsupported(request.format))?;
        let report = renderer.render(request)?;
        tracing::debug!(
            format = %request.format,
            findings = request.findings.len(),
            bytes = report.body.len(),
            "report rendered"
        );
        Ok(report)
    }
}
