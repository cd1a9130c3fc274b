//! axe-style engine output and its normalization into findings
//!
//! Both the HTTP service and the browser command speak the axe-core result
//! format; this module turns that format into [`NewFinding`]s.

use a11y_types::{NewFinding, Severity};
use serde::{Deserialize, Serialize};

/// Results for one page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxeResults {
    /// Page url as reported by the engine
    #[serde(default)]
    pub url: Option<String>,
    /// Failed rules
    #[serde(default)]
    pub violations: Vec<AxeViolation>,
}

/// One failed rule
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxeViolation {
    /// Rule id, e.g. `image-alt`
    pub id: String,
    /// Rule-level impact
    #[serde(default)]
    pub impact: Option<String>,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Short help message
    #[serde(default)]
    pub help: String,
    /// Link to rule documentation
    #[serde(default)]
    pub help_url: Option<String>,
    /// Compliance tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Offending elements
    #[serde(default)]
    pub nodes: Vec<AxeNode>,
}

/// One offending element
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxeNode {
    /// Element markup
    #[serde(default)]
    pub html: Option<String>,
    /// Selector chain; nested arrays cross shadow roots
    #[serde(default)]
    pub target: Vec<serde_json::Value>,
    /// Node-level impact
    #[serde(default)]
    pub impact: Option<String>,
    /// Human-readable fix summary
    #[serde(default)]
    pub failure_summary: Option<String>,
}

/// Engine output: the CLI emits an array, services usually a single object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxeOutput {
    /// One result object per page
    Many(Vec<AxeResults>),
    /// Single page result
    One(AxeResults),
}

impl AxeOutput {
    /// Flatten into page results
    #[must_use]
    pub fn into_pages(self) -> Vec<AxeResults> {
        match self {
            AxeOutput::Many(pages) => pages,
            AxeOutput::One(page) => vec![page],
        }
    }
}

/// Normalize engine output for the page at `url`
#[must_use]
pub fn normalize_output(url: &str, output: AxeOutput) -> Vec<NewFinding> {
    output
        .into_pages()
        .iter()
        .flat_map(|page| normalize_results(url, page))
        .collect()
}

/// Normalize one page result into findings, one per offending node
///
/// Findings are keyed to the requested `url`, not the engine-reported one,
/// so redirects do not change finding identity between scans.
#[must_use]
pub fn normalize_results(url: &str, results: &AxeResults) -> Vec<NewFinding> {
    let mut findings = Vec::new();
    for violation in &results.violations {
        let message = violation_message(violation);
        if violation.nodes.is_empty() {
            findings.push(base_finding(url, &message, violation, violation.impact.as_deref(), None));
            continue;
        }
        for node in &violation.nodes {
            let impact = node.impact.as_deref().or(violation.impact.as_deref());
            let mut finding = base_finding(url, &message, violation, impact, node.failure_summary.as_deref());
            finding.element = node.html.clone().filter(|html| !html.trim().is_empty());
            finding.element_path = selector_path(&node.target);
            findings.push(finding);
        }
    }
    findings
}

fn violation_message(violation: &AxeViolation) -> String {
    [&violation.help, &violation.description, &violation.id]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

fn base_finding(
    url: &str,
    message: &str,
    violation: &AxeViolation,
    impact: Option<&str>,
    failure_summary: Option<&str>,
) -> NewFinding {
    NewFinding {
        url: url.to_string(),
        message: message.to_string(),
        element: None,
        severity: Severity::from_impact(impact),
        impact: impact.map(str::to_string),
        help: violation.help_url.clone(),
        element_path: None,
        tags: violation.tags.clone(),
        details: Some(serde_json::json!({
            "ruleId": violation.id,
            "description": violation.description,
            "failureSummary": failure_summary,
        })),
    }
}

fn selector_path(target: &[serde_json::Value]) -> Option<String> {
    let parts: Vec<String> = target
        .iter()
        .filter_map(|segment| match segment {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(inner) => {
                let shadow: Vec<&str> = inner.iter().filter_map(serde_json::Value::as_str).collect();
                (!shadow.is_empty()).then(|| shadow.join(" >>> "))
            }
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(" > "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "url": "https://a.com/",
        "violations": [
            {
                "id": "image-alt",
                "impact": "critical",
                "description": "Ensures <img> elements have alternate text",
                "help": "Images must have alternate text",
                "helpUrl": "https://dequeuniversity.com/rules/axe/4.8/image-alt",
                "tags": ["cat.text-alternatives", "wcag2a", "wcag111", "section508"],
                "nodes": [
                    {"html": "<img src=\"a.png\">", "target": ["main", "img"], "impact": "critical",
                     "failureSummary": "Fix any of the following"},
                    {"html": "<img src=\"b.png\">", "target": [["my-widget", "img"]]}
                ]
            },
            {
                "id": "color-contrast",
                "impact": "serious",
                "description": "Ensures contrast",
                "help": "Elements must have sufficient color contrast",
                "tags": ["wcag2aa"],
                "nodes": []
            }
        ]
    }"#;

    #[test]
    fn normalizes_one_finding_per_node() {
        let results: AxeResults = serde_json::from_str(SAMPLE).unwrap();
        let findings = normalize_results("https://a.com", &results);

        assert_eq!(findings.len(), 3);

        let first = &findings[0];
        assert_eq!(first.url, "https://a.com");
        assert_eq!(first.message, "Images must have alternate text");
        assert_eq!(first.element.as_deref(), Some("<img src=\"a.png\">"));
        assert_eq!(first.severity, Severity::Critical);
        assert_eq!(first.element_path.as_deref(), Some("main > img"));
        assert_eq!(
            first.help.as_deref(),
            Some("https://dequeuniversity.com/rules/axe/4.8/image-alt")
        );
        assert!(first.tags.contains(&"wcag2a".to_string()));
        assert_eq!(first.details.as_ref().unwrap()["ruleId"], "image-alt");
    }

    #[test]
    fn node_without_impact_inherits_rule_impact() {
        let results: AxeResults = serde_json::from_str(SAMPLE).unwrap();
        let findings = normalize_results("https://a.com", &results);
        assert_eq!(findings[1].severity, Severity::Critical);
        assert_eq!(findings[1].element_path.as_deref(), Some("my-widget >>> img"));
    }

    #[test]
    fn violation_without_nodes_yields_single_finding() {
        let results: AxeResults = serde_json::from_str(SAMPLE).unwrap();
        let findings = normalize_results("https://a.com", &results);
        let contrast = &findings[2];
        assert_eq!(contrast.severity, Severity::Serious);
        assert!(contrast.element.is_none());
        assert!(contrast.element_path.is_none());
    }

    #[test]
    fn output_accepts_array_or_object() {
        let one: AxeOutput = serde_json::from_str(SAMPLE).unwrap();
        let many: AxeOutput = serde_json::from_str(&format!("[{SAMPLE}]")).unwrap();
        assert_eq!(normalize_output("https://a.com", one).len(), 3);
        assert_eq!(normalize_output("https://a.com", many).len(), 3);
    }

    #[test]
    fn message_falls_back_to_description_then_id() {
        let violation = AxeViolation {
            id: "region".into(),
            ..AxeViolation::default()
        };
        assert_eq!(violation_message(&violation), "region");
    }
}
