//! Static HTML checks
//!
//! A last-resort strategy: the page is fetched once and a fixed set of
//! markup rules is run over the raw document. No script runs, so findings
//! carry no selector path.

use crate::analyzer::{AnalysisOutcome, Analyzer};
use crate::config::STRATEGY_HTML_VALIDATOR;
use crate::error::AnalysisError;
use a11y_types::{ComplianceOptions, NewFinding, Severity};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

/// Longest element snippet kept on a finding
const SNIPPET_LIMIT: usize = 300;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect("valid regex"));
    };
}

pattern!(IMG, r"(?is)<img\b([^>]*)>");
pattern!(HTML, r"(?is)<html\b([^>]*)>");
pattern!(TITLE, r"(?is)<title\b[^>]*>(.*?)</title\s*>");
pattern!(LINK, r"(?is)<a\b([^>]*)>(.*?)</a\s*>");
pattern!(BUTTON, r"(?is)<button\b([^>]*)>(.*?)</button\s*>");
pattern!(INPUT, r"(?is)<(?:input|select|textarea)\b([^>]*)>");
pattern!(LABEL, r"(?is)<label\b([^>]*)>.*?</label\s*>");
pattern!(META, r"(?is)<meta\b([^>]*)>");
pattern!(HEADING, r"(?is)<h([1-6])\b[^>]*>");
pattern!(TAG, r"(?s)<[^>]*>");
pattern!(
    ATTR,
    r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#
);
pattern!(MAX_SCALE, r"maximum-scale\s*=\s*([0-9.]+)");

/// A static markup rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HtmlRule {
    /// `<img>` without alternative text
    ImageAlt,
    /// `<html>` without a `lang`
    HtmlHasLang,
    /// Missing or empty `<title>`
    DocumentTitle,
    /// Link without discernible text
    LinkName,
    /// Button without discernible text
    ButtonName,
    /// Form control without a label
    Label,
    /// Viewport meta disabling zoom
    MetaViewport,
    /// Heading levels skipping a rank
    HeadingOrder,
}

impl HtmlRule {
    /// All rules in evaluation order
    pub const ALL: [HtmlRule; 8] = [
        HtmlRule::ImageAlt,
        HtmlRule::HtmlHasLang,
        HtmlRule::DocumentTitle,
        HtmlRule::LinkName,
        HtmlRule::ButtonName,
        HtmlRule::Label,
        HtmlRule::MetaViewport,
        HtmlRule::HeadingOrder,
    ];

    /// Rule id, shared with axe
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            HtmlRule::ImageAlt => "image-alt",
            HtmlRule::HtmlHasLang => "html-has-lang",
            HtmlRule::DocumentTitle => "document-title",
            HtmlRule::LinkName => "link-name",
            HtmlRule::ButtonName => "button-name",
            HtmlRule::Label => "label",
            HtmlRule::MetaViewport => "meta-viewport",
            HtmlRule::HeadingOrder => "heading-order",
        }
    }

    /// Severity of a violation
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            HtmlRule::ImageAlt | HtmlRule::ButtonName | HtmlRule::Label => Severity::Critical,
            HtmlRule::HtmlHasLang
            | HtmlRule::DocumentTitle
            | HtmlRule::LinkName
            | HtmlRule::MetaViewport => Severity::Serious,
            HtmlRule::HeadingOrder => Severity::Moderate,
        }
    }

    /// Compliance tags
    #[must_use]
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            HtmlRule::ImageAlt => &["wcag2a", "wcag111", "section508"],
            HtmlRule::HtmlHasLang => &["wcag2a", "wcag311"],
            HtmlRule::DocumentTitle => &["wcag2a", "wcag242"],
            HtmlRule::LinkName => &["wcag2a", "wcag244", "wcag412", "section508"],
            HtmlRule::ButtonName => &["wcag2a", "wcag412", "section508"],
            HtmlRule::Label => &["wcag2a", "wcag131", "wcag412", "section508"],
            HtmlRule::MetaViewport => &["wcag2aa", "wcag144"],
            HtmlRule::HeadingOrder => &["best-practice"],
        }
    }

    /// Message recorded on findings
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            HtmlRule::ImageAlt => "Images must have alternate text",
            HtmlRule::HtmlHasLang => "<html> element must have a lang attribute",
            HtmlRule::DocumentTitle => "Documents must have <title> element to aid in navigation",
            HtmlRule::LinkName => "Links must have discernible text",
            HtmlRule::ButtonName => "Buttons must have discernible text",
            HtmlRule::Label => "Form elements must have labels",
            HtmlRule::MetaViewport => "Zooming and scaling must not be disabled",
            HtmlRule::HeadingOrder => "Heading levels should only increase by one",
        }
    }

    fn finding(self, url: &str, element: Option<&str>) -> NewFinding {
        let severity = self.severity();
        let mut finding = NewFinding::new(url, self.message(), severity)
            .with_impact(severity.as_str())
            .with_help(format!(
                "https://dequeuniversity.com/rules/axe/4.8/{}",
                self.id()
            ))
            .with_tags(self.tags().iter().copied())
            .with_details(serde_json::json!({
                "ruleId": self.id(),
                "source": STRATEGY_HTML_VALIDATOR,
            }));
        finding.element = element.map(snippet);
        finding
    }
}

/// Run every enabled rule over `html`
#[must_use]
pub fn check_document(url: &str, html: &str, options: &ComplianceOptions) -> Vec<NewFinding> {
    let mut findings = Vec::new();
    for rule in HtmlRule::ALL {
        if options.enables_any(rule.tags()) {
            check_rule(rule, url, html, &mut findings);
        }
    }
    findings
}

fn check_rule(rule: HtmlRule, url: &str, html: &str, out: &mut Vec<NewFinding>) {
    match rule {
        HtmlRule::ImageAlt => {
            for caps in IMG.captures_iter(html) {
                let attrs = attributes(&caps[1]);
                let decorative = attrs
                    .get("role")
                    .is_some_and(|r| r == "presentation" || r == "none");
                if !attrs.contains_key("alt") && !decorative && !has_aria_name(&attrs) {
                    out.push(rule.finding(url, Some(&caps[0])));
                }
            }
        }
        HtmlRule::HtmlHasLang => {
            if let Some(caps) = HTML.captures(html) {
                let attrs = attributes(&caps[1]);
                if attrs.get("lang").map_or(true, |l| l.trim().is_empty()) {
                    out.push(rule.finding(url, Some(&caps[0])));
                }
            }
        }
        HtmlRule::DocumentTitle => {
            let titled = TITLE
                .captures(html)
                .is_some_and(|caps| !visible_text(&caps[1]).is_empty());
            if !titled {
                out.push(rule.finding(url, None));
            }
        }
        HtmlRule::LinkName => {
            for caps in LINK.captures_iter(html) {
                let attrs = attributes(&caps[1]);
                if !attrs.contains_key("href") {
                    continue;
                }
                if !has_accessible_name(&attrs, &caps[2]) {
                    out.push(rule.finding(url, Some(&caps[0])));
                }
            }
        }
        HtmlRule::ButtonName => {
            for caps in BUTTON.captures_iter(html) {
                let attrs = attributes(&caps[1]);
                if !has_accessible_name(&attrs, &caps[2]) {
                    out.push(rule.finding(url, Some(&caps[0])));
                }
            }
        }
        HtmlRule::Label => check_labels(url, html, out),
        HtmlRule::MetaViewport => {
            for caps in META.captures_iter(html) {
                let attrs = attributes(&caps[1]);
                if !attrs.get("name").is_some_and(|n| n.eq_ignore_ascii_case("viewport")) {
                    continue;
                }
                let content = attrs.get("content").map(|c| c.to_ascii_lowercase());
                if content.as_deref().is_some_and(blocks_zoom) {
                    out.push(rule.finding(url, Some(&caps[0])));
                }
            }
        }
        HtmlRule::HeadingOrder => {
            let mut previous: Option<u32> = None;
            for caps in HEADING.captures_iter(html) {
                let level: u32 = caps[1].parse().unwrap_or(1);
                if previous.is_some_and(|p| level > p + 1) {
                    out.push(rule.finding(url, Some(&caps[0])));
                }
                previous = Some(level);
            }
        }
    }
}

fn check_labels(url: &str, html: &str, out: &mut Vec<NewFinding>) {
    let mut labelled_ids = Vec::new();
    let mut wrapping: Vec<Range<usize>> = Vec::new();
    for caps in LABEL.captures_iter(html) {
        if let Some(whole) = caps.get(0) {
            wrapping.push(whole.range());
        }
        if let Some(target) = attributes(&caps[1]).remove("for") {
            labelled_ids.push(target);
        }
    }

    for caps in INPUT.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        let attrs = attributes(&caps[1]);
        let exempt = attrs.get("type").is_some_and(|t| {
            matches!(
                t.to_ascii_lowercase().as_str(),
                "hidden" | "submit" | "button" | "reset" | "image"
            )
        });
        if exempt || has_aria_name(&attrs) || attrs.contains_key("title") {
            continue;
        }
        let by_for = attrs.get("id").is_some_and(|id| labelled_ids.contains(id));
        let wrapped = wrapping.iter().any(|r| r.contains(&whole.start()));
        if !by_for && !wrapped {
            out.push(HtmlRule::Label.finding(url, Some(whole.as_str())));
        }
    }
}

fn blocks_zoom(content: &str) -> bool {
    let no_scaling = content
        .split(',')
        .map(|part| part.split('=').map(str::trim).collect::<Vec<_>>())
        .any(|kv| kv.first() == Some(&"user-scalable") && matches!(kv.get(1), Some(&"no" | &"0")));
    let capped = MAX_SCALE
        .captures(content)
        .and_then(|caps| caps[1].parse::<f32>().ok())
        .is_some_and(|scale| scale < 2.0);
    no_scaling || capped
}

/// Lowercased attribute names mapped to their values; bare attributes map to ""
fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR.captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (caps[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

fn has_aria_name(attrs: &HashMap<String, String>) -> bool {
    ["aria-label", "aria-labelledby"]
        .iter()
        .any(|name| attrs.get(*name).is_some_and(|v| !v.trim().is_empty()))
}

fn has_accessible_name(attrs: &HashMap<String, String>, inner: &str) -> bool {
    if has_aria_name(attrs) || attrs.get("title").is_some_and(|t| !t.trim().is_empty()) {
        return true;
    }
    if !visible_text(inner).is_empty() {
        return true;
    }
    IMG.captures_iter(inner).any(|caps| {
        attributes(&caps[1])
            .get("alt")
            .is_some_and(|alt| !alt.trim().is_empty())
    })
}

fn visible_text(fragment: &str) -> String {
    TAG.replace_all(fragment, "")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

fn snippet(element: &str) -> String {
    if element.len() <= SNIPPET_LIMIT {
        return element.to_string();
    }
    let cut = (0..=SNIPPET_LIMIT)
        .rev()
        .find(|i| element.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &element[..cut])
}

/// Fetches the page over HTTP and runs [`check_document`]
#[derive(Debug, Clone)]
pub struct HtmlValidatorAnalyzer {
    client: reqwest::Client,
}

impl HtmlValidatorAnalyzer {
    /// Create a validator with a fetch timeout
    ///
    /// # Errors
    /// Returns [`AnalysisError::Network`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Analyzer for HtmlValidatorAnalyzer {
    fn name(&self) -> &'static str {
        STRATEGY_HTML_VALIDATOR
    }

    async fn analyze(
        &self,
        url: &str,
        options: &ComplianceOptions,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| AnalysisError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AnalysisError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;

        Ok(AnalysisOutcome::from_results(check_document(
            url, &body, options,
        )))
    }
}
