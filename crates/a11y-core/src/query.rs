//! Aggregated result queries
//!
//! Findings of a project's completed scans are deduplicated by identity key,
//! filtered, sorted and paginated here. Counts are taken from the filtered
//! set before pagination.

use crate::error::ValidationError;
use a11y_reconcile::IdentityKey;
use a11y_types::{ComplianceFilter, Finding, ScanSummary, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default page size
pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Largest accepted page size
pub const MAX_PAGE_SIZE: usize = 100;

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Most severe first, then most recent
    #[default]
    Severity,
    /// Url ascending, then most recent
    Url,
    /// Most recently updated first
    Recent,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortBy::Severity => "severity",
            SortBy::Url => "url",
            SortBy::Recent => "recent",
        })
    }
}

impl FromStr for SortBy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "severity" => Ok(SortBy::Severity),
            "url" => Ok(SortBy::Url),
            "recent" | "date" => Ok(SortBy::Recent),
            other => Err(ValidationError::new(
                "sortBy",
                format!("unknown sort order '{other}'"),
            )),
        }
    }
}

/// Raw query-string parameters, comma-separated lists unparsed
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultParams {
    /// 1-based page
    pub page: Option<usize>,
    /// Items per page
    pub page_size: Option<usize>,
    /// `severity`, `url` or `recent`
    pub sort_by: Option<String>,
    /// Case-insensitive substring
    pub search: Option<String>,
    /// Comma-separated severities
    pub severity_filters: Option<String>,
    /// Comma-separated compliance filters
    pub compliance_filters: Option<String>,
}

/// Parsed result query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultQuery {
    /// 1-based page
    pub page: usize,
    /// Items per page, `1..=MAX_PAGE_SIZE`
    pub page_size: usize,
    /// Ordering
    pub sort_by: SortBy,
    /// Lowercased search text
    pub search: Option<String>,
    /// Severities to keep; all when empty
    pub severity_filters: Vec<Severity>,
    /// Standards to keep; all when empty
    pub compliance_filters: Vec<ComplianceFilter>,
}

impl Default for ResultQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: SortBy::default(),
            search: None,
            severity_filters: Vec::new(),
            compliance_filters: Vec::new(),
        }
    }
}

impl ResultQuery {
    /// Query with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With page and page size (clamped)
    #[must_use]
    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page.max(1);
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// With ordering
    #[inline]
    #[must_use]
    pub fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// With search text
    #[must_use]
    pub fn with_search(mut self, search: impl AsRef<str>) -> Self {
        let search = search.as_ref().trim();
        self.search = (!search.is_empty()).then(|| search.to_lowercase());
        self
    }

    /// With severity filters
    #[must_use]
    pub fn with_severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.severity_filters = severities.into_iter().collect();
        self
    }

    /// With compliance filters
    #[must_use]
    pub fn with_compliance(mut self, filters: impl IntoIterator<Item = ComplianceFilter>) -> Self {
        self.compliance_filters = filters.into_iter().collect();
        self
    }

    /// Whether `finding` passes search and filters
    #[must_use]
    pub fn matches(&self, finding: &Finding) -> bool {
        if !self.severity_filters.is_empty() && !self.severity_filters.contains(&finding.severity) {
            return false;
        }
        if !self.compliance_filters.is_empty()
            && !self
                .compliance_filters
                .iter()
                .any(|filter| filter.matches(&finding.tags))
        {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => [
                Some(finding.message.as_str()),
                Some(finding.url.as_str()),
                finding.element.as_deref(),
                finding.help.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }

    /// Dedupe, filter and sort without paginating
    #[must_use]
    pub fn select(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let mut selected: Vec<Finding> = dedupe_latest(findings)
            .into_iter()
            .filter(|f| self.matches(f))
            .collect();
        sort_findings(&mut selected, self.sort_by);
        selected
    }

    /// Dedupe, filter, sort and paginate
    #[must_use]
    pub fn apply(&self, findings: Vec<Finding>) -> ResultPage {
        let selected = self.select(findings);
        let summary = ScanSummary::from_severities(selected.iter().map(|f| f.severity));
        let total = selected.len();
        // fields are public, so a literal may carry zeros
        let page = self.page.max(1);
        let page_size = self.page_size.max(1);
        let total_pages = total.div_ceil(page_size);
        let results = selected
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        ResultPage {
            results,
            summary,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

impl TryFrom<ResultParams> for ResultQuery {
    type Error = ValidationError;

    fn try_from(params: ResultParams) -> Result<Self, Self::Error> {
        let mut query = ResultQuery::new().with_page(
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(sort_by) = params.sort_by.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.with_sort(sort_by.parse()?);
        }
        if let Some(search) = params.search {
            query = query.with_search(search);
        }
        if let Some(raw) = params.severity_filters.as_deref() {
            query = query.with_severities(parse_list(raw, "severityFilters")?);
        }
        if let Some(raw) = params.compliance_filters.as_deref() {
            query = query.with_compliance(parse_list(raw, "complianceFilters")?);
        }
        Ok(query)
    }
}

fn parse_list<T>(raw: &str, field: &'static str) -> Result<Vec<T>, ValidationError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e: T::Err| ValidationError::new(field, e.to_string())))
        .collect()
}

/// One page of aggregated findings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    /// Findings on this page
    pub results: Vec<Finding>,
    /// Severity counts over every matching finding
    pub summary: ScanSummary,
    /// Matching findings
    pub total: usize,
    /// 1-based page
    pub page: usize,
    /// Items per page
    pub page_size: usize,
    /// Pages available; 0 when nothing matched
    pub total_pages: usize,
}

/// Keep the most recently updated finding per identity key
///
/// First-seen order is preserved.
#[must_use]
pub fn dedupe_latest(findings: Vec<Finding>) -> Vec<Finding> {
    let mut slots: HashMap<IdentityKey, usize> = HashMap::with_capacity(findings.len());
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    for finding in findings {
        match slots.entry(IdentityKey::of(&finding)) {
            std::collections::hash_map::Entry::Occupied(slot) => {
                let current = &mut kept[*slot.get()];
                if finding.updated_at > current.updated_at {
                    *current = finding;
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(finding);
            }
        }
    }
    kept
}

fn sort_findings(findings: &mut [Finding], sort_by: SortBy) {
    match sort_by {
        SortBy::Severity => findings.sort_by(|a, b| {
            b.severity
                .rank()
                .cmp(&a.severity.rank())
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        }),
        SortBy::Url => findings.sort_by(|a, b| {
            a.url
                .cmp(&b.url)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        }),
        SortBy::Recent => findings.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a11y_types::{NewFinding, ScanId};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn finding(url: &str, message: &str, severity: Severity, age_mins: i64) -> Finding {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Finding::from_new(
            ScanId::new(),
            NewFinding::new(url, message, severity).with_tags(["wcag2a"]),
            base - Duration::minutes(age_mins),
        )
    }

    #[test]
    fn dedupe_keeps_most_recent() {
        let old = finding("https://a.com", "Missing alt", Severity::Critical, 10);
        let mut new = finding("https://a.com", "Missing alt", Severity::Critical, 1);
        new.help = Some("fresh".into());

        let kept = dedupe_latest(vec![old, new.clone()]);
        assert_eq!(kept, vec![new]);
    }

    #[test]
    fn severity_sort_breaks_ties_by_recency() {
        let page = ResultQuery::new().apply(vec![
            finding("https://a.com", "minor", Severity::Minor, 0),
            finding("https://a.com", "old critical", Severity::Critical, 5),
            finding("https://a.com", "new critical", Severity::Critical, 1),
        ]);
        let messages: Vec<_> = page.results.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, ["new critical", "old critical", "minor"]);
    }

    #[test]
    fn summary_counts_filtered_set_before_pagination() {
        let findings: Vec<Finding> = (0..25)
            .map(|i| {
                let severity = if i % 5 == 0 { Severity::Serious } else { Severity::Minor };
                finding(&format!("https://a.com/{i}"), "x", severity, i)
            })
            .collect();

        let page = ResultQuery::new()
            .with_severities([Severity::Minor])
            .with_page(2, 15)
            .apply(findings);

        assert_eq!(page.total, 20);
        assert_eq!(page.summary.minor, 20);
        assert_eq!(page.summary.serious, 0);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.results.len(), 5);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let page = ResultQuery::new().apply(Vec::new());
        assert_eq!((page.total, page.total_pages, page.page), (0, 0, 1));
    }

    #[test]
    fn search_and_compliance_filters() {
        let mut labelled = finding("https://a.com/form", "Form element has no label", Severity::Serious, 0);
        labelled.tags = vec!["section508".into()];
        let other = finding("https://a.com", "Missing alt", Severity::Critical, 0);

        let query = ResultQuery::new().with_search("  LABEL ");
        assert_eq!(query.select(vec![labelled.clone(), other.clone()]), vec![labelled.clone()]);

        let query = ResultQuery::new().with_compliance([ComplianceFilter::WcagA]);
        assert_eq!(query.select(vec![labelled, other.clone()]), vec![other]);
    }

    #[test]
    fn params_parse_and_clamp() {
        let query = ResultQuery::try_from(ResultParams {
            page: Some(0),
            page_size: Some(500),
            sort_by: Some("url".into()),
            severity_filters: Some("critical, minor".into()),
            compliance_filters: Some("wcag-aa,section508".into()),
            ..ResultParams::default()
        })
        .unwrap();

        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, MAX_PAGE_SIZE);
        assert_eq!(query.sort_by, SortBy::Url);
        assert_eq!(query.severity_filters, vec![Severity::Critical, Severity::Minor]);
        assert_eq!(
            query.compliance_filters,
            vec![ComplianceFilter::WcagAa, ComplianceFilter::Section508]
        );
    }

    #[test]
    fn bad_params_are_validation_errors() {
        let err = ResultQuery::try_from(ResultParams {
            sort_by: Some("size".into()),
            ..ResultParams::default()
        })
        .unwrap_err();
        assert_eq!(err.field, "sortBy");

        let err = ResultQuery::try_from(ResultParams {
            severity_filters: Some("urgent".into()),
            ..ResultParams::default()
        })
        .unwrap_err();
        assert_eq!(err.field, "severityFilters");
    }

    #[test]
    fn literal_query_with_zero_page_reads_first_page() {
        let query = ResultQuery {
            page: 0,
            page_size: 0,
            ..ResultQuery::default()
        };
        let page = query.apply(vec![
            finding("https://a.com", "one", Severity::Serious, 0),
            finding("https://b.com", "two", Severity::Minor, 1),
        ]);

        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].message, "one");
    }
}
