//! Compliance options and tag-based compliance filters
//!
//! Rule engines label each rule with tags such as `wcag2a`, `wcag21aa`,
//! `section508` or `best-practice`. [`ComplianceOptions`] selects which tags
//! a scan runs; [`ComplianceFilter`] matches stored findings by tag.

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static WCAG_A: Lazy<Regex> = Lazy::new(|| Regex::new(r"^wcag\d*a$").expect("valid regex"));
static WCAG_AA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^wcag\d*aa$").expect("valid regex"));
static WCAG_AAA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^wcag\d*aaa$").expect("valid regex"));

/// WCAG conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WcagLevel {
    /// Level A
    A,
    /// Level AA
    #[default]
    Aa,
    /// Level AAA
    Aaa,
}

impl WcagLevel {
    /// Lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WcagLevel::A => "a",
            WcagLevel::Aa => "aa",
            WcagLevel::Aaa => "aaa",
        }
    }

    /// Levels included by this level (cumulative)
    #[must_use]
    pub fn included(&self) -> &'static [WcagLevel] {
        match self {
            WcagLevel::A => &[WcagLevel::A],
            WcagLevel::Aa => &[WcagLevel::A, WcagLevel::Aa],
            WcagLevel::Aaa => &[WcagLevel::A, WcagLevel::Aa, WcagLevel::Aaa],
        }
    }
}

impl fmt::Display for WcagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WcagLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(WcagLevel::A),
            "aa" => Ok(WcagLevel::Aa),
            "aaa" => Ok(WcagLevel::Aaa),
            _ => Err(ParseError::WcagLevel(s.to_string())),
        }
    }
}

/// Rule sets applied to a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceOptions {
    /// WCAG conformance level
    pub wcag_level: WcagLevel,
    /// Include Section 508 rules
    pub section508: bool,
    /// Include best-practice rules
    pub best_practices: bool,
    /// Include experimental rules
    pub experimental: bool,
}

impl Default for ComplianceOptions {
    fn default() -> Self {
        Self {
            wcag_level: WcagLevel::Aa,
            section508: false,
            best_practices: true,
            experimental: false,
        }
    }
}

impl ComplianceOptions {
    /// Options for a WCAG level with no extra rule sets
    #[inline]
    #[must_use]
    pub fn new(wcag_level: WcagLevel) -> Self {
        Self {
            wcag_level,
            section508: false,
            best_practices: false,
            experimental: false,
        }
    }

    /// With Section 508 rules
    #[inline]
    #[must_use]
    pub fn with_section508(mut self, enabled: bool) -> Self {
        self.section508 = enabled;
        self
    }

    /// With best-practice rules
    #[inline]
    #[must_use]
    pub fn with_best_practices(mut self, enabled: bool) -> Self {
        self.best_practices = enabled;
        self
    }

    /// With experimental rules
    #[inline]
    #[must_use]
    pub fn with_experimental(mut self, enabled: bool) -> Self {
        self.experimental = enabled;
        self
    }

    /// Rule-engine tags enabled by these options
    #[must_use]
    pub fn rule_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for level in self.wcag_level.included() {
            for version in ["wcag2", "wcag21", "wcag22"] {
                tags.push(format!("{version}{}", level.as_str()));
            }
        }
        if self.section508 {
            tags.push("section508".to_string());
        }
        if self.best_practices {
            tags.push("best-practice".to_string());
        }
        if self.experimental {
            tags.push("experimental".to_string());
        }
        tags
    }

    /// Whether a rule carrying `tags` runs under these options
    #[must_use]
    pub fn enables_any(&self, tags: &[&str]) -> bool {
        let enabled = self.rule_tags();
        tags.iter().any(|tag| enabled.iter().any(|e| e == tag))
    }
}

/// Filter matching findings by compliance-standard tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceFilter {
    /// WCAG level A criteria
    WcagA,
    /// WCAG level AA criteria
    WcagAa,
    /// WCAG level AAA criteria
    WcagAaa,
    /// Section 508
    Section508,
    /// Best practices
    BestPractices,
    /// Experimental rules
    Experimental,
}

impl ComplianceFilter {
    /// Whether a single tag belongs to this standard
    #[must_use]
    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = tag.trim().to_ascii_lowercase();
        match self {
            ComplianceFilter::WcagA => WCAG_A.is_match(&tag),
            ComplianceFilter::WcagAa => WCAG_AA.is_match(&tag),
            ComplianceFilter::WcagAaa => WCAG_AAA.is_match(&tag),
            ComplianceFilter::Section508 => tag.starts_with("section508"),
            ComplianceFilter::BestPractices => tag == "best-practice" || tag == "best-practices",
            ComplianceFilter::Experimental => tag == "experimental",
        }
    }

    /// Whether any of `tags` belongs to this standard
    #[must_use]
    pub fn matches(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.matches_tag(tag))
    }
}

impl FromStr for ComplianceFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wcag-a" | "wcaga" | "wcag2a" => Ok(ComplianceFilter::WcagA),
            "wcag-aa" | "wcagaa" | "wcag2aa" => Ok(ComplianceFilter::WcagAa),
            "wcag-aaa" | "wcagaaa" | "wcag2aaa" => Ok(ComplianceFilter::WcagAaa),
            "section508" | "section-508" => Ok(ComplianceFilter::Section508),
            "best-practices" | "best-practice" | "bestpractices" => {
                Ok(ComplianceFilter::BestPractices)
            }
            "experimental" => Ok(ComplianceFilter::Experimental),
            _ => Err(ParseError::ComplianceFilter(s.to_string())),
        }
    }
}
