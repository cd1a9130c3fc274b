//! Content identity of findings
//!
//! Rule engines give findings no stable id, so a finding is identified by
//! `(url, message, element-or-empty, severity)`.

use a11y_types::{Finding, NewFinding, Severity};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};

/// Identity tuple of a finding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    url: String,
    message: String,
    element: String,
    severity: Severity,
}

impl IdentityKey {
    /// Build a key; a missing element counts as empty
    #[must_use]
    pub fn new(url: &str, message: &str, element: Option<&str>, severity: Severity) -> Self {
        Self {
            url: url.to_string(),
            message: message.to_string(),
            element: element.unwrap_or_default().to_string(),
            severity,
        }
    }

    /// Key of a persisted finding
    #[inline]
    #[must_use]
    pub fn of(finding: &Finding) -> Self {
        Self::new(
            &finding.url,
            &finding.message,
            finding.element.as_deref(),
            finding.severity,
        )
    }

    /// Key of an analyzer finding
    #[inline]
    #[must_use]
    pub fn of_new(finding: &NewFinding) -> Self {
        Self::new(
            &finding.url,
            &finding.message,
            finding.element.as_deref(),
            finding.severity,
        )
    }

    /// Url component
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Severity component
    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// SHA-256 over the length-prefixed components
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        for part in [
            self.url.as_str(),
            self.message.as_str(),
            self.element.as_str(),
            self.severity.as_str(),
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Fingerprint(hasher.finalize().into())
    }
}

/// Fixed-size digest of an [`IdentityKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex chars
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
