//! A11y Types - data model for the accessibility dashboard
//!
//! Defines the entities shared by every layer:
//! - [`Project`] and [`ProjectUrl`]: the url sets being tracked
//! - [`Scan`] and [`ScanStatus`]: one analysis record per url, with its lifecycle
//! - [`Finding`]: one accessibility issue detected during a scan
//! - [`ComplianceOptions`]: which rule sets apply to a scan
//!
//! # Example
//!
//! ```rust
//! use a11y_types::{ComplianceOptions, ScanStatus, Severity, WcagLevel};
//!
//! let options = ComplianceOptions::new(WcagLevel::Aa).with_section508(true);
//! assert!(options.rule_tags().contains(&"section508".to_string()));
//!
//! assert!(ScanStatus::InProgress.can_transition_to(ScanStatus::Completed));
//! assert!(Severity::Critical.rank() > Severity::Minor.rank());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod compliance;
mod error;
mod finding;
mod ids;
mod project;
mod scan;
mod severity;

pub use compliance::{ComplianceFilter, ComplianceOptions, WcagLevel};
pub use error::ParseError;
pub use finding::{FieldChange, Finding, NewFinding, ResultPatch};
pub use ids::{FindingId, ProjectId, ScanId, UrlId};
pub use project::{NewProject, Project, ProjectUrl};
pub use scan::{NewScan, Scan, ScanStatus, ScanUpdate};
pub use severity::{ScanSummary, Severity};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
