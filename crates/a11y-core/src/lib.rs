//! A11y Core - scan orchestration
//!
//! The layer between the HTTP surface and the lower crates:
//! - Starts new scans and rescans as explicit [`ScanRequest`]s
//! - Runs each attempt in the background through a bounded [`ScanQueue`]
//! - Guarantees every scan ends `completed` or `failed`
//! - Rescans whole projects
//! - Aggregates findings across a project's scans for paginated queries
//! - Renders exports through pluggable [`ReportRenderer`]s
//!
//! # Example
//!
//! ```rust,ignore
//! use a11y_core::{ScanConfig, ScanOrchestrator, ScanRequest};
//!
//! let orchestrator = ScanOrchestrator::new(store, chain, ScanConfig::new());
//! let started = orchestrator
//!     .start_scan(ScanRequest::new_scan(project_id, "https://example.com"))
//!     .await?;
//! let finished = started.handle.wait().await?;
//! println!("{} via {:?}", finished.status, finished.analysis_method);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod error;
mod orchestrator;
mod projects;
mod query;
mod queue;
mod report;
mod request;
mod validation;

pub use config::ScanConfig;
pub use error::{OrchestratorError, ScanFailure, ValidationError};
pub use orchestrator::{ScanOrchestrator, StartedScan};
pub use projects::{ProjectDetails, ProjectService};
pub use query::{
    dedupe_latest, ResultPage, ResultParams, ResultQuery, SortBy, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use queue::{ProjectClaim, QueueStats, Reservation, ScanHandle, ScanQueue};
pub use report::{
    JsonRenderer, RenderedReport, RendererRegistry, ReportError, ReportFormat, ReportRenderer,
    ReportRequest,
};
pub use request::{NewScanRequest, RescanRequest, ScanRequest};
pub use validation::{
    validate_new_project, validate_url, validate_urls, MAX_NAME_LEN, MAX_URLS,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
