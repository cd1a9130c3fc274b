//! A11y Server - HTTP API for the accessibility dashboard
//!
//! Serves projects, scans, findings and exports over JSON. Scans are
//! accepted with `202` and run in the background; clients poll
//! `GET /scans/{id}` until the scan reaches `completed` or `failed`.
//!
//! Every error response has the shape `{"error": code, "message": text}`.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod dto;
pub mod error;
mod handlers;
pub mod routes;
pub mod telemetry;

use a11y_analysis::AnalyzerChain;
use a11y_core::{ProjectService, RendererRegistry, ScanConfig, ScanOrchestrator};
use a11y_store::ScanStore;
use std::sync::Arc;

pub use config::{AppConfig, Cli, ConfigError};
pub use error::{handle_rejection, ApiError};
pub use routes::routes;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Scan lifecycle
    pub orchestrator: ScanOrchestrator,
    /// Project writes and the read side
    pub projects: ProjectService,
    /// Export renderers
    pub renderers: Arc<RendererRegistry>,
}

impl AppState {
    /// Wire services over one store
    #[must_use]
    pub fn new(store: Arc<dyn ScanStore>, chain: AnalyzerChain, config: ScanConfig) -> Self {
        Self {
            orchestrator: ScanOrchestrator::new(store.clone(), chain, config),
            projects: ProjectService::new(store),
            renderers: Arc::new(RendererRegistry::with_defaults()),
        }
    }

    /// Replace the export renderers
    #[must_use]
    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = Arc::new(renderers);
        self
    }
}
