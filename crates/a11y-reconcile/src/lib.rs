//! A11y Reconcile - rescan reconciliation
//!
//! Keeps a scan's stored findings consistent across repeated scans:
//!
//! 1. every finding is keyed by its [`IdentityKey`]
//!    `(url, message, element-or-empty, severity)`
//! 2. [`plan`] diffs stored findings against fresh ones into adds, removes
//!    and per-field patches
//! 3. [`Reconciler`] applies the plan inside one store transaction
//!
//! Unchanged findings keep their id and creation time.
//!
//! # Example
//!
//! ```rust,ignore
//! let reconciler = Reconciler::new(store);
//! let report = reconciler.reconcile(scan_id, fresh_findings).await?;
//! println!("+{} -{} ~{}", report.added, report.removed, report.updated);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod engine;
mod error;
mod key;
mod plan;

pub use engine::{ReconcileReport, Reconciler};
pub use error::ReconcileError;
pub use key::{Fingerprint, IdentityKey};
pub use plan::{diff_fields, plan, ReconcilePlan};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
