//! A11y Store - persistence gateway
//!
//! [`ScanStore`] persists projects, urls, scans and findings. Finding writes
//! go through a [`ResultTransaction`] scoped to one scan, so a batch of
//! inserts, deletes and patches commits atomically or not at all.
//!
//! Backends:
//! - [`MemoryStore`]: process-local, always available
//! - `PgStore`: Postgres via sqlx, behind the `postgres` feature

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod gateway;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use error::StoreError;
pub use gateway::{ResultTransaction, ScanStore};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
