#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]

//! Coordination store client with revision-checked writes.
//!
//! The store is used purely as a naming directory: callers write a value at a
//! path only if the path is still at the revision they expect, and delete it
//! only if nobody touched it since. Outcomes are tagged values so callers can
//! branch on a conflict with a plain `match`:
//!
//! ```ignore
//! use coord_client::{CoordClient, InMemoryCoordClient, Revision, WriteOutcome};
//!
//! let store = InMemoryCoordClient::new();
//! match store.set("/ns/service/echo/0", Revision::NONE, b"127.0.0.1:4000").await? {
//!     WriteOutcome::Applied(rev) => println!("claimed at {rev}"),
//!     WriteOutcome::Conflict => println!("slot already taken"),
//! }
//! ```
//!
//! Two implementations are provided:
//! - [`EtcdCoordClient`]: a session to an etcd cluster
//! - [`InMemoryCoordClient`]: a process-local store with the same semantics

mod client;
mod config;
mod error;
mod etcd;
mod memory;
mod types;

pub use client::CoordClient;
pub use config::{CoordBackend, CoordClientConfig};
pub use error::CoordError;
pub use etcd::EtcdCoordClient;
pub use memory::InMemoryCoordClient;
pub use types::{DeleteOutcome, Revision, WriteOutcome};

use std::sync::Arc;

/// Open a session for the configured backend.
///
/// # Errors
/// Returns [`CoordError::NoEndpoints`] or [`CoordError::Connect`] when an etcd
/// session cannot be established. The in-memory backend never fails.
pub async fn connect(cfg: &CoordClientConfig) -> Result<Arc<dyn CoordClient>, CoordError> {
    match cfg.backend {
        CoordBackend::Etcd => Ok(Arc::new(EtcdCoordClient::connect(cfg).await?)),
        CoordBackend::Memory => {
            tracing::warn!("using in-memory coordination store; registrations are process-local");
            Ok(Arc::new(InMemoryCoordClient::new()))
        }
    }
}
