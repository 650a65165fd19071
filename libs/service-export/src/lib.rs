#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]

//! Named service ports.
//!
//! Binds a listener on an OS-assigned port and publishes its address in a
//! coordination store under `/ns/service/<name>/<index>`, so peers can find
//! it by name instead of a fixed port.
//!
//! # Example
//!
//! ```ignore
//! use service_export::{ExporterConfig, Network, ServiceExporter};
//!
//! let exporter = ServiceExporter::connect(&ExporterConfig::default()).await?;
//! let listener = exporter.export_port(Network::Tcp, "10.0.0.5", "echo").await?;
//! // ... serve on `listener` ...
//! exporter.unexport_port().await?;
//! ```

mod config;
mod error;
mod exporter;
mod network;
mod tls;

pub use config::{DEFAULT_NAMESPACE, ExporterConfig};
pub use error::ExportError;
pub use exporter::{Registration, ServiceExporter, slot_path};
pub use network::{Network, bind_anonymous, bind_host};
pub use tls::{SecureListener, TlsSettings, crypto_provider, server_config};

pub use coord_client::{CoordBackend, CoordClient, CoordClientConfig, InMemoryCoordClient};
