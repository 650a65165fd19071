//! Service exporter: bind, claim a slot, release it.
//!
//! Slots are `<namespace>/<service>/<index>` paths in the coordination store.
//! A slot is claimed with a create-only write (expected revision
//! [`Revision::NONE`]); when another process already owns the index the write
//! conflicts and the next index is tried. Indices are scanned from 0 on every
//! export and gaps left by released slots are picked up only by that scan.

use coord_client::{CoordClient, DeleteOutcome, Revision, WriteOutcome};
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::ExportError;
use crate::config::ExporterConfig;
use crate::network::{Network, bind_anonymous};
use crate::tls::SecureListener;

/// The slot most recently claimed by an exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub path: String,
    /// Store revision returned by the claiming write; needed to delete it.
    pub revision: Revision,
    /// Address written into the slot.
    pub address: SocketAddr,
}

/// Render a slot path. The index is plain decimal without leading zeros.
#[must_use]
pub fn slot_path(namespace: &str, service_name: &str, index: u64) -> String {
    format!("{}/{service_name}/{index}", namespace.trim_end_matches('/'))
}

fn validate_service_name(service_name: &str) -> Result<(), ExportError> {
    if service_name.is_empty() || service_name.contains('/') {
        return Err(ExportError::InvalidServiceName(service_name.to_owned()));
    }
    Ok(())
}

/// Publishes anonymous listeners under service names.
///
/// Only the latest registration is tracked: a second export replaces the
/// record without releasing the first slot, and [`Self::unexport_port`] only
/// ever removes the latest one.
///
/// Export and release on the same exporter are serialised internally, so the
/// exporter can be shared behind an `Arc`.
pub struct ServiceExporter {
    client: Arc<dyn CoordClient>,
    namespace: String,
    max_claim_attempts: Option<u32>,
    published: Mutex<Option<Registration>>,
}

impl std::fmt::Debug for ServiceExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceExporter")
            .field("namespace", &self.namespace)
            .field("max_claim_attempts", &self.max_claim_attempts)
            .finish_non_exhaustive()
    }
}

impl ServiceExporter {
    /// Exporter over an existing session with default settings.
    #[must_use]
    pub fn new(client: Arc<dyn CoordClient>) -> Self {
        Self::with_config(client, &ExporterConfig::default())
    }

    /// Exporter over an existing session; `cfg.coord` is ignored.
    #[must_use]
    pub fn with_config(client: Arc<dyn CoordClient>, cfg: &ExporterConfig) -> Self {
        Self {
            client,
            namespace: cfg.normalized_namespace(),
            max_claim_attempts: cfg.max_claim_attempts,
            published: Mutex::new(None),
        }
    }

    /// Open a coordination session from `cfg.coord` and build an exporter on it.
    ///
    /// # Errors
    /// Returns [`ExportError::Connection`] if the session cannot be established.
    pub async fn connect(cfg: &ExporterConfig) -> Result<Self, ExportError> {
        let client = coord_client::connect(&cfg.coord)
            .await
            .map_err(ExportError::Connection)?;
        Ok(Self::with_config(client, cfg))
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Registration that [`Self::unexport_port`] would remove.
    pub async fn published(&self) -> Option<Registration> {
        self.published.lock().await.clone()
    }

    /// Bind an anonymous listener on the host of `bind_address` and publish
    /// its address under `service_name`.
    ///
    /// Any port in `bind_address` is ignored. On success the listener is
    /// returned to the caller, who owns it.
    ///
    /// # Errors
    /// - [`ExportError::InvalidServiceName`] for an empty name or one with `/`
    /// - [`ExportError::Resolve`] / [`ExportError::Bind`] if the listener
    ///   cannot be created
    /// - [`ExportError::Store`] if a claim write fails for a reason other than
    ///   a taken slot; the listener is closed
    /// - [`ExportError::Exhausted`] if a claim cap is configured and reached;
    ///   the listener is closed
    pub async fn export_port(
        &self,
        network: Network,
        bind_address: &str,
        service_name: &str,
    ) -> Result<TcpListener, ExportError> {
        validate_service_name(service_name)?;

        let mut published = self.published.lock().await;

        let listener = bind_anonymous(network, bind_address).await?;
        let address = listener.local_addr().map_err(|source| ExportError::Bind {
            network: network.as_str(),
            address: bind_address.to_owned(),
            source,
        })?;
        let value = address.to_string();

        let mut index: u64 = 0;
        loop {
            if let Some(max) = self.max_claim_attempts
                && index >= u64::from(max)
            {
                drop(listener);
                return Err(ExportError::Exhausted {
                    service: service_name.to_owned(),
                    attempts: max,
                });
            }

            let path = slot_path(&self.namespace, service_name, index);
            match self.client.set(&path, Revision::NONE, value.as_bytes()).await {
                Ok(WriteOutcome::Applied(revision)) => {
                    tracing::info!(
                        service = service_name,
                        %path,
                        %address,
                        %revision,
                        "exported service port"
                    );
                    let previous = published.replace(Registration {
                        path,
                        revision,
                        address,
                    });
                    if let Some(previous) = previous {
                        tracing::debug!(
                            superseded = %previous.path,
                            "replaced earlier registration; this exporter no longer releases it"
                        );
                    }
                    return Ok(listener);
                }
                Ok(WriteOutcome::Conflict) => {
                    tracing::debug!(
                        service = service_name,
                        %path,
                        "slot taken, trying next index"
                    );
                    index += 1;
                }
                Err(source) => {
                    drop(listener);
                    return Err(ExportError::Store { path, source });
                }
            }
        }
    }

    /// Like [`Self::export_port`], then wrap the listener with TLS.
    ///
    /// The published address is the plain listener's address.
    ///
    /// # Errors
    /// Same as [`Self::export_port`]; nothing is wrapped on failure.
    pub async fn export_secure_port(
        &self,
        network: Network,
        bind_address: &str,
        service_name: &str,
        tls_config: Arc<ServerConfig>,
    ) -> Result<SecureListener, ExportError> {
        let listener = self.export_port(network, bind_address, service_name).await?;
        Ok(SecureListener::new(listener, tls_config))
    }

    /// Remove the most recently published slot.
    ///
    /// A no-op when nothing is published. A revision conflict means the slot
    /// is already gone or owned by someone else and counts as released.
    ///
    /// # Errors
    /// Returns [`ExportError::Store`] on any other store failure; the
    /// registration is kept so the call can be retried.
    pub async fn unexport_port(&self) -> Result<(), ExportError> {
        let mut published = self.published.lock().await;
        let Some(registration) = published.as_ref() else {
            return Ok(());
        };

        match self
            .client
            .delete(&registration.path, registration.revision)
            .await
        {
            Ok(DeleteOutcome::Deleted) => {
                tracing::info!(
                    path = %registration.path,
                    address = %registration.address,
                    "released service port"
                );
            }
            Ok(DeleteOutcome::Conflict) => {
                tracing::warn!(
                    path = %registration.path,
                    revision = %registration.revision,
                    "slot changed or already removed; treating as released"
                );
            }
            Err(source) => {
                return Err(ExportError::Store {
                    path: registration.path.clone(),
                    source,
                });
            }
        }

        *published = None;
        Ok(())
    }
}
