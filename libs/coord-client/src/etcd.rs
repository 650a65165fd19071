//! etcd-backed coordination session.
//!
//! Conditional writes are single transactions: compare the key's mod revision
//! with the expected one, then put or delete. etcd reports a mod revision of
//! 0 for absent keys, which lines up with [`Revision::NONE`].

use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, ConnectOptions, Txn, TxnOp, TxnResponse};

use crate::{CoordClient, CoordClientConfig, CoordError, DeleteOutcome, Revision, WriteOutcome};

/// Session to an etcd cluster.
///
/// Cheap to clone; clones share the underlying channel.
#[derive(Clone)]
pub struct EtcdCoordClient {
    client: Client,
    endpoints: Vec<String>,
}

impl std::fmt::Debug for EtcdCoordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdCoordClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl EtcdCoordClient {
    /// Dial the configured endpoints and open a session.
    ///
    /// No reconnect is attempted if the session is lost later on.
    ///
    /// # Errors
    /// Returns [`CoordError::NoEndpoints`] if nothing is configured, or
    /// [`CoordError::Connect`] if the handshake fails.
    pub async fn connect(cfg: &CoordClientConfig) -> Result<Self, CoordError> {
        let endpoints = cfg.dial_endpoints();
        if endpoints.is_empty() {
            return Err(CoordError::NoEndpoints);
        }

        let options = ConnectOptions::new()
            .with_connect_timeout(cfg.connect_timeout)
            .with_timeout(cfg.request_timeout);

        let client = Client::connect(&endpoints, Some(options))
            .await
            .map_err(|source| CoordError::Connect {
                endpoints: endpoints.clone(),
                source,
            })?;

        tracing::info!(
            target: "coord_client::etcd",
            endpoints = ?endpoints,
            "connected to coordination store"
        );

        Ok(Self { client, endpoints })
    }

    /// Endpoints the session was dialled with, in dial order.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn guarded(
        &self,
        path: &str,
        expected: Revision,
        op: TxnOp,
    ) -> Result<TxnResponse, CoordError> {
        let txn = Txn::new()
            .when(vec![Compare::mod_revision(path, CompareOp::Equal, expected.get())])
            .and_then(vec![op]);

        let mut kv = self.client.kv_client();
        Ok(kv.txn(txn).await?)
    }
}

#[async_trait]
impl CoordClient for EtcdCoordClient {
    async fn set(
        &self,
        path: &str,
        expected: Revision,
        value: &[u8],
    ) -> Result<WriteOutcome, CoordError> {
        let resp = self
            .guarded(path, expected, TxnOp::put(path, value.to_vec(), None))
            .await?;

        if !resp.succeeded() {
            return Ok(WriteOutcome::Conflict);
        }

        // The put happens in the same transaction, so its mod revision is the
        // transaction's header revision.
        let revision = resp
            .header()
            .map(|h| Revision::new(h.revision()))
            .ok_or_else(|| CoordError::Rejected(format!("txn on {path} returned no header")))?;

        tracing::trace!(target: "coord_client::etcd", path, %revision, "conditional put applied");
        Ok(WriteOutcome::Applied(revision))
    }

    async fn delete(&self, path: &str, expected: Revision) -> Result<DeleteOutcome, CoordError> {
        let resp = self
            .guarded(path, expected, TxnOp::delete(path, None))
            .await?;

        if resp.succeeded() {
            tracing::trace!(
                target: "coord_client::etcd",
                path,
                %expected,
                "conditional delete applied"
            );
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::Conflict)
        }
    }
}
