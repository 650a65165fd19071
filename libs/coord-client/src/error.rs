use thiserror::Error;

/// Coordination store failures.
///
/// A revision mismatch is not an error: it is reported as
/// [`crate::WriteOutcome::Conflict`] or [`crate::DeleteOutcome::Conflict`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoordError {
    /// Configuration lists no endpoint to dial
    #[error("no coordination store endpoints configured")]
    NoEndpoints,

    /// Session could not be established
    #[error("failed to connect to coordination store at {endpoints:?}: {source}")]
    Connect {
        endpoints: Vec<String>,
        #[source]
        source: etcd_client::Error,
    },

    /// Request failed in transport or was refused by the cluster
    #[error("coordination store request failed: {0}")]
    Request(#[from] etcd_client::Error),

    /// Store answered but refused the operation (permissions, quota, ...)
    #[error("coordination store rejected request: {0}")]
    Rejected(String),
}
