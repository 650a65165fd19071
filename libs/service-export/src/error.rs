use coord_client::CoordError;
use thiserror::Error;

/// Failures of the export/unexport operations.
///
/// Slot collisions never show up here: the claim loop consumes them and moves
/// on to the next index.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExportError {
    /// Session to the coordination store could not be established
    #[error("coordination store unavailable: {0}")]
    Connection(#[source] CoordError),

    /// Local listener could not be bound
    #[error("failed to bind {network} listener on '{address}': {source}")]
    Bind {
        network: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Bind host could not be resolved to an address of the requested family
    #[error("cannot resolve '{host}' for {network}: {reason}")]
    Resolve {
        network: &'static str,
        host: String,
        reason: String,
    },

    /// Coordination store failed with something other than a slot conflict
    #[error("coordination store error on '{path}': {source}")]
    Store {
        path: String,
        #[source]
        source: CoordError,
    },

    /// Configured claim cap was reached without finding a free slot
    #[error("no free slot for service '{service}' after {attempts} attempts")]
    Exhausted { service: String, attempts: u32 },

    #[error("invalid service name '{0}': must be non-empty and contain no '/'")]
    InvalidServiceName(String),

    #[error("unsupported network '{0}' (expected tcp, tcp4 or tcp6)")]
    UnsupportedNetwork(String),

    /// TLS material could not be loaded or assembled
    #[error("TLS configuration error: {0}")]
    Tls(String),
}
