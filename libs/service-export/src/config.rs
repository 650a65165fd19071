use coord_client::CoordClientConfig;
use serde::{Deserialize, Serialize};

/// Path prefix under which service slots live.
pub const DEFAULT_NAMESPACE: &str = "/ns/service";

/// Exporter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Coordination store session.
    pub coord: CoordClientConfig,

    /// Prefix for `<namespace>/<service>/<index>` slot paths.
    pub namespace: String,

    /// Give up after this many claim writes. `None` scans without limit.
    pub max_claim_attempts: Option<u32>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            coord: CoordClientConfig::default(),
            namespace: DEFAULT_NAMESPACE.to_owned(),
            max_claim_attempts: None,
        }
    }
}

impl ExporterConfig {
    #[must_use]
    pub fn new(coord: CoordClientConfig) -> Self {
        Self {
            coord,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_max_claim_attempts(mut self, attempts: u32) -> Self {
        self.max_claim_attempts = Some(attempts);
        self
    }

    /// Namespace without trailing slashes; `/` stays `""` so paths start at root.
    pub(crate) fn normalized_namespace(&self) -> String {
        self.namespace.trim_end_matches('/').to_owned()
    }
}
