use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default etcd client endpoint
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:2379";

/// Which store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordBackend {
    #[default]
    Etcd,
    /// Process-local store, for development and tests
    Memory,
}

/// Connection settings for the coordination store.
///
/// Durations use humantime notation in configuration files (`"5s"`, `"250ms"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordClientConfig {
    pub backend: CoordBackend,

    /// Primary cluster endpoints (`host:port`).
    pub endpoints: Vec<String>,

    /// Extra endpoint used to locate the cluster when the primaries are not
    /// reachable directly. Dialled after the primaries.
    pub bootstrap: Option<String>,

    /// Timeout for establishing the session.
    #[serde(with = "humantime_duration")]
    pub connect_timeout: Duration,

    /// Timeout applied to every request on the session.
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,
}

impl Default for CoordClientConfig {
    fn default() -> Self {
        Self {
            backend: CoordBackend::Etcd,
            endpoints: vec![DEFAULT_ENDPOINT.to_owned()],
            bootstrap: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl CoordClientConfig {
    /// Configuration for an etcd cluster reachable at `endpoint`.
    #[must_use]
    pub fn etcd(endpoint: impl Into<String>) -> Self {
        Self {
            endpoints: vec![endpoint.into()],
            ..Default::default()
        }
    }

    /// Configuration for the in-memory backend.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: CoordBackend::Memory,
            endpoints: Vec::new(),
            ..Default::default()
        }
    }

    /// Set the bootstrap endpoint.
    #[must_use]
    pub fn with_bootstrap(mut self, endpoint: impl Into<String>) -> Self {
        self.bootstrap = Some(endpoint.into());
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Endpoints in dial order: primaries first, bootstrap last, no duplicates.
    #[must_use]
    pub fn dial_endpoints(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.endpoints.len() + 1);
        for ep in self.endpoints.iter().chain(self.bootstrap.iter()) {
            let ep = ep.trim();
            if !ep.is_empty() && !out.iter().any(|seen| seen == ep) {
                out.push(ep.to_owned());
            }
        }
        out
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
