//! Layered application configuration: defaults, then YAML, then environment.

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use service_export::{CoordClientConfig, ExporterConfig, Network, TlsSettings};
use std::path::Path;

/// Environment prefix; nested keys are separated by `__`,
/// e.g. `PORT_EXPORTER__SERVICE__NAME=api`.
pub const ENV_PREFIX: &str = "PORT_EXPORTER__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Coordination store session.
    pub coord: CoordClientConfig,
    /// Prefix for `<namespace>/<service>/<index>` slot paths.
    pub namespace: String,
    /// Give up after this many claim writes. `None` scans without limit.
    pub max_claim_attempts: Option<u32>,
    pub service: ServiceConfig,
    /// Serve TLS when set.
    pub tls: Option<TlsSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let exporter = ExporterConfig::default();
        Self {
            coord: exporter.coord,
            namespace: exporter.namespace,
            max_claim_attempts: exporter.max_claim_attempts,
            service: ServiceConfig::default(),
            tls: None,
        }
    }
}

/// What to export and where to listen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    pub network: Network,
    /// Host to listen on. A port, if present, is ignored.
    pub bind: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "echo".to_owned(),
            network: Network::Tcp,
            bind: "127.0.0.1".to_owned(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` if given, then `PORT_EXPORTER__*` variables.
    ///
    /// # Errors
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract().context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Exporter settings carried by this document.
    #[must_use]
    pub fn exporter(&self) -> ExporterConfig {
        let mut exporter =
            ExporterConfig::new(self.coord.clone()).with_namespace(self.namespace.clone());
        exporter.max_claim_attempts = self.max_claim_attempts;
        exporter
    }

    /// Check the parts of the configuration that only fail at runtime otherwise.
    ///
    /// # Errors
    /// Returns an error for an unusable service name or namespace.
    pub fn validate(&self) -> Result<()> {
        let name = &self.service.name;
        if name.is_empty() || name.contains('/') {
            bail!("service.name '{name}' must be non-empty and contain no '/'");
        }
        if !self.namespace.is_empty() && !self.namespace.starts_with('/') {
            bail!("namespace '{}' must be an absolute path", self.namespace);
        }
        Ok(())
    }

    /// Pretty JSON rendering for `--print-config` and `check`.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render configuration")
    }
}
