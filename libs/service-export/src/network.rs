//! Bind address handling.
//!
//! Callers choose where to listen, never which port: any port in the bind
//! address is discarded and the OS picks one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use tokio::net::TcpListener;

use crate::ExportError;

/// Stream transport to listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// IPv4 or IPv6, whichever the host resolves to first
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
}

impl Network {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
        }
    }

    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Tcp => true,
            Self::Tcp4 => addr.is_ipv4(),
            Self::Tcp6 => addr.is_ipv6(),
        }
    }

    fn unspecified(self) -> IpAddr {
        match self {
            Self::Tcp | Self::Tcp4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Self::Tcp6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            _ => Err(ExportError::UnsupportedNetwork(s.to_owned())),
        }
    }
}

/// Host part of a bind address.
///
/// `host:port` and `[v6]:port` yield the host; anything that is not in
/// host:port form (a bare hostname, an unbracketed IPv6 literal) is taken as
/// the host itself. A bracketed literal without a port loses its brackets.
#[must_use]
pub fn bind_host(bind_address: &str) -> &str {
    let s = bind_address.trim();

    if let Some(rest) = s.strip_prefix('[') {
        if let Some((inner, tail)) = rest.split_once(']') {
            if tail.is_empty() || tail.starts_with(':') {
                return inner;
            }
        }
        return s;
    }

    match s.rsplit_once(':') {
        Some((host, _port)) if !host.contains(':') => host,
        _ => s,
    }
}

async fn resolve(network: Network, host: &str) -> Result<SocketAddr, ExportError> {
    let resolve_err = |reason: String| ExportError::Resolve {
        network: network.as_str(),
        host: host.to_owned(),
        reason,
    };

    if host.is_empty() {
        return Ok(SocketAddr::new(network.unspecified(), 0));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        let addr = SocketAddr::new(ip, 0);
        return if network.accepts(&addr) {
            Ok(addr)
        } else {
            Err(resolve_err("address family does not match network".to_owned()))
        };
    }

    let mut candidates = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| resolve_err(e.to_string()))?;

    candidates
        .find(|addr| network.accepts(addr))
        .ok_or_else(|| resolve_err("no address of the requested family".to_owned()))
}

/// Bind a listener on the host of `bind_address` with an OS-assigned port.
///
/// # Errors
/// Returns [`ExportError::Resolve`] if the host has no address of the
/// requested family, or [`ExportError::Bind`] if the bind itself fails.
pub async fn bind_anonymous(
    network: Network,
    bind_address: &str,
) -> Result<TcpListener, ExportError> {
    let addr = resolve(network, bind_host(bind_address)).await?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ExportError::Bind {
            network: network.as_str(),
            address: addr.to_string(),
            source,
        })?;

    tracing::info!(
        network = network.as_str(),
        requested = %bind_address,
        bound = ?listener.local_addr().ok(),
        "bound anonymous listener"
    );
    Ok(listener)
}
