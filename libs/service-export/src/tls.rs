//! Transport security for exported listeners.
//!
//! The wrapper only changes what happens on accept; the address published in
//! the coordination store is always the plain listener's address.

use rustls::ServerConfig;
use rustls::crypto::CryptoProvider;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::{Accept, TlsAcceptor};

use crate::ExportError;

/// PEM certificate chain and private key on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsSettings {
    /// Certificate chain, leaf first.
    pub cert_path: PathBuf,
    /// PKCS#8, PKCS#1 or SEC1 private key.
    pub key_path: PathBuf,
}

impl TlsSettings {
    #[must_use]
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Load the PEM material and build a server configuration.
    ///
    /// # Errors
    /// Returns [`ExportError::Tls`] if a file cannot be read or parsed, the
    /// chain is empty, or the key does not match the certificate.
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, ExportError> {
        let certs = CertificateDer::pem_file_iter(&self.cert_path)
            .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
            .map_err(|e| {
                ExportError::Tls(format!(
                    "failed to read certificates from '{}': {e}",
                    self.cert_path.display()
                ))
            })?;

        if certs.is_empty() {
            return Err(ExportError::Tls(format!(
                "no certificates found in '{}'",
                self.cert_path.display()
            )));
        }

        let key = PrivateKeyDer::from_pem_file(&self.key_path).map_err(|e| {
            ExportError::Tls(format!(
                "failed to read private key from '{}': {e}",
                self.key_path.display()
            ))
        })?;

        tracing::debug!(
            cert = %self.cert_path.display(),
            chain_len = certs.len(),
            "loaded TLS material"
        );
        server_config(certs, key)
    }
}

/// Get the crypto provider for TLS listeners.
///
/// Uses the process-wide default when one is installed, otherwise an aws-lc-rs
/// provider that is not installed globally.
#[must_use]
pub fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build a server configuration without client authentication.
///
/// # Errors
/// Returns [`ExportError::Tls`] if the key is unusable or does not match.
pub fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<Arc<ServerConfig>, ExportError> {
    let config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ExportError::Tls(format!("failed to set TLS protocol versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ExportError::Tls(format!("invalid certificate or key: {e}")))?;

    Ok(Arc::new(config))
}

/// A bound listener whose connections are TLS-wrapped on accept.
pub struct SecureListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl std::fmt::Debug for SecureListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureListener")
            .field("local_addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

impl SecureListener {
    #[must_use]
    pub fn new(listener: TcpListener, config: Arc<ServerConfig>) -> Self {
        Self {
            listener,
            acceptor: TlsAcceptor::from(config),
        }
    }

    /// Accept a connection and complete the handshake.
    ///
    /// A failed handshake fails this call only; the listener stays usable.
    ///
    /// # Errors
    /// Returns the accept error or the handshake error.
    pub async fn accept(&self) -> io::Result<(TlsStream<TcpStream>, SocketAddr)> {
        let (handshake, peer) = self.accept_tcp().await?;
        Ok((handshake.await?, peer))
    }

    /// Accept a TCP connection and return the pending handshake.
    ///
    /// Lets an accept loop hand the handshake to a separate task so a slow
    /// client does not hold up the next accept.
    ///
    /// # Errors
    /// Returns the accept error.
    pub async fn accept_tcp(&self) -> io::Result<(Accept<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((self.acceptor.accept(stream), peer))
    }

    /// Address of the underlying listener (the published one).
    ///
    /// # Errors
    /// Returns the OS error if the socket address cannot be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
