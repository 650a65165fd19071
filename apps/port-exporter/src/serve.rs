//! Export the configured service and echo every connection until cancelled.

use anyhow::{Context, Result};
use service_export::{SecureListener, ServiceExporter};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::Accept;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::AppConfig;

enum Endpoint {
    Plain(TcpListener),
    Secure(SecureListener),
}

enum Incoming {
    Plain(TcpStream),
    Secure(Accept<TcpStream>),
}

impl Endpoint {
    async fn accept(&self) -> std::io::Result<(Incoming, SocketAddr)> {
        match self {
            Self::Plain(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok((Incoming::Plain(stream), peer))
            }
            Self::Secure(listener) => {
                let (handshake, peer) = listener.accept_tcp().await?;
                Ok((Incoming::Secure(handshake), peer))
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match self {
            Self::Plain(listener) => listener.local_addr(),
            Self::Secure(listener) => listener.local_addr(),
        }
    }
}

/// Export the service, serve until `cancel` fires, then release the slot.
///
/// The slot is released even when serving fails.
///
/// # Errors
/// Returns an error if TLS material cannot be loaded, the export fails, or
/// the release fails.
pub async fn run(
    exporter: &ServiceExporter,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let service = &config.service;
    let endpoint = match &config.tls {
        Some(tls) => {
            let tls_config = tls.server_config()?;
            let listener = exporter
                .export_secure_port(service.network, &service.bind, &service.name, tls_config)
                .await
                .with_context(|| format!("failed to export service '{}'", service.name))?;
            Endpoint::Secure(listener)
        }
        None => {
            let listener = exporter
                .export_port(service.network, &service.bind, &service.name)
                .await
                .with_context(|| format!("failed to export service '{}'", service.name))?;
            Endpoint::Plain(listener)
        }
    };

    let served = serve(&endpoint, cancel).await;
    drop(endpoint);

    exporter
        .unexport_port()
        .await
        .context("failed to release service slot")?;
    served
}

async fn serve(endpoint: &Endpoint, cancel: &CancellationToken) -> Result<()> {
    let local_addr = endpoint.local_addr().context("listener has no address")?;
    tracing::info!(%local_addr, "serving echo");

    let tracker = TaskTracker::new();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = endpoint.accept() => match accepted {
                Ok((incoming, peer)) => {
                    let cancel = cancel.clone();
                    tracker.spawn(async move { handle(incoming, peer, &cancel).await });
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
        }
    }

    tracker.close();
    tracker.wait().await;
    tracing::info!(%local_addr, "echo stopped");
    Ok(())
}

async fn handle(incoming: Incoming, peer: SocketAddr, cancel: &CancellationToken) {
    match incoming {
        Incoming::Plain(stream) => echo(stream, peer, cancel).await,
        Incoming::Secure(handshake) => {
            let handshake = tokio::select! {
                () = cancel.cancelled() => return,
                result = handshake => result,
            };
            match handshake {
                Ok(stream) => echo(stream, peer, cancel).await,
                Err(e) => tracing::debug!(%peer, error = %e, "TLS handshake failed"),
            }
        }
    }
}

async fn echo<S>(stream: S, peer: SocketAddr, cancel: &CancellationToken)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::debug!(%peer, "connection accepted");
    let (mut reader, mut writer) = tokio::io::split(stream);
    tokio::select! {
        () = cancel.cancelled() => {}
        copied = tokio::io::copy(&mut reader, &mut writer) => match copied {
            Ok(bytes) => tracing::debug!(%peer, bytes, "connection closed"),
            Err(e) => tracing::debug!(%peer, error = %e, "connection failed"),
        },
    }
}
