//! Process signals that stop the echo service.

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on Ctrl+C or SIGTERM.
///
/// Returns early, without cancelling, if `cancel` fires first. A handler that
/// cannot be installed counts as a shutdown request.
pub async fn cancel_on_shutdown(cancel: &CancellationToken) {
    let reason = tokio::select! {
        () = cancel.cancelled() => return,
        reason = interrupted() => reason,
        reason = terminated() => reason,
    };

    match reason {
        Ok(name) => tracing::info!(signal = name, "stopping echo service"),
        Err(e) => {
            tracing::error!(error = %e, "signal handler unavailable; stopping echo service");
        }
    }
    cancel.cancel();
}

async fn interrupted() -> std::io::Result<&'static str> {
    signal::ctrl_c().await?;
    Ok("SIGINT")
}

#[cfg(unix)]
async fn terminated() -> std::io::Result<&'static str> {
    use signal::unix::{SignalKind, signal as unix_signal};

    unix_signal(SignalKind::terminate())?.recv().await;
    Ok("SIGTERM")
}

#[cfg(not(unix))]
async fn terminated() -> std::io::Result<&'static str> {
    std::future::pending().await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            cancel_on_shutdown(&cancel),
        )
        .await
        .unwrap();
    }
}
