//! Hot reload of the registry file.
//!
//! The registry is re-read on `SIGHUP` and, when a poll interval is set,
//! whenever the file's modification time changes. A failed reload keeps the
//! previous registry serving.

use std::{
    path::Path,
    time::{
        Duration,
        SystemTime,
    },
};

use tokio::signal::unix::{
    SignalKind,
    signal,
};
use tokio_util::sync::CancellationToken;

use crate::registry::RegistryHandle;

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Watch for reload triggers until `cancel_token` is cancelled.
///
/// Returns immediately if the registry was not loaded from a file.
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed.
pub async fn watch_reload(
    registry: RegistryHandle,
    poll_interval: Option<Duration>,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let Some(path) = registry.source().map(Path::to_path_buf) else {
        return Ok(());
    };

    let mut sighup = signal(SignalKind::hangup())
        .map_err(|err| anyhow::anyhow!("Failed to install SIGHUP handler: {err}"))?;

    let mut last_modified = modified(&path);
    let mut ticker = poll_interval
        .filter(|interval| !interval.is_zero())
        .map(tokio::time::interval);

    tracing::debug!(
        path = %path.display(),
        ?poll_interval,
        "Watching registry for reloads"
    );

    loop {
        let tick = async {
            match ticker.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = cancel_token.cancelled() => {
                tracing::debug!("Registry watcher received cancellation signal");
                break;
            }
            _ = sighup.recv() => {
                tracing::info!(path = %path.display(), "Received SIGHUP, reloading registry");
                // Failures are logged and counted by the handle
                let _ = registry.reload();
                last_modified = modified(&path);
            }
            () = tick => {
                let current = modified(&path);
                if current.is_some() && current != last_modified {
                    tracing::info!(path = %path.display(), "Registry file changed, reloading");
                    let _ = registry.reload();
                    last_modified = current;
                }
            }
        }
    }

    Ok(())
}
