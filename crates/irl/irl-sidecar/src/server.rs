use anyhow::Result;
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{
    api::types::AppState,
    forward::Forwarder,
    registry::RegistryHandle,
};

pub struct IrlSidecar {
    pub listener: TcpListener,
    pub registry: RegistryHandle,
    pub forwarder: Forwarder,
    /// Registry file poll interval. `None` reloads on `SIGHUP` only.
    pub reload_interval: Option<Duration>,
}

// Type alias for boxed future
pub type BoxedFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

impl IrlSidecar {
    /// Start the server
    /// Will run until either the API server or the registry watcher stops running.
    pub fn start(self, cancel_token: CancellationToken) -> (BoxedFuture, BoxedFuture) {
        let reload_handle = crate::reload::watch_reload(
            self.registry.clone(),
            self.reload_interval,
            cancel_token.clone(),
        );
        tracing::debug!("Started registry watcher");

        let state = AppState {
            registry: self.registry,
            forwarder: self.forwarder,
        };
        let api_handle = crate::api::serve(self.listener, state, cancel_token);

        tracing::info!("Started API server");

        (Box::pin(api_handle), Box::pin(reload_handle))
    }

    /// Run the server until the cancellation token is cancelled.
    pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        let (mut api_handle, mut reload_handle) = self.start(cancel_token.clone());
        tokio::select! {
            res = &mut api_handle => {
                res?;
                tracing::info!("Api stopped.");
                cancel_token.cancel();
                reload_handle.await?;
                tracing::info!("Registry watcher stopped.");
            }
            res = &mut reload_handle => {
                if let Err(e) = res {
                    metrics::counter!("irl_registry_watcher_errors_total").increment(1);
                    tracing::error!("Registry watcher failed, hot reload disabled: {:?}", e);
                } else {
                    tracing::info!("Registry watcher stopped.");
                }
                api_handle.await?;
                tracing::info!("Api stopped.");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_server_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let server = IrlSidecar {
            listener,
            registry: RegistryHandle::new(Registry::new()),
            forwarder: Forwarder::new(Duration::from_secs(1)).unwrap(),
            reload_interval: None,
        };

        // Create cancellation token and clone for later cancellation
        let cancel_token = CancellationToken::new();
        let cancel_token_clone = cancel_token.clone();

        // Run server in background task
        let server_handle = tokio::spawn(async move {
            server.run(cancel_token).await.unwrap();
        });

        // Wait briefly to ensure server is running
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Cancel the server
        cancel_token_clone.cancel();

        // Server should shutdown gracefully
        server_handle.await.unwrap();
    }
}
