#![allow(dead_code)]

use std::{
    io::Write,
    net::SocketAddr,
    path::Path,
    time::Duration,
};

use irl_client::{
    ClientConfig,
    VerifyClient,
};
use irl_sidecar::Config;
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

/// A sidecar running on a random local port, stopped on drop.
pub struct TestSidecar {
    pub addr: SocketAddr,
    pub registry_file: NamedTempFile,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TestSidecar {
    pub async fn spawn(registry: &str) -> Self {
        Self::spawn_with(registry, None, 0).await
    }

    pub async fn spawn_with(
        registry: &str,
        require_api_key: Option<bool>,
        reload_interval_secs: u64,
    ) -> Self {
        let mut registry_file = NamedTempFile::new().unwrap();
        registry_file.write_all(registry.as_bytes()).unwrap();

        let config = Config {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            rules_path: registry_file.path().to_path_buf(),
            require_api_key,
            forward_timeout_ms: 1000,
            reload_interval_secs,
            log_level: LevelFilter::current(),
        };
        let server = config.build().await.unwrap();
        let addr = server.listener.local_addr().unwrap();

        let cancel_token = CancellationToken::new();
        let cancel_token_clone = cancel_token.clone();
        let handle = tokio::spawn(async move {
            server.run(cancel_token_clone).await.unwrap();
        });

        Self {
            addr,
            registry_file,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> VerifyClient {
        VerifyClient::new(ClientConfig::new(self.url())).unwrap()
    }

    pub fn client_with(&self, config: impl FnOnce(ClientConfig) -> ClientConfig) -> VerifyClient {
        VerifyClient::new(config(ClientConfig::new(self.url()))).unwrap()
    }

    pub fn registry_path(&self) -> &Path {
        self.registry_file.path()
    }

    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}

impl Drop for TestSidecar {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
