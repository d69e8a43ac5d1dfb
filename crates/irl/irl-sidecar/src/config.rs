use std::{
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;

use crate::{
    forward::Forwarder,
    registry::RegistryHandle,
    server::IrlSidecar,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Api server address
    #[arg(long, env = "IRL_LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: SocketAddr,
    /// Path of the TOML registry holding integration rules and API keys
    #[arg(long = "rules", env = "IRL_RULES_PATH")]
    pub rules_path: PathBuf,
    /// Require an API key for every integration. Overrides the registry file when set.
    #[arg(long, env = "IRL_REQUIRE_API_KEY")]
    pub require_api_key: Option<bool>,
    /// Timeout for forwarding accepted payloads downstream, in milliseconds
    #[arg(long, env = "IRL_FORWARD_TIMEOUT_MS", default_value = "5000")]
    pub forward_timeout_ms: u64,
    /// Poll the registry file for changes every N seconds. 0 reloads on SIGHUP only.
    #[arg(long, env = "IRL_RELOAD_INTERVAL_SECS", default_value = "0")]
    pub reload_interval_secs: u64,
    /// Log level
    #[arg(long, env = "IRL_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}

impl Config {
    /// Build the IRL sidecar
    pub async fn build(self) -> anyhow::Result<IrlSidecar> {
        let registry = RegistryHandle::from_path(&self.rules_path, self.require_api_key)?;
        tracing::info!(
            rules_path = %self.rules_path.display(),
            integrations = registry.load().integration_count(),
            "Opened registry"
        );

        let forwarder = Forwarder::new(Duration::from_millis(self.forward_timeout_ms))?;

        // Bind to an address
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(listen_addr = ?self.listen_addr, "Listening on address");

        let reload_interval =
            (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs));

        Ok(IrlSidecar {
            listener,
            registry,
            forwarder,
            reload_interval,
        })
    }
}
