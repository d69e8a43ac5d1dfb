//! Configuration for the IRL client

use crate::error::ClientError;
use irl_core::EndpointMode;
use std::{
    fmt,
    str::FromStr,
    time::Duration,
};
use url::Url;

/// Sidecar URL used when `IRL_SIDECAR_URL` is unset.
pub const DEFAULT_SIDECAR_URL: &str = "http://localhost:3000";

/// Connect timeout applied unless overridden.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on simultaneous requests shared by all clones of a client.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 8;

/// Configuration for [`crate::VerifyClient`]
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    /// Sidecar base URL, or the full verify URL in [`EndpointMode::Fixed`]
    pub base_url: String,
    pub mode: EndpointMode,
    /// Sent as `x-irl-api-key` when set and non-empty
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    /// Bound on the whole exchange. `None` leaves only the connect timeout.
    pub request_timeout: Option<Duration>,
    pub max_in_flight: usize,
    pub pool_max_idle_per_host: usize,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new configuration with default timeouts and limits
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            mode: EndpointMode::default(),
            api_key: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
        }
    }

    /// Create a configuration from environment variables
    ///
    /// Reads `IRL_SIDECAR_URL`, `IRL_API_KEY` and `IRL_ENDPOINT_MODE`. An
    /// invalid mode is an error rather than a silent fallback.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url =
            std::env::var("IRL_SIDECAR_URL").unwrap_or_else(|_| DEFAULT_SIDECAR_URL.to_string());
        let mut config = Self::new(base_url);

        if let Ok(key) = std::env::var("IRL_API_KEY") {
            config = config.with_api_key(key);
        }
        if let Ok(mode) = std::env::var("IRL_ENDPOINT_MODE") {
            let mode = EndpointMode::from_str(&mode)
                .map_err(|err| ClientError::ConfigError(err.to_string()))?;
            config = config.with_mode(mode);
        }

        Ok(config)
    }

    pub fn with_mode(mut self, mode: EndpointMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the API key. An empty key is treated as no key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Validate the configuration and return the parsed base URL
    pub fn validate(&self) -> Result<Url, ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::ConfigError(
                "Sidecar URL cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(&self.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::ConfigError(format!(
                "Sidecar URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ClientError::ConfigError(format!(
                "Sidecar URL '{url}' cannot carry a path"
            )));
        }

        if let Some(key) = &self.api_key {
            if key.trim().is_empty() {
                return Err(ClientError::ConfigError(
                    "API key cannot be whitespace".to_string(),
                ));
            }
        }

        if self.max_in_flight == 0 {
            return Err(ClientError::ConfigError(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ClientError::ConfigError(
                "Connect timeout must be non-zero".to_string(),
            ));
        }

        Ok(url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SIDECAR_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.mode, EndpointMode::Templated);
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.api_key, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_api_key_is_no_key() {
        let config = ClientConfig::default().with_api_key("");
        assert_eq!(config.api_key, None);

        let config = ClientConfig::default().with_api_key("secret");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ClientConfig::default().with_api_key("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert_matches!(
            ClientConfig::new("").validate(),
            Err(ClientError::ConfigError(msg)) if msg.contains("empty")
        );
        assert_matches!(
            ClientConfig::new("not a url").validate(),
            Err(ClientError::UrlParseError(_))
        );
        assert_matches!(
            ClientConfig::new("ftp://localhost:3000").validate(),
            Err(ClientError::ConfigError(msg)) if msg.contains("http or https")
        );
        assert_matches!(
            ClientConfig::new("mailto:ops@example.com").validate(),
            Err(ClientError::ConfigError(_))
        );
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        assert_matches!(
            ClientConfig::default().with_max_in_flight(0).validate(),
            Err(ClientError::ConfigError(msg)) if msg.contains("max_in_flight")
        );
        assert_matches!(
            ClientConfig::default().with_api_key("   ").validate(),
            Err(ClientError::ConfigError(msg)) if msg.contains("API key")
        );
        assert_matches!(
            ClientConfig::default()
                .with_connect_timeout(Duration::ZERO)
                .validate(),
            Err(ClientError::ConfigError(_))
        );
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("IRL_SIDECAR_URL", "http://sidecar:9000");
            std::env::set_var("IRL_API_KEY", "key-123");
            std::env::set_var("IRL_ENDPOINT_MODE", "fixed");
        }
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url, "http://sidecar:9000");
        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.mode, EndpointMode::Fixed);

        unsafe {
            std::env::set_var("IRL_ENDPOINT_MODE", "sideways");
        }
        assert_matches!(
            ClientConfig::from_env(),
            Err(ClientError::ConfigError(msg)) if msg.contains("sideways")
        );

        unsafe {
            std::env::remove_var("IRL_SIDECAR_URL");
            std::env::remove_var("IRL_API_KEY");
            std::env::remove_var("IRL_ENDPOINT_MODE");
        }
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config, ClientConfig::default());
    }
}
