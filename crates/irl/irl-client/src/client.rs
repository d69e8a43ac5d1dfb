use std::{
    sync::Arc,
    time::Instant,
};

use irl_core::{
    API_KEY_HEADER,
    EndpointMode,
    INTEGRATION_HEADER,
};
use reqwest::{
    Body,
    header::{
        CONTENT_TYPE,
        HeaderValue,
    },
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{
    debug,
    warn,
};
use url::Url;

use crate::{
    classify::{
        Accepted,
        classify,
    },
    config::ClientConfig,
    endpoint::resolve_endpoint,
    error::{
        ClientError,
        VerificationError,
    },
};

/// A client for the IRL verification sidecar.
///
/// Cloning is cheap: clones share the connection pool and the in-flight
/// request limit.
#[derive(Debug, Clone)]
pub struct VerifyClient {
    client: reqwest::Client,
    base_url: Url,
    mode: EndpointMode,
    api_key: Option<HeaderValue>,
    permits: Arc<Semaphore>,
}

impl VerifyClient {
    /// Create a new client. Fails fast on an invalid configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.validate()?;

        let api_key = config
            .api_key
            .as_deref()
            .map(|key| {
                let mut value = HeaderValue::from_str(key).map_err(|_| {
                    ClientError::ConfigError("API key is not a valid header value".to_string())
                })?;
                value.set_sensitive(true);
                Ok::<_, ClientError>(value)
            })
            .transpose()?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .http1_only()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            mode: config.mode,
            api_key,
            permits: Arc::new(Semaphore::new(config.max_in_flight)),
        })
    }

    /// The URL a verification for `integration` is posted to.
    pub fn endpoint(&self, integration: &str) -> Result<Url, VerificationError> {
        resolve_endpoint(&self.base_url, self.mode, integration)
    }

    /// Verify a raw JSON payload for `integration`.
    ///
    /// The payload is sent unmodified; the sidecar is the one judging whether
    /// it is valid JSON. Nothing is retried.
    #[tracing::instrument(level = "debug", skip_all, fields(integration = %integration))]
    pub async fn verify(
        &self,
        integration: &str,
        payload: impl Into<Body>,
    ) -> Result<Accepted, VerificationError> {
        let endpoint = self.endpoint(integration)?;
        let integration_value = HeaderValue::from_str(integration).map_err(|_| {
            VerificationError::InvalidRequest(format!(
                "Integration name '{integration}' is not a valid header value"
            ))
        })?;

        let _permit = self.permits.acquire().await.map_err(|_| {
            VerificationError::InvalidRequest("Verification client is closed".to_string())
        })?;

        let mut request = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(INTEGRATION_HEADER, integration_value);
        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key.clone());
        }

        let started = Instant::now();
        let response = request.body(payload).send().await.map_err(|err| {
            warn!(%endpoint, error = %err, "Failed to reach IRL sidecar");
            VerificationError::Transport(err)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            warn!(%endpoint, status, error = %err, "Failed to read IRL sidecar response");
            VerificationError::Transport(err)
        })?;

        debug!(
            %endpoint,
            status,
            duration_ms = started.elapsed().as_millis(),
            "Received verdict"
        );

        classify(status, body)
    }

    /// Serialize `payload` as JSON and verify it.
    pub async fn verify_json<T: Serialize + ?Sized>(
        &self,
        integration: &str,
        payload: &T,
    ) -> Result<Accepted, VerificationError> {
        let bytes = serde_json::to_vec(payload).map_err(|err| {
            VerificationError::InvalidRequest(format!("Failed to serialize payload: {err}"))
        })?;
        self.verify(integration, bytes).await
    }
}
