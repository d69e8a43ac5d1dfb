//! Forwarding of accepted payloads to an integration's system of record.

use std::time::Duration;

use hyper::body::Bytes;
use irl_core::INTEGRATION_HEADER;
use reqwest::header::CONTENT_TYPE;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("downstream {target} unreachable: {source}")]
    Unreachable {
        target: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("downstream {target} answered {status}")]
    Status { target: Url, status: u16 },
}

/// Posts accepted payloads downstream over a shared connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Send the original payload bytes. Any non-2xx answer is a failure.
    pub async fn forward(
        &self,
        target: &Url,
        integration: &str,
        payload: Bytes,
    ) -> Result<(), ForwardError> {
        let response = self
            .client
            .post(target.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(INTEGRATION_HEADER, integration)
            .body(payload)
            .send()
            .await
            .map_err(|source| {
                ForwardError::Unreachable {
                    target: target.clone(),
                    source,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status {
                target: target.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
