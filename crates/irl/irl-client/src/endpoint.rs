//! Resolution of the verify endpoint from the configured sidecar URL.

use crate::error::VerificationError;
use irl_core::{
    EndpointMode,
    VERIFY_PATH,
};
use url::Url;

/// Resolve the URL a verification for `integration` is posted to.
///
/// In [`EndpointMode::Templated`] the trailing slash of `base` is dropped and
/// `/verify/{integration}` is appended, with the integration encoded as a
/// single path segment. A templated base that already ends in `/verify` is
/// a legacy fixed URL and is returned unchanged. [`EndpointMode::Fixed`]
/// always returns `base` unchanged.
pub fn resolve_endpoint(
    base: &Url,
    mode: EndpointMode,
    integration: &str,
) -> Result<Url, VerificationError> {
    if integration.trim().is_empty() {
        return Err(VerificationError::InvalidRequest(
            "Integration name cannot be empty".to_string(),
        ));
    }
    if integration.trim() != integration {
        return Err(VerificationError::InvalidRequest(format!(
            "Integration name '{integration}' has leading or trailing whitespace"
        )));
    }

    if mode == EndpointMode::Fixed || base.path().trim_end_matches('/').ends_with(VERIFY_PATH) {
        return Ok(base.clone());
    }

    let mut endpoint = base.clone();
    endpoint
        .path_segments_mut()
        .map_err(|()| {
            VerificationError::InvalidRequest(format!("Sidecar URL '{base}' cannot carry a path"))
        })?
        .pop_if_empty()
        .push(VERIFY_PATH.trim_start_matches('/'))
        .push(integration);

    Ok(endpoint)
}
