use hyper::body::Bytes;
use irl_core::{
    AcceptedBody,
    ErrorCode,
    ViolationReport,
};
use serde_json::Value;
use tracing::{
    debug,
    info,
    warn,
};
use uuid::Uuid;

use crate::api::types::{
    AppState,
    Verdict,
};

/// A verify request after routing, before any verification.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    /// Integration named by a `/verify/{integration}` path.
    pub path_integration: Option<String>,
    /// Value of the `x-irl-integration` header.
    pub header_integration: Option<String>,
    /// Value of the `x-irl-api-key` header.
    pub api_key: Option<String>,
    pub body: Bytes,
}

/// Run a request through the verification steps.
///
/// The steps run in a fixed order, each able to end the request:
/// parse, resolve integration, authorize, validate, forward. An unknown
/// integration is reported before any key is checked and a refused key is
/// reported before any rule runs.
#[tracing::instrument(
    level = "debug",
    skip_all,
    target = "api::process_request",
    fields(%request_id, integration)
)]
pub async fn process_request(state: &AppState, request: VerifyRequest, request_id: Uuid) -> Verdict {
    let payload: Value = match serde_json::from_slice(&request.body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(target: "api::process_request", %request_id, error = %err, "Payload is not valid JSON");
            return Verdict::error(
                ErrorCode::MalformedJson,
                format!("Payload is not valid JSON: {err}"),
            );
        }
    };

    let name = match resolve_integration(
        request.path_integration.as_deref(),
        request.header_integration.as_deref(),
    ) {
        Ok(name) => name,
        Err(verdict) => return verdict,
    };
    tracing::Span::current().record("integration", name.as_str());

    let registry = state.registry.load();
    let Some(integration) = registry.integration(&name) else {
        warn!(target: "api::process_request", %request_id, integration = %name, "Unknown integration");
        return Verdict::error(
            ErrorCode::UnknownIntegration,
            format!("Unknown integration '{name}'"),
        );
    };

    if let Err(denial) = registry.authorize(&name, integration, request.api_key.as_deref()) {
        warn!(target: "api::process_request", %request_id, integration = %name, reason = denial.as_str(), "Request not authorized");
        return Verdict::unauthorized();
    }

    let violations = integration.rules.check(&payload);
    if !violations.is_empty() {
        info!(target: "api::process_request", %request_id, integration = %name, violations = violations.len(), "Payload violates integration rules");
        return Verdict::Rejected(ViolationReport::new(violations));
    }

    let forwarded = match &integration.forward_to {
        Some(target) => {
            debug!(target: "api::process_request", %request_id, integration = %name, downstream = %target, "Forwarding payload");
            if let Err(err) = state.forwarder.forward(target, &name, request.body.clone()).await {
                warn!(target: "api::process_request", %request_id, integration = %name, error = %err, "Forwarding failed");
                return Verdict::error(
                    ErrorCode::ForwardingFailed,
                    format!("Payload was valid but forwarding failed: {err}"),
                );
            }
            true
        }
        None => false,
    };

    Verdict::Accepted(AcceptedBody::new(name, forwarded))
}

/// Pick the integration from the path or, for fixed-URL callers, the header.
fn resolve_integration(path: Option<&str>, header: Option<&str>) -> Result<String, Verdict> {
    let path = path.map(str::trim).filter(|p| !p.is_empty());
    let header = header.map(str::trim).filter(|h| !h.is_empty());
    match (path, header) {
        (Some(path), Some(header)) if path != header => {
            Err(Verdict::error(
                ErrorCode::IntegrationMismatch,
                format!("Path integration '{path}' does not match x-irl-integration '{header}'"),
            ))
        }
        (Some(name), _) | (None, Some(name)) => Ok(name.to_string()),
        (None, None) => {
            Err(Verdict::error(
                ErrorCode::MissingIntegration,
                "No integration in the path or the x-irl-integration header",
            ))
        }
    }
}
