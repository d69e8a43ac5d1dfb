//! Mapping of sidecar responses onto verification outcomes.

use crate::error::VerificationError;
use irl_core::{
    AcceptedBody,
    UNAUTHORIZED_DETAIL,
    ViolationReport,
};

/// A successful verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accepted {
    /// Integration echoed by the sidecar, when the body carried one.
    pub integration: Option<String>,
    /// Whether the sidecar forwarded the payload downstream.
    pub forwarded: bool,
}

impl Accepted {
    fn from_body(body: &str) -> Self {
        serde_json::from_str::<AcceptedBody>(body)
            .map(|body| {
                Self {
                    integration: Some(body.integration),
                    forwarded: body.forwarded,
                }
            })
            .unwrap_or_default()
    }
}

/// Classify a sidecar response.
///
/// | status | result |
/// |---|---|
/// | `200` | `Ok(Accepted)` |
/// | `422` | [`VerificationError::Rejected`] carrying the body |
/// | `401` | [`VerificationError::Unauthorized`] |
/// | other | [`VerificationError::Server`] carrying status and body |
pub fn classify(status: u16, body: String) -> Result<Accepted, VerificationError> {
    match status {
        200 => Ok(Accepted::from_body(&body)),
        422 => {
            let violations = serde_json::from_str::<ViolationReport>(&body)
                .map(|report| report.violations)
                .unwrap_or_default();
            Err(VerificationError::Rejected {
                detail: body,
                violations,
            })
        }
        401 => {
            Err(VerificationError::Unauthorized {
                detail: UNAUTHORIZED_DETAIL.to_string(),
            })
        }
        _ => Err(VerificationError::Server { status, body }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use irl_core::Violation;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_200_is_accepted_even_with_opaque_body() {
        assert_eq!(classify(200, String::new()).unwrap(), Accepted::default());

        let accepted = classify(
            200,
            r#"{"status":"ACCEPTED","integration":"python_qa","forwarded":true}"#.to_string(),
        )
        .unwrap();
        assert_eq!(accepted.integration.as_deref(), Some("python_qa"));
        assert!(accepted.forwarded);
    }

    #[test]
    fn test_422_keeps_raw_body_and_parses_violations() {
        let report = ViolationReport::new(vec![Violation::new(
            "non_negative",
            "total",
            "must be >= 0, got -50",
        )]);
        let body = serde_json::to_string(&report).unwrap();

        let err = classify(422, body.clone()).unwrap_err();
        assert_matches!(
            err,
            VerificationError::Rejected { detail, violations }
                if detail == body && violations == report.violations
        );
    }

    #[test]
    fn test_422_plain_text_body() {
        let err = classify(422, "total is negative".to_string()).unwrap_err();
        assert_matches!(
            err,
            VerificationError::Rejected { detail, violations }
                if detail == "total is negative" && violations.is_empty()
        );
    }

    #[test]
    fn test_401_has_fixed_detail() {
        let err = classify(401, "key abc not scoped for shopify".to_string()).unwrap_err();
        assert_matches!(
            err,
            VerificationError::Unauthorized { detail } if detail == "Invalid API Key or Scope"
        );
    }

    #[test]
    fn test_everything_else_is_server_error() {
        for status in [201, 204, 301, 400, 403, 404, 413, 500, 502, 503] {
            let err = classify(status, format!("body {status}")).unwrap_err();
            assert_matches!(
                err,
                VerificationError::Server { status: s, body } if s == status && body == format!("body {status}")
            );
        }
    }
}
