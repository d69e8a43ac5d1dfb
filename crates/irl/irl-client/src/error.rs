//! Error types for the IRL client

use irl_core::Violation;
use thiserror::Error;

/// Every way a verification call can fail.
///
/// Exactly one variant describes a failed call. `Rejected` and
/// `Unauthorized` are meaningful verdicts from the sidecar; `Server` and
/// `Transport` mean the sidecar itself could not produce one.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The payload was evaluated and violates an integration rule (`422`).
    #[error("Invariant Violation: {detail}")]
    Rejected {
        /// Raw response body.
        detail: String,
        /// Structured violations, empty when the body was not a violation report.
        violations: Vec<Violation>,
    },

    /// The API key was missing or not scoped for the integration (`401`).
    #[error("Unauthorized: {detail}")]
    Unauthorized { detail: String },

    /// The sidecar could not be reached or the exchange broke mid-flight.
    #[error("Failed to reach IRL sidecar: {0}")]
    Transport(#[source] reqwest::Error),

    /// Any other status code.
    #[error("IRL sidecar error {status}: {body}")]
    Server { status: u16, body: String },

    /// The request could not be built; nothing was sent.
    #[error("Invalid verification request: {0}")]
    InvalidRequest(String),
}

impl VerificationError {
    /// Only transport failures may succeed when re-sent unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VerificationError::Transport(_))
    }

    /// Status code returned by the sidecar, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            VerificationError::Rejected { .. } => Some(422),
            VerificationError::Unauthorized { .. } => Some(401),
            VerificationError::Server { status, .. } => Some(*status),
            VerificationError::Transport(_) | VerificationError::InvalidRequest(_) => None,
        }
    }
}

/// Errors raised while constructing a [`crate::VerifyClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_transport_is_retryable() {
        let errors = [
            VerificationError::Rejected {
                detail: "bad".to_string(),
                violations: vec![],
            },
            VerificationError::Unauthorized {
                detail: "nope".to_string(),
            },
            VerificationError::Server {
                status: 500,
                body: "boom".to_string(),
            },
            VerificationError::InvalidRequest("empty".to_string()),
        ];
        for err in errors {
            assert!(!err.is_retryable(), "{err:?}");
        }
    }

    #[test]
    fn test_status_codes() {
        let rejected = VerificationError::Rejected {
            detail: String::new(),
            violations: vec![],
        };
        assert_eq!(rejected.status(), Some(422));
        assert_eq!(
            VerificationError::Server {
                status: 404,
                body: String::new()
            }
            .status(),
            Some(404)
        );
        assert_eq!(
            VerificationError::InvalidRequest(String::new()).status(),
            None
        );
    }

    #[test]
    fn test_display_messages() {
        let err = VerificationError::Server {
            status: 502,
            body: "downstream unreachable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "IRL sidecar error 502: downstream unreachable"
        );

        let err = VerificationError::Rejected {
            detail: "total must be >= 0".to_string(),
            violations: vec![],
        };
        assert!(err.to_string().starts_with("Invariant Violation"));
    }

    #[test]
    fn test_client_error_from_url_parse() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err = ClientError::from(parse_err);
        assert_matches!(err, ClientError::UrlParseError(_));
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<VerificationError>();
        assert_send_sync::<ClientError>();
    }
}
