use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

use crate::UNAUTHORIZED_DETAIL;

/// Discriminator carried in the `status` field of every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Accepted,
    InvariantViolation,
    Unauthorized,
    Error,
}

/// Body of a `200` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedBody {
    pub status: VerdictStatus,
    pub integration: String,
    /// Whether the payload was passed on to a downstream system of record.
    pub forwarded: bool,
}

impl AcceptedBody {
    pub fn new(integration: impl Into<String>, forwarded: bool) -> Self {
        Self {
            status: VerdictStatus::Accepted,
            integration: integration.into(),
            forwarded,
        }
    }
}

/// A single failed domain rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule kind, e.g. `non_negative`.
    pub rule: String,
    /// Dot-separated path of the offending field.
    pub field: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl Violation {
    pub fn new(rule: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.rule, self.field, self.message)
    }
}

/// Body of a `422` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub status: VerdictStatus,
    /// Summary naming every violated rule, readable without parsing `violations`.
    pub message: String,
    pub violations: Vec<Violation>,
}

impl ViolationReport {
    pub fn new(violations: Vec<Violation>) -> Self {
        let details = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            status: VerdictStatus::InvariantViolation,
            message: format!("Invariant Violation: {details}"),
            violations,
        }
    }
}

/// Machine-readable failure reason for non-422 errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MalformedJson,
    MissingIntegration,
    IntegrationMismatch,
    UnknownIntegration,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    Unauthorized,
    ForwardingFailed,
    InternalError,
}

impl ErrorCode {
    /// HTTP status the sidecar answers with for this code.
    ///
    /// Unknown integrations answer `404` so they are never confused with a
    /// `422` domain violation.
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::MalformedJson
            | ErrorCode::MissingIntegration
            | ErrorCode::IntegrationMismatch => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::UnknownIntegration | ErrorCode::NotFound => 404,
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::InternalError => 500,
            ErrorCode::ForwardingFailed => 502,
        }
    }
}

/// Body of every response that is neither `200` nor `422`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: VerdictStatus,
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let status = if code == ErrorCode::Unauthorized {
            VerdictStatus::Unauthorized
        } else {
            VerdictStatus::Error
        };
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, UNAUTHORIZED_DETAIL)
    }
}
