//! Wire contract for the IRL verification sidecar.
//!
//! A client submits a raw JSON payload for a named integration and the
//! sidecar answers with a status code:
//!
//! | status | meaning |
//! |---|---|
//! | `200` | payload accepted ([`AcceptedBody`]) |
//! | `422` | a domain invariant was violated ([`ViolationReport`]) |
//! | `401` | API key missing or not scoped for the integration |
//! | other | sidecar fault ([`ErrorBody`]) |
#![allow(clippy::must_use_candidate)]

mod endpoint;
mod response;

pub use endpoint::{
    EndpointMode,
    ParseEndpointModeError,
};
pub use response::{
    AcceptedBody,
    ErrorBody,
    ErrorCode,
    Violation,
    ViolationReport,
    VerdictStatus,
};

/// Header carrying the integration name. Always sent.
pub const INTEGRATION_HEADER: &str = "x-irl-integration";

/// Header carrying the optional API key.
pub const API_KEY_HEADER: &str = "x-irl-api-key";

/// Path of the verify endpoint. Templated callers append `/{integration}`.
pub const VERIFY_PATH: &str = "/verify";

/// Detail reported for every 401, regardless of whether the key was
/// missing, unknown or out of scope.
pub const UNAUTHORIZED_DETAIL: &str = "Invalid API Key or Scope";
