use http_body_util::Full;
use hyper::{
    Response,
    StatusCode,
    body::Bytes,
    header::{
        CONTENT_TYPE,
        HeaderValue,
    },
};
use irl_core::{
    AcceptedBody,
    ErrorBody,
    ErrorCode,
    ViolationReport,
};
use serde::Serialize;

use crate::{
    forward::Forwarder,
    registry::RegistryHandle,
};

/// State shared by every connection.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
    pub forwarder: Forwarder,
}

/// Terminal state of a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(AcceptedBody),
    Rejected(ViolationReport),
    Failed(ErrorBody),
}

impl Verdict {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Verdict::Failed(ErrorBody::new(code, message))
    }

    pub fn unauthorized() -> Self {
        Verdict::Failed(ErrorBody::unauthorized())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Verdict::Accepted(_) => StatusCode::OK,
            Verdict::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Verdict::Failed(body) => {
                StatusCode::from_u16(body.code.status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Label used for the `outcome` metric dimension.
    pub fn outcome(&self) -> &'static str {
        match self {
            Verdict::Accepted(_) => "accepted",
            Verdict::Rejected(_) => "rejected",
            Verdict::Failed(body) if body.code == ErrorCode::Unauthorized => "unauthorized",
            Verdict::Failed(_) => "error",
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        match self {
            Verdict::Accepted(body) => json_response(status, &body),
            Verdict::Rejected(body) => json_response(status, &body),
            Verdict::Failed(body) => json_response(status, &body),
        }
    }
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to serialize response body");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

pub fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
