use crate::{
    MAX_BODY_SIZE,
    api::{
        process_request::{
            VerifyRequest,
            process_request,
        },
        types::{
            AppState,
            Verdict,
            text_response,
        },
    },
};

use core::convert::Infallible;
use std::{
    net::SocketAddr,
    time::Instant,
};

use http_body_util::{
    BodyExt,
    Full,
    LengthLimitError,
    Limited,
};
use hyper::{
    HeaderMap,
    Method,
    Request,
    Response,
    StatusCode,
    body::Bytes,
};
use irl_core::{
    API_KEY_HEADER,
    ErrorCode,
    INTEGRATION_HEADER,
    VERIFY_PATH,
};
use uuid::Uuid;

/// Where a request path leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    /// `/verify/{integration}` carries the name, `/verify` and `/` do not.
    Verify(Option<String>),
    NotFound,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        if path == "/health" {
            return Route::Health;
        }
        if path == "/" || path.trim_end_matches('/') == VERIFY_PATH {
            return Route::Verify(None);
        }

        let Some(rest) = path
            .strip_prefix(VERIFY_PATH)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return Route::NotFound;
        };
        let segment = rest.strip_suffix('/').unwrap_or(rest);
        if segment.is_empty() || segment.contains('/') {
            return Route::NotFound;
        }

        match urlencoding::decode(segment) {
            Ok(name) => Route::Verify(Some(name.into_owned())),
            Err(_) => Route::NotFound,
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Accepts an incoming HTTP request and answers it with a verdict.
#[tracing::instrument(level = "debug", skip_all, target = "api::accept_request", fields(%client_addr))]
pub async fn accept_request<B>(
    req: Request<B>,
    state: AppState,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path_integration = match Route::from_path(req.uri().path()) {
        Route::Health if method == Method::GET => {
            return Ok(text_response(StatusCode::OK, "ok"));
        }
        Route::Verify(name) if method == Method::POST => name,
        Route::Health | Route::Verify(_) => {
            return Ok(Verdict::error(
                ErrorCode::MethodNotAllowed,
                format!("Method {method} not allowed"),
            )
            .into_response());
        }
        Route::NotFound => {
            return Ok(Verdict::error(
                ErrorCode::NotFound,
                format!("No route for {}", req.uri().path()),
            )
            .into_response());
        }
    };

    let request_id = Uuid::new_v4();
    let headers = req.headers();
    let header_integration = header_value(headers, INTEGRATION_HEADER);
    let api_key = header_value(headers, API_KEY_HEADER);

    tracing::debug!(target: "api::accept_request", %request_id, "Incoming verify request");

    let verdict = match Limited::new(req.into_body(), MAX_BODY_SIZE).collect().await {
        Ok(collected) => {
            let request = VerifyRequest {
                path_integration,
                header_integration,
                api_key,
                body: collected.to_bytes(),
            };
            process_request(&state, request, request_id).await
        }
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Verdict::error(
                ErrorCode::PayloadTooLarge,
                format!("Payload exceeds {MAX_BODY_SIZE} bytes"),
            )
        }
        Err(err) => {
            tracing::warn!(target: "api::accept_request", %request_id, error = %err, "Failed to read request body");
            Verdict::error(ErrorCode::MalformedJson, "Failed to read request body")
        }
    };

    let outcome = verdict.outcome();
    let status = verdict.status();
    metrics::counter!("irl_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("irl_request_duration_seconds").record(started.elapsed().as_secs_f64());
    tracing::info!(
        target: "api::accept_request",
        %request_id,
        outcome,
        status = status.as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );

    Ok(verdict.into_response())
}

/// Macros for accepting requests
#[macro_export]
macro_rules! accept {
    (
        $io:expr,
        $state:expr,
        $client_addr:expr,
        $shutdown_token:expr
    ) => {
        let state = $state;
        let client_addr = $client_addr;
        let shutdown_token = $shutdown_token;
        // Bind the incoming connection to our service
        let connection = hyper::server::conn::http1::Builder::new().serve_connection(
            $io,
            hyper::service::service_fn(move |req| {
                let state = state.clone();
                async move { $crate::api::accept::accept_request(req, state, client_addr).await }
            }),
        );
        tokio::pin!(connection);

        tokio::select! {
            res = connection.as_mut() => {
                if let Err(err) = res {
                    tracing::debug!(?err, "Error serving connection");
                }
            }
            () = shutdown_token.cancelled() => {
                connection.as_mut().graceful_shutdown();
                if let Err(err) = connection.await {
                    tracing::debug!(?err, "Error finishing connection during shutdown");
                }
            }
        }
    };
}
