//! # `api`
//!
//! HTTP surface of the sidecar.
//!
//! ## Routes
//!
//! | method | path | |
//! |---|---|---|
//! | `POST` | `/verify/{integration}` | verify a payload for the named integration |
//! | `POST` | `/verify`, `/` | verify, integration taken from `x-irl-integration` |
//! | `GET` | `/health` | liveness, answers `ok` |
//!
//! When both the path and the header name an integration they must agree.
//!
//! ## Responses
//!
//! ### Accepted (`200`)
//!
//! ```json
//! { "status": "ACCEPTED", "integration": "python_qa", "forwarded": false }
//! ```
//!
//! ### Invariant violation (`422`)
//!
//! ```json
//! {
//!     "status": "INVARIANT_VIOLATION",
//!     "message": "Invariant Violation: [non_negative] total: total must be >= 0, got -50",
//!     "violations": [
//!         { "rule": "non_negative", "field": "total", "message": "total must be >= 0, got -50" }
//!     ]
//! }
//! ```
//!
//! ### Unauthorized (`401`)
//!
//! ```json
//! { "status": "UNAUTHORIZED", "code": "UNAUTHORIZED", "message": "Invalid API Key or Scope" }
//! ```
//!
//! ## Error Codes
//!
//! - 400: `MALFORMED_JSON`, `MISSING_INTEGRATION`, `INTEGRATION_MISMATCH`
//! - 404: `UNKNOWN_INTEGRATION`, `NOT_FOUND`
//! - 405: `METHOD_NOT_ALLOWED`
//! - 413: `PAYLOAD_TOO_LARGE`
//! - 502: `FORWARDING_FAILED`

pub mod accept;
pub mod process_request;
pub mod types;

use std::net::SocketAddr;

use anyhow::Result;
use hyper_util::rt::TokioIo;
use tokio::net::{
    TcpListener,
    TcpStream,
};
use tokio_util::sync::CancellationToken;

use crate::api::types::AppState;

/// Start the API server
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel_token: CancellationToken,
) -> Result<()> {
    // We start a loop to continuously accept incoming connections
    loop {
        tokio::select! {
                () = cancel_token.cancelled() => {
                    tracing::info!("Api received cancellation signal, shutting down...");
                    break;
                }
                res = listener.accept() => {
                    match res {
                        Ok((stream, socketaddr)) => {
                            serve_connection(socketaddr, &state, cancel_token.clone(), stream);
                        }
                        Err(err) => {
                            tracing::error!(?err, "Error accepting connection");
                        }
                    }
                }
        }
    }

    Ok(())
}

fn serve_connection(
    socketaddr: SocketAddr,
    state: &AppState,
    shutdown_token: CancellationToken,
    stream: TcpStream,
) {
    tracing::debug!("Connection from: {}", socketaddr);

    // Use an adapter to access something implementing `tokio::io` traits as if they implement
    // `hyper::rt` IO traits.
    let io = TokioIo::new(stream);
    let state = state.clone();

    // Spawn a tokio task to serve multiple connections concurrently
    tokio::task::spawn(async move {
        crate::accept!(io, state, socketaddr, shutdown_token);
    });
}
