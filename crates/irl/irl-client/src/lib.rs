//! Client for the IRL verification sidecar.
//!
//! ```no_run
//! use irl_client::{ClientConfig, VerificationError, VerifyClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = VerifyClient::new(ClientConfig::new("http://localhost:3000"))?;
//!
//!     match client.verify("python_qa", r#"{"total": -50, "items": []}"#).await {
//!         Ok(_) => println!("accepted"),
//!         Err(VerificationError::Rejected { detail, .. }) => println!("rejected: {detail}"),
//!         Err(err) => return Err(err.into()),
//!     }
//!     Ok(())
//! }
//! ```
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod classify;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;

pub use classify::{
    Accepted,
    classify,
};
pub use client::VerifyClient;
pub use config::ClientConfig;
pub use error::{
    ClientError,
    VerificationError,
};
pub use irl_core::{
    EndpointMode,
    Violation,
};
