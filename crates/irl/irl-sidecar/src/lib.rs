#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod api;
mod config;
pub mod forward;
pub mod registry;
pub mod reload;
mod server;

pub use config::Config;
pub use server::IrlSidecar;

/// Maximum accepted request body (10MB).
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
