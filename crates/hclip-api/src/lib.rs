//! Axum HTTP API server.
//!
//! This crate provides:
//! - The highlight endpoints (upload and URL)
//! - Liveness and readiness probes
//! - Request ID, request logging and CORS middleware
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
