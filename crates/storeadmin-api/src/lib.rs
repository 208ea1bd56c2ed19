//! Axum HTTP API server for the store admin backend.
//!
//! This crate provides:
//! - Admin registration and login through Firebase Authentication
//! - Firebase ID token verification
//! - Product and order management endpoints
//! - Rate limiting, security headers, and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use auth::{AdminUser, AuthUser, JwksCache, TokenVerifier};
pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use identity::{IdentityClient, IdentityProvider, IdentitySession};
pub use response::ApiResponse;
pub use routes::create_router;
pub use services::AccountService;
pub use state::AppState;
