//! REST API client module for the krasiot auth service.
//!
//! This module provides the `Gateway`, which attaches the session's bearer
//! token to every request and refreshes it once on 401, and the `ApiClient`
//! built on top of it for the individual auth endpoints.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, RegisterRequest, UpdateProfileRequest};
pub use error::ApiError;
pub use gateway::{Gateway, GatewayConfig};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
