//! Session and API core for krasiot.
//!
//! - [`auth::SessionStore`]: persisted, observable session (user, tokens, theme)
//! - [`api::Gateway`]: bearer-token attachment and one-shot refresh on 401
//! - [`api::ApiClient`]: typed auth endpoints and the sign-in/out flows
//! - [`routes`]: route constants, the route guard and `Navigator`

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routes;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionState, SessionStore};
pub use config::Config;
