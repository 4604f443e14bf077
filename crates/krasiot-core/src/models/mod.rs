//! Data models for the krasiot account service.
//!
//! This module contains the data structures shared between the session
//! store and the API client:
//!
//! - `User`: the authenticated account profile
//! - `TokenBundle`, `AuthResponse`: access/refresh credentials
//! - `Theme`: UI preference persisted alongside the session

pub mod preferences;
pub mod token;
pub mod user;

pub use preferences::Theme;
pub use token::{AuthResponse, TokenBundle};
pub use user::User;
