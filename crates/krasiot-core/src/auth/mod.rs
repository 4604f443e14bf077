//! Authentication state for the current user.
//!
//! This module provides:
//! - `SessionStore`: the persisted, observable session (user, tokens, theme)
//! - `CredentialStore`: remembered passwords in the OS keychain, per account and server
//!
//! The session is written to `krasiot-storage.json` in the cache directory
//! on every change and restored from it on startup.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialError, CredentialStore};
pub use session::{SessionState, SessionStore, STORAGE_KEY};
