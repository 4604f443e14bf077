//! Utility functions for terminal output.

pub mod format;

pub use format::{format_duration_minutes, format_optional, mask_token};
