//! Paths of the auth service.

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const ME_PATH: &str = "/api/auth/me";
pub const PROFILE_PATH: &str = "/api/auth/profile";
pub const PASSWORD_PATH: &str = "/api/auth/password";
pub const ACCOUNT_PATH: &str = "/api/auth/account";

/// Endpoints whose 401 means bad input, not an expired session
pub const UNAUTHENTICATED_PATHS: [&str; 3] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];
