//! Application routes and navigation.

use std::sync::Mutex;

pub const HOME_ROUTE: &str = "/";
pub const LOGIN_ROUTE: &str = "/login";
pub const SIGNUP_ROUTE: &str = "/signup";
pub const PROFILE_ROUTE: &str = "/profile";

/// Where to send the user for a protected route, or `None` to stay.
///
/// Authenticated users go to `redirect_on_authentication`, everyone else to
/// `authentication_path`; no redirect when already there.
pub fn guard<'a>(
    authenticated: bool,
    current: &str,
    authentication_path: &'a str,
    redirect_on_authentication: &'a str,
) -> Option<&'a str> {
    let target = if authenticated {
        redirect_on_authentication
    } else {
        authentication_path
    };

    if target != current {
        Some(target)
    } else {
        None
    }
}

/// Receives redirects issued by the gateway (forced logout) or the front end.
pub trait Navigator: Send + Sync {
    fn redirect(&self, route: &str);
}

/// Ignores redirects
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect(&self, _route: &str) {}
}

/// Keeps every redirect in order; the front end polls it after each command.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.routes.lock().ok().and_then(|r| r.last().cloned())
    }

    /// Drain recorded redirects
    pub fn take(&self) -> Vec<String> {
        self.routes
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: &str) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route.to_string());
        }
    }
}
