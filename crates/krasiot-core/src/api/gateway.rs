//! Authenticated request pipeline.
//!
//! Every call goes through [`Gateway::execute`], which attaches the stored
//! access token and recovers from an expired session by refreshing once:
//!
//! ```text
//! Initial ──non-401──────────────────────────────▶ Done
//!    │ 401 (protected, caller did not pin a token)
//!    ▼
//! Refreshing ──refresh ok──▶ Retried ──any──────▶ Done
//!    │ no refresh token / refresh failed
//!    └──logout + redirect to login──────────────▶ Done (original 401)
//! ```
//!
//! Refreshes are serialized: a request that lost the race finds the token
//! already rotated and retries without refreshing again.

use std::sync::Arc;

use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::SessionStore;
use crate::models::{AuthResponse, TokenBundle};
use crate::routes::{Navigator, LOGIN_ROUTE};

use super::client::RefreshRequest;
use super::endpoints::{REFRESH_PATH, UNAUTHENTICATED_PATHS};
use super::transport::{ApiRequest, ApiResponse, Transport};
use super::ApiError;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Endpoint used to mint new tokens
    pub refresh_path: String,
    /// Paths (matched by substring) whose 401 is returned untouched
    pub unauthenticated_paths: Vec<String>,
    /// Where the navigator is sent after a forced logout
    pub login_route: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            refresh_path: REFRESH_PATH.to_string(),
            unauthenticated_paths: UNAUTHENTICATED_PATHS.iter().map(|p| p.to_string()).collect(),
            login_route: LOGIN_ROUTE.to_string(),
        }
    }
}

/// Per-request progress through the pipeline
#[derive(Debug)]
enum RequestState {
    Initial,
    Refreshing {
        failed: ApiResponse,
        sent_with: Option<String>,
    },
    Retried,
    Done(ApiResponse),
}

#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    config: GatewayConfig,
    refresh_lock: Arc<Mutex<()>>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            transport,
            store,
            navigator,
            config,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send a request, refreshing the session at most once on 401.
    ///
    /// Returns the final response whatever its status; `Err` only when the
    /// transport produced no response.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut state = RequestState::Initial;
        loop {
            state = match state {
                RequestState::Initial => {
                    let response = self.dispatch(&mut request).await?;
                    self.after_first_attempt(&request, response)
                }
                RequestState::Refreshing { failed, sent_with } => {
                    self.recover(failed, sent_with).await
                }
                RequestState::Retried => {
                    let response = self.dispatch(&mut request).await?;
                    if response.status == StatusCode::UNAUTHORIZED {
                        warn!(path = %request.path, "Request still unauthorized after refresh");
                    }
                    RequestState::Done(response)
                }
                RequestState::Done(response) => return Ok(response),
            };
        }
    }

    fn after_first_attempt(&self, request: &ApiRequest, response: ApiResponse) -> RequestState {
        if response.status != StatusCode::UNAUTHORIZED {
            return RequestState::Done(response);
        }
        if self.is_unauthenticated_endpoint(&request.path) {
            debug!(path = %request.path, "401 from auth endpoint, not refreshing");
            return RequestState::Done(response);
        }
        if request.bearer_override.is_some() {
            debug!(path = %request.path, "401 with caller-supplied token, not refreshing");
            return RequestState::Done(response);
        }
        RequestState::Refreshing {
            failed: response,
            sent_with: request.bearer.clone(),
        }
    }

    async fn dispatch(&self, request: &mut ApiRequest) -> Result<ApiResponse, ApiError> {
        request.bearer = match request.bearer_override {
            Some(ref token) => Some(token.clone()),
            None => self.store.access_token(),
        }
        .filter(|token| !token.is_empty());
        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = request.bearer.is_some(),
            "Dispatching request"
        );
        self.transport.send(request).await
    }

    async fn recover(&self, failed: ApiResponse, sent_with: Option<String>) -> RequestState {
        let _guard = self.refresh_lock.lock().await;

        let state = self.store.snapshot();
        let current = state.access_token();
        if current.is_some() && current != sent_with.as_deref() {
            debug!("Access token changed since dispatch, retrying without refresh");
            return RequestState::Retried;
        }

        match state.refresh_token() {
            Some(refresh_token) => match self.refresh(refresh_token).await {
                Ok(new_tokens) => {
                    info!(expires_in = new_tokens.expires_in, "Access token refreshed");
                    self.store.set_tokens(Some(new_tokens));
                    RequestState::Retried
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, ending session");
                    self.force_logout();
                    RequestState::Done(failed)
                }
            },
            None if state.tokens.is_none() && sent_with.is_some() => {
                debug!("Session already ended by a concurrent request");
                RequestState::Done(failed)
            }
            None => {
                warn!("No refresh token available, ending session");
                self.force_logout();
                RequestState::Done(failed)
            }
        }
    }

    /// Call the refresh endpoint directly on the transport, bypassing the pipeline.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, ApiError> {
        let request = ApiRequest::post(self.config.refresh_path.as_str()).json(&RefreshRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        let response = self.transport.send(&request).await?.error_for_status()?;
        let auth: AuthResponse = response.json()?;
        Ok(auth.into())
    }

    fn force_logout(&self) {
        self.store.logout();
        self.navigator.redirect(&self.config.login_route);
    }

    fn is_unauthenticated_endpoint(&self, path: &str) -> bool {
        self.config
            .unauthenticated_paths
            .iter()
            .any(|endpoint| path.contains(endpoint.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoints::{LOGIN_PATH, ME_PATH, REGISTER_PATH};
    use crate::api::testing::{respond, tokens_body, MockTransport};
    use crate::models::User;
    use crate::routes::RecordingNavigator;

    const ITEMS: &str = "/api/items";

    fn user() -> User {
        User {
            id: "u-1".to_string(),
            email: "ann@example.com".to_string(),
            firstname: None,
            lastname: None,
            role: "user".to_string(),
        }
    }

    fn logged_in_store() -> SessionStore {
        let store = SessionStore::in_memory();
        store.login(user(), TokenBundle::new("A1", "R1", 3600));
        store
    }

    fn gateway(
        store: SessionStore,
        transport: MockTransport,
    ) -> (Gateway, Arc<MockTransport>, Arc<RecordingNavigator>) {
        let transport = Arc::new(transport);
        let navigator = Arc::new(RecordingNavigator::new());
        let gw = Gateway::new(
            transport.clone(),
            store,
            navigator.clone(),
            GatewayConfig::default(),
        );
        (gw, transport, navigator)
    }

    /// A1 is expired, A2 is valid; refresh with R1 returns A2/R2
    fn rotating_server() -> MockTransport {
        MockTransport::new(|req| {
            if req.path == REFRESH_PATH {
                let body = req.body.as_ref().unwrap();
                return if body["refresh_token"] == "R1" {
                    respond(200, &tokens_body("A2", "R2"))
                } else {
                    respond(401, r#"{"error":"invalid_token"}"#)
                };
            }
            match req.bearer.as_deref() {
                Some("A2") => respond(200, r#"{"ok":true}"#),
                _ => respond(401, ""),
            }
        })
    }

    #[tokio::test]
    async fn test_attaches_current_access_token() {
        let (gw, transport, _) = gateway(
            logged_in_store(),
            MockTransport::new(|_| respond(200, "{}")),
        );

        let response = gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_no_token_when_anonymous() {
        let (gw, transport, _) = gateway(
            SessionStore::in_memory(),
            MockTransport::new(|_| respond(200, "{}")),
        );

        gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert!(transport.sent()[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_empty_stored_token_is_not_attached() {
        let store = SessionStore::in_memory();
        store.login(user(), TokenBundle::new("", "R1", 60));
        assert_eq!(store.access_token(), None);

        let (gw, transport, _) = gateway(store, MockTransport::new(|_| respond(200, "{}")));
        gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        gw.execute(ApiRequest::get(ITEMS).with_bearer("")).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.bearer.is_none()));
    }

    #[tokio::test]
    async fn test_empty_stored_token_refreshes_on_401() {
        let store = SessionStore::in_memory();
        store.login(user(), TokenBundle::new("", "R1", 60));
        let (gw, transport, navigator) = gateway(store.clone(), rotating_server());

        let response = gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(transport.sent_to(REFRESH_PATH).len(), 1);
        assert_eq!(store.access_token().as_deref(), Some("A2"));
        assert!(navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_refreshes_once_and_retries_with_new_token() {
        let store = logged_in_store();
        let (gw, transport, navigator) = gateway(store.clone(), rotating_server());

        let response = gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let refreshes = transport.sent_to(REFRESH_PATH);
        assert_eq!(refreshes.len(), 1);
        assert_eq!(refreshes[0].body.as_ref().unwrap()["refresh_token"], "R1");
        assert!(refreshes[0].bearer.is_none(), "refresh is not sent through the pipeline");

        let items = transport.sent_to(ITEMS);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].bearer.as_deref(), Some("A1"));
        assert_eq!(items[1].bearer.as_deref(), Some("A2"));

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert_eq!(state.access_token(), Some("A2"));
        assert_eq!(state.refresh_token(), Some("R2"));
        assert!(navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_second_401_is_returned_without_another_refresh() {
        let store = logged_in_store();
        let (gw, transport, navigator) = gateway(
            store.clone(),
            MockTransport::new(|req| {
                if req.path == REFRESH_PATH {
                    respond(200, &tokens_body("A2", "R2"))
                } else {
                    respond(401, "")
                }
            }),
        );

        let response = gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.sent_to(REFRESH_PATH).len(), 1);
        assert_eq!(transport.sent_to(ITEMS).len(), 2);

        // Refresh itself worked, so the session survives
        assert!(store.is_authenticated());
        assert!(navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_login_401_never_refreshes_or_logs_out() {
        let store = logged_in_store();
        let (gw, transport, navigator) = gateway(
            store.clone(),
            MockTransport::new(|_| respond(401, r#"{"error":"invalid_credentials"}"#)),
        );

        for path in [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH] {
            let response = gw.execute(ApiRequest::post(path)).await.unwrap();
            assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        }

        assert_eq!(transport.sent().len(), 3);
        assert!(store.is_authenticated());
        assert!(navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_logs_out_and_redirects() {
        let store = logged_in_store();
        let (gw, transport, navigator) = gateway(
            store.clone(),
            MockTransport::new(|_| respond(401, "")),
        );

        let response = gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        assert_eq!(transport.sent_to(REFRESH_PATH).len(), 1);
        assert_eq!(transport.sent_to(ITEMS).len(), 1);

        let state = store.snapshot();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert!(state.tokens.is_none());
        assert_eq!(navigator.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_unparsable_refresh_body_counts_as_failure() {
        let store = logged_in_store();
        let (gw, _, navigator) = gateway(
            store.clone(),
            MockTransport::new(|req| {
                if req.path == REFRESH_PATH {
                    respond(200, "<html>")
                } else {
                    respond(401, "")
                }
            }),
        );

        gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(navigator.last().as_deref(), Some("/login"));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_logs_out_without_refresh_call() {
        let (gw, transport, navigator) = gateway(
            SessionStore::in_memory(),
            MockTransport::new(|_| respond(401, "")),
        );

        let response = gw.execute(ApiRequest::get(ME_PATH)).await.unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(transport.sent_to(REFRESH_PATH).is_empty());
        assert_eq!(navigator.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_pinned_token_is_not_refreshed() {
        let store = SessionStore::in_memory();
        let (gw, transport, navigator) = gateway(
            store.clone(),
            MockTransport::new(|_| respond(401, "")),
        );

        let response = gw
            .execute(ApiRequest::get(ME_PATH).with_bearer("fresh"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.sent()[0].bearer.as_deref(), Some("fresh"));
        assert!(navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_non_401_errors_pass_through() {
        let store = logged_in_store();
        let (gw, transport, _) = gateway(
            store.clone(),
            MockTransport::new(|_| respond(500, "boom")),
        );

        let response = gw.execute(ApiRequest::get(ITEMS)).await.unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.sent().len(), 1);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_transport_errors_are_not_retried() {
        let (gw, transport, _) = gateway(
            logged_in_store(),
            MockTransport::new(|_| Err(ApiError::ServerError("connection reset".to_string()))),
        );

        let result = gw.execute(ApiRequest::get(ITEMS)).await;
        assert!(matches!(result, Err(ApiError::ServerError(_))));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let store = logged_in_store();
        let (gw, transport, navigator) = gateway(store.clone(), rotating_server());

        let (a, b) = futures::join!(
            gw.execute(ApiRequest::get(ITEMS)),
            gw.execute(ApiRequest::get("/api/other")),
        );
        assert_eq!(a.unwrap().status, StatusCode::OK);
        assert_eq!(b.unwrap().status, StatusCode::OK);

        assert_eq!(transport.sent_to(REFRESH_PATH).len(), 1);
        assert_eq!(store.access_token().as_deref(), Some("A2"));
        assert!(navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_failed_refresh_redirects_once() {
        let store = logged_in_store();
        let (gw, transport, navigator) = gateway(
            store.clone(),
            MockTransport::new(|_| respond(401, "")),
        );

        let (a, b) = futures::join!(
            gw.execute(ApiRequest::get(ITEMS)),
            gw.execute(ApiRequest::get("/api/other")),
        );
        assert_eq!(a.unwrap().status, StatusCode::UNAUTHORIZED);
        assert_eq!(b.unwrap().status, StatusCode::UNAUTHORIZED);

        assert_eq!(transport.sent_to(REFRESH_PATH).len(), 1);
        assert_eq!(navigator.routes(), vec!["/login".to_string()]);
        assert!(!store.is_authenticated());
    }
}
