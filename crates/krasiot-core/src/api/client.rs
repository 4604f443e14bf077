//! API client for the krasiot auth service.
//!
//! `ApiClient` exposes one method per endpoint plus the session flows the
//! front end drives (sign in, sign out, profile refresh). All traffic goes
//! through the [`Gateway`], so token handling never leaks into callers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::{AuthResponse, TokenBundle, User};
use crate::routes::Navigator;

use super::endpoints::{
    ACCOUNT_PATH, LOGIN_PATH, LOGOUT_PATH, ME_PATH, PASSWORD_PATH, PROFILE_PATH, REFRESH_PATH,
    REGISTER_PATH,
};
use super::gateway::{Gateway, GatewayConfig};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use super::ApiError;

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
struct LogoutRequest {
    refresh_token: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// API client for the auth service.
/// Clone is cheap - the gateway shares its transport and session store.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Build a client over HTTP using the configured base URL and timeout
    pub fn from_config(
        config: &Config,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config.api_url(), config.request_timeout())?;
        Ok(Self::with_transport(Arc::new(transport), store, navigator))
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::new(Gateway::new(transport, store, navigator, GatewayConfig::default()))
    }

    pub fn store(&self) -> &SessionStore {
        self.gateway.store()
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.gateway.execute(request).await?.error_for_status()
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    // ===== Endpoints =====

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send_json(ApiRequest::post(LOGIN_PATH).json(&body)?).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.send_json(ApiRequest::post(REGISTER_PATH).json(request)?).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.send_json(ApiRequest::post(REFRESH_PATH).json(&body)?).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let body = LogoutRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.send(ApiRequest::post(LOGOUT_PATH).json(&body)?).await?;
        Ok(())
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.send_json(ApiRequest::get(ME_PATH)).await
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User, ApiError> {
        self.send_json(ApiRequest::put(PROFILE_PATH).json(request)?).await
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
        let body = ChangePasswordRequest {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        self.send(ApiRequest::put(PASSWORD_PATH).json(&body)?).await?;
        Ok(())
    }

    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(ACCOUNT_PATH)).await?;
        Ok(())
    }

    // ===== Session flows =====

    /// Log in and load the profile; the session changes only if both succeed.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let tokens = TokenBundle::from(self.login(email, password).await?);
        let user: User = self
            .send_json(ApiRequest::get(ME_PATH).with_bearer(tokens.access_token.as_str()))
            .await?;

        self.store().login(user.clone(), tokens);
        info!(user = %user.email, "Signed in");
        Ok(user)
    }

    /// Create an account. The session is untouched; the user signs in afterwards.
    pub async fn sign_up(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let user = self.register(request).await?;
        info!(user = %user.email, "Account registered");
        Ok(user)
    }

    /// Revoke the refresh token on the server if possible, then clear the session.
    pub async fn sign_out(&self) {
        if let Some(refresh_token) = self.store().refresh_token() {
            if let Err(e) = self.logout(&refresh_token).await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }
        self.store().logout();
        info!("Signed out");
    }

    /// Reload the profile into the session
    pub async fn refresh_profile(&self) -> Result<User, ApiError> {
        let user = self.me().await?;
        self.store().set_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn save_profile(&self, request: &UpdateProfileRequest) -> Result<User, ApiError> {
        let user = self.update_profile(request).await?;
        self.store().set_user(Some(user.clone()));
        Ok(user)
    }

    /// Delete the account and end the session
    pub async fn close_account(&self) -> Result<(), ApiError> {
        self.delete_account().await?;
        self.store().logout();
        info!("Account closed");
        Ok(())
    }
}
