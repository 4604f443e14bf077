//! Command handlers for the krasiot CLI.
//!
//! `App` owns the configuration, the persisted session and the API client,
//! and runs one subcommand per process. Redirects issued by the gateway
//! (a session that could not be refreshed) are reported after each command.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use krasiot_core::api::{
    ApiClient, ApiError, HttpTransport, RegisterRequest, Transport, UpdateProfileRequest,
};
use krasiot_core::auth::{CredentialStore, SessionState, SessionStore};
use krasiot_core::config::Config;
use krasiot_core::models::{Theme, User};
use krasiot_core::routes::{self, RecordingNavigator, LOGIN_ROUTE, PROFILE_ROUTE};
use tracing::{debug, info, warn};

use crate::args::{Command, ProfileAction};
use crate::utils::{format_duration_minutes, format_optional, mask_token};
use crate::validation;

pub struct App {
    config: Config,
    store: SessionStore,
    api: ApiClient,
    navigator: Arc<RecordingNavigator>,
    credentials: CredentialStore,
}

impl App {
    /// Create the application from the saved config and session
    pub fn new(api_url_override: Option<String>) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");
        let store = SessionStore::open(&cache_dir);

        let api_url = api_url_override.unwrap_or_else(|| config.api_url());
        debug!(%api_url, "API endpoint configured");
        let credentials = CredentialStore::new(&api_url);
        let transport = HttpTransport::new(api_url, config.request_timeout())?;

        Ok(Self::with_transport(config, store, Arc::new(transport), credentials))
    }

    fn with_transport(
        config: Config,
        store: SessionStore,
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
    ) -> Self {
        let navigator = Arc::new(RecordingNavigator::new());
        let api = ApiClient::with_transport(transport, store.clone(), navigator.clone());
        Self {
            config,
            store,
            api,
            navigator,
            credentials,
        }
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        let result = match command {
            Command::Login { email, remember } => self.login(email, remember).await,
            Command::Signup {
                email,
                firstname,
                lastname,
            } => self.signup(email, firstname, lastname).await,
            Command::Logout { forget } => self.logout(forget).await,
            Command::Status { json } => self.status(json),
            Command::Theme { theme, toggle } => self.theme(theme, toggle),
            Command::Lang { language } => self.language(language),
            Command::Profile { action } => {
                self.profile(action.unwrap_or(ProfileAction::Show { json: false }))
                    .await
            }
        };

        self.report_redirects();
        result
    }

    fn report_redirects(&self) {
        for route in self.navigator.take() {
            if route == LOGIN_ROUTE {
                eprintln!("Your session has expired. Run `krasiot login` to sign in again.");
            } else {
                debug!(%route, "Ignoring redirect");
            }
        }
    }

    /// Refuse protected commands when there is no session
    fn require_session(&self, route: &str) -> Result<()> {
        match routes::guard(self.store.is_authenticated(), route, LOGIN_ROUTE, route) {
            Some(LOGIN_ROUTE) => bail!("You are not logged in. Run `krasiot login` first."),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    async fn login(&mut self, email: Option<String>, remember: bool) -> Result<()> {
        let email = match (email, self.config.last_email.clone()) {
            (Some(e), _) => e.trim().to_string(),
            (None, Some(last)) => prompt_with_default("Email", &last)?,
            (None, None) => prompt_line("Email: ")?,
        };
        validation::validate_email(&email)?;

        let remembered = self.credentials.recall(&email).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read remembered password");
            None
        });
        let password = match remembered {
            Some(password) if confirm("Use stored password?", true)? => password,
            _ => prompt_password("Password: ")?,
        };
        validation::validate_present(&password)?;

        println!("Signing in...");
        let user = match self.api.sign_in(&email, &password).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Login failed");
                bail!(user_message(&e));
            }
        };

        if remember {
            if let Err(e) = self.credentials.remember(&email, &password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!("Login successful");
        println!("Welcome, {}!", user.display_name());
        Ok(())
    }

    async fn signup(
        &mut self,
        email: String,
        firstname: Option<String>,
        lastname: Option<String>,
    ) -> Result<()> {
        let firstname = validation::non_blank(firstname);
        let lastname = validation::non_blank(lastname);
        validation::validate_email(&email)?;
        validation::validate_name(firstname.as_deref())?;
        validation::validate_name(lastname.as_deref())?;

        let password = prompt_password("Password: ")?;
        validation::validate_new_password(&password)?;
        let confirmation = prompt_password("Confirm password: ")?;
        validation::validate_confirmation(&password, &confirmation)?;

        let request = RegisterRequest {
            email: email.trim().to_string(),
            password,
            firstname,
            lastname,
        };
        let user = self.api.sign_up(&request).await.map_err(|e| anyhow::anyhow!(user_message(&e)))?;

        self.config.last_email = Some(user.email.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Account created for {}. Run `krasiot login` to sign in.", user.email);
        Ok(())
    }

    async fn logout(&mut self, forget: bool) -> Result<()> {
        // A half-restored session (tokens without a user) is still cleared
        let state = self.store.snapshot();
        if state.is_authenticated || state.tokens.is_some() {
            self.api.sign_out().await;
            println!("Logged out.");
        } else {
            println!("Not logged in.");
        }

        if forget {
            if let Some(ref email) = self.config.last_email {
                if self.credentials.forget(email)? {
                    println!("Forgot stored password for {}.", email);
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Session & preferences
    // =========================================================================

    fn status(&self, json: bool) -> Result<()> {
        let state = self.store.snapshot();
        if json {
            let mut value = serde_json::to_value(&state)?;
            // Never print live credentials
            if let Some(tokens) = value.get_mut("tokens").and_then(|t| t.as_object_mut()) {
                tokens.remove("accessToken");
                tokens.remove("refreshToken");
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            for line in status_lines(&state) {
                println!("{}", line);
            }
        }
        Ok(())
    }

    fn theme(&self, theme: Option<Theme>, toggle: bool) -> Result<()> {
        let next = match (theme, toggle) {
            (Some(theme), _) => theme,
            (None, true) => self.store.theme().toggled(),
            (None, false) => {
                println!("{}", self.store.theme());
                return Ok(());
            }
        };
        self.store.set_theme(next);
        println!("Theme set to {}.", next);
        Ok(())
    }

    fn language(&mut self, language: Option<krasiot_core::config::Language>) -> Result<()> {
        match language {
            Some(language) => {
                self.config.language = language;
                self.config.save()?;
                println!("Language set to {}.", language);
            }
            None => println!("{}", self.config.language),
        }
        Ok(())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    async fn profile(&mut self, action: ProfileAction) -> Result<()> {
        self.require_session(PROFILE_ROUTE)?;

        match action {
            ProfileAction::Show { json } => {
                let user = self.api.refresh_profile().await.map_err(|e| anyhow::anyhow!(user_message(&e)))?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&user)?);
                } else {
                    for line in profile_lines(&user) {
                        println!("{}", line);
                    }
                }
            }
            ProfileAction::Update {
                firstname,
                lastname,
            } => {
                let request = UpdateProfileRequest {
                    firstname: validation::non_blank(firstname),
                    lastname: validation::non_blank(lastname),
                };
                if request.firstname.is_none() && request.lastname.is_none() {
                    bail!("Nothing to update. Pass --first and/or --last.");
                }
                validation::validate_name(request.firstname.as_deref())?;
                validation::validate_name(request.lastname.as_deref())?;

                let user = self.api.save_profile(&request).await.map_err(|e| anyhow::anyhow!(user_message(&e)))?;
                println!("Profile updated: {}", user.display_name());
            }
            ProfileAction::Password => {
                let current = prompt_password("Current password: ")?;
                validation::validate_present(&current)?;
                let new = prompt_password("New password: ")?;
                validation::validate_new_password(&new)?;
                let confirmation = prompt_password("Confirm new password: ")?;
                validation::validate_confirmation(&new, &confirmation)?;

                self.api
                    .change_password(&current, &new)
                    .await
                    .map_err(|e| anyhow::anyhow!(user_message(&e)))?;

                if let Some(ref email) = self.config.last_email {
                    let update = match self.credentials.recall(email) {
                        Ok(Some(_)) => self.credentials.remember(email, &new),
                        Ok(None) => Ok(()),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = update {
                        warn!(error = %e, "Failed to update stored password");
                    }
                }
                println!("Password changed.");
            }
            ProfileAction::Delete { yes } => {
                if !yes
                    && !confirm(
                        "Are you sure you want to close your account? This cannot be undone.",
                        false,
                    )?
                {
                    println!("Cancelled.");
                    return Ok(());
                }
                self.api.close_account().await.map_err(|e| anyhow::anyhow!(user_message(&e)))?;
                println!("Your account has been closed.");
            }
        }
        Ok(())
    }
}

/// User-facing text for an API failure
fn user_message(err: &ApiError) -> String {
    match err {
        ApiError::InvalidCredentials => "Invalid email or password.".to_string(),
        ApiError::EmailExists => "An account with this email already exists.".to_string(),
        ApiError::InvalidPassword => "Current password is incorrect.".to_string(),
        ApiError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
        ApiError::RateLimited => "Too many attempts. Please wait and try again.".to_string(),
        ApiError::NetworkError(e) if e.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        ApiError::NetworkError(_) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        other => format!("Something went wrong: {}", other),
    }
}

fn status_lines(state: &SessionState) -> Vec<String> {
    let mut lines = vec![format!("Theme:     {}", state.theme)];

    match (&state.user, &state.tokens) {
        (Some(user), Some(tokens)) if state.is_authenticated => {
            lines.push(format!("Signed in: {} ({})", user.display_name(), user.email));
            lines.push(format!("Role:      {}", user.role));
            lines.push(format!("Token:     {}", mask_token(&tokens.access_token)));
            if tokens.is_expired() {
                lines.push("Expires:   expired (will refresh on next request)".to_string());
            } else if tokens.expires_at() == DateTime::<Utc>::MAX_UTC {
                lines.push("Expires:   never".to_string());
            } else {
                lines.push(format!(
                    "Expires:   in {} ({})",
                    format_duration_minutes(tokens.minutes_until_expiry()),
                    tokens
                        .expires_at()
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                ));
            }
        }
        _ => lines.push("Signed in: no".to_string()),
    }
    lines
}

fn profile_lines(user: &User) -> Vec<String> {
    vec![
        format!("Email:      {}", user.email),
        format!("First name: {}", format_optional(&user.firstname, "-")),
        format!("Last name:  {}", format_optional(&user.lastname, "-")),
        format!("Role:       {}", user.role),
        format!("ID:         {}", user.id),
    ]
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_with_default(label: &str, default: &str) -> Result<String> {
    let input = prompt_line(&format!("{} [{}]: ", label, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

fn prompt_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    Ok(password)
}

fn confirm(question: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    let input = prompt_line(&format!("{} {} ", question, hint))?.to_lowercase();
    Ok(match input.as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use krasiot_core::api::{ApiRequest, ApiResponse};
    use krasiot_core::models::TokenBundle;

    fn user() -> User {
        User {
            id: "u-1".to_string(),
            email: "ann@example.com".to_string(),
            firstname: Some("Ann".to_string()),
            lastname: None,
            role: "user".to_string(),
        }
    }

    #[test]
    fn test_status_lines_anonymous() {
        let lines = status_lines(&SessionState::default());
        assert_eq!(lines, vec!["Theme:     light".to_string(), "Signed in: no".to_string()]);
    }

    #[test]
    fn test_status_lines_signed_in() {
        let store = SessionStore::in_memory();
        store.login(user(), TokenBundle::new("eyJhbGciOiJIUzI1NiJ9", "R1", 3600));

        let lines = status_lines(&store.snapshot());
        assert_eq!(lines[1], "Signed in: Ann (ann@example.com)");
        assert_eq!(lines[3], "Token:     eyJhbG…");
        assert!(lines[4].starts_with("Expires:   in "));
        assert!(!lines.iter().any(|l| l.contains("R1")));
    }

    #[test]
    fn test_status_lines_out_of_range_expiry() {
        let store = SessionStore::in_memory();
        store.login(user(), TokenBundle::new("A1", "R1", i64::MAX));
        let lines = status_lines(&store.snapshot());
        assert_eq!(lines[4], "Expires:   never");

        store.set_tokens(Some(TokenBundle::new("A1", "R1", -1)));
        let lines = status_lines(&store.snapshot());
        assert_eq!(lines[4], "Expires:   expired (will refresh on next request)");
    }

    struct OfflineTransport;

    #[async_trait]
    impl Transport for OfflineTransport {
        async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            Err(ApiError::ServerError("offline".to_string()))
        }
    }

    fn offline_app(store: SessionStore) -> App {
        App::with_transport(
            Config::default(),
            store,
            Arc::new(OfflineTransport),
            CredentialStore::new("http://localhost:8080"),
        )
    }

    #[tokio::test]
    async fn test_logout_clears_tokens_without_user() {
        let store = SessionStore::in_memory();
        store.set_tokens(Some(TokenBundle::new("A1", "R1", 3600)));
        assert!(!store.is_authenticated());

        let mut app = offline_app(store.clone());
        app.logout(false).await.unwrap();

        assert!(store.snapshot().tokens.is_none());
        assert_eq!(store.access_token(), None);
    }

    #[tokio::test]
    async fn test_logout_survives_unreachable_server() {
        let store = SessionStore::in_memory();
        store.login(user(), TokenBundle::new("A1", "R1", 3600));

        let mut app = offline_app(store.clone());
        app.logout(false).await.unwrap();

        assert!(!store.is_authenticated());
        assert!(app.navigator.routes().is_empty());
    }

    #[test]
    fn test_profile_lines() {
        let lines = profile_lines(&user());
        assert_eq!(lines[1], "First name: Ann");
        assert_eq!(lines[2], "Last name:  -");
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(user_message(&ApiError::InvalidCredentials), "Invalid email or password.");
        assert_eq!(
            user_message(&ApiError::EmailExists),
            "An account with this email already exists."
        );
        assert!(user_message(&ApiError::ServerError("boom".to_string())).contains("boom"));
    }
}
