use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Buffer before expiry at which the access token is considered due for refresh
const TOKEN_REFRESH_BUFFER_SECS: i64 = 5 * 60;

/// Token bundle returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Credentials held by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    #[serde(default = "Utc::now")]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub obtained_at: DateTime<Utc>,
}

impl TokenBundle {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in,
            obtained_at: Utc::now(),
        }
    }

    /// Expiry time, saturating at the representable range for absurd lifetimes
    pub fn expires_at(&self) -> DateTime<Utc> {
        let saturated = if self.expires_in < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        };
        Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| self.obtained_at.checked_add_signed(lifetime))
            .unwrap_or(saturated)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    /// Check if the access token will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self
            .expires_at()
            .checked_sub_signed(Duration::seconds(TOKEN_REFRESH_BUFFER_SECS))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Utc::now() > refresh_at
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.expires_at()
            .signed_duration_since(Utc::now())
            .num_minutes()
            .max(0)
    }
}

impl From<AuthResponse> for TokenBundle {
    fn from(auth: AuthResponse) -> Self {
        TokenBundle::new(auth.access_token, auth.refresh_token, auth.expires_in)
    }
}
