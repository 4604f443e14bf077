//! Remembered sign-in passwords in the OS keychain.
//!
//! One keychain entry per account per auth server, so the same email on a
//! staging and a production API never share a password.

use keyring::Entry;
use thiserror::Error;

const SERVICE_NAME: &str = "krasiot";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("An email is required to remember a password")]
    MissingEmail,

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

/// Passwords remembered for accounts on one API server.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    api_url: String,
}

impl CredentialStore {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim().trim_end_matches('/').to_ascii_lowercase(),
        }
    }

    /// Keychain account name: `<email> on <api url>`, email lowercased
    pub fn account_key(&self, email: &str) -> Result<String, CredentialError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(CredentialError::MissingEmail);
        }
        Ok(format!("{} on {}", email, self.api_url))
    }

    fn entry(&self, email: &str) -> Result<Entry, CredentialError> {
        Ok(Entry::new(SERVICE_NAME, &self.account_key(email)?)?)
    }

    pub fn remember(&self, email: &str, password: &str) -> Result<(), CredentialError> {
        self.entry(email)?.set_password(password)?;
        Ok(())
    }

    /// The remembered password, or `None` when nothing is stored for this account
    pub fn recall(&self, email: &str) -> Result<Option<String>, CredentialError> {
        match self.entry(email)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the remembered password. Returns whether one existed.
    pub fn forget(&self, email: &str) -> Result<bool, CredentialError> {
        match self.entry(email)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
