use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::{Theme, TokenBundle, User};

/// Namespace key of the persisted session slot
pub const STORAGE_KEY: &str = "krasiot-storage";

/// Schema version written alongside the persisted state
const STORAGE_VERSION: u32 = 0;

/// Snapshot of the current session.
///
/// `is_authenticated` is kept equal to `user.is_some() && tokens.is_some()`
/// by every `SessionStore` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub tokens: Option<TokenBundle>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            user: None,
            tokens: None,
            is_authenticated: false,
        }
    }
}

impl SessionState {
    fn sync_auth_flag(&mut self) {
        self.is_authenticated = self.user.is_some() && self.tokens.is_some();
    }

    /// Empty tokens count as absent
    pub fn access_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .map(|t| t.access_token.as_str())
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .map(|t| t.refresh_token.as_str())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    state: SessionState,
    version: u32,
}

/// The on-disk slot holding the serialized session
#[derive(Debug)]
struct SessionSlot {
    path: PathBuf,
}

impl SessionSlot {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.json", STORAGE_KEY)),
        }
    }

    fn load(&self) -> Result<Option<SessionState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session file")?;
        let persisted: PersistedSession = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;
        if persisted.version != STORAGE_VERSION {
            warn!(version = persisted.version, "Unknown session schema version, loading anyway");
        }
        Ok(Some(persisted.state))
    }

    /// Write to a sibling temp file, then rename over the slot
    fn save(&self, state: SessionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedSession {
            state,
            version: STORAGE_VERSION,
        };
        let contents = serde_json::to_string_pretty(&persisted)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

struct Inner {
    state: watch::Sender<SessionState>,
    slot: Option<SessionSlot>,
    /// Serializes slot writes so the file always ends at the latest state
    save_lock: Mutex<()>,
}

/// Shared, persisted session state.
///
/// Clone is cheap; every clone observes and mutates the same session.
/// Each mutation is applied atomically and written through to the slot.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Open the store backed by `<dir>/krasiot-storage.json`, hydrating from it if present.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let slot = SessionSlot::new(dir.as_ref());
        let state = match slot.load() {
            Ok(Some(mut state)) => {
                state.sync_auth_flag();
                debug!(authenticated = state.is_authenticated, "Session restored");
                state
            }
            Ok(None) => {
                debug!("No persisted session found");
                SessionState::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load session, starting fresh");
                SessionState::default()
            }
        };
        Self::build(state, Some(slot))
    }

    /// A store that lives only in memory
    pub fn in_memory() -> Self {
        Self::build(SessionState::default(), None)
    }

    fn build(state: SessionState, slot: Option<SessionSlot>) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            inner: Arc::new(Inner {
                state: tx,
                slot,
                save_lock: Mutex::new(()),
            }),
        }
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        self.inner.state.send_modify(|state| {
            f(state);
            state.sync_auth_flag();
        });
        self.persist();
    }

    /// Write the current state to the slot outside the watch lock
    fn persist(&self) {
        let Some(slot) = self.inner.slot.as_ref() else {
            return;
        };
        let _guard = self
            .inner
            .save_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = slot.save(self.snapshot()) {
            warn!(error = %e, "Failed to save session");
        }
    }

    pub fn login(&self, user: User, tokens: TokenBundle) {
        info!(user = %user.email, "Session started");
        self.update(|state| {
            state.user = Some(user);
            state.tokens = Some(tokens);
        });
    }

    pub fn logout(&self) {
        self.update(|state| {
            state.user = None;
            state.tokens = None;
        });
    }

    pub fn set_tokens(&self, tokens: Option<TokenBundle>) {
        self.update(|state| state.tokens = tokens);
    }

    pub fn set_user(&self, user: Option<User>) {
        self.update(|state| state.user = user);
    }

    pub fn set_theme(&self, theme: Theme) {
        self.update(|state| state.theme = theme);
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().access_token().map(str::to_string)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.state.borrow().refresh_token().map(str::to_string)
    }

    pub fn theme(&self) -> Theme {
        self.inner.state.borrow().theme
    }

    /// Receive every committed session state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.inner.slot.as_ref().map(|s| s.path.as_path())
    }
}
