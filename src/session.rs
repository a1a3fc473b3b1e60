// =============================================================================
// Session Store — the single broker access token and login state
// =============================================================================
//
// One session per process. A successful callback overwrites whatever was
// there; nothing expires it. Reads and writes go through a parking_lot lock so
// concurrent logins cannot tear the slot, but the last writer still wins.
// =============================================================================

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::types::AuthState;

#[derive(Debug, Default)]
struct SessionSlot {
    access_token: Option<String>,
    state: AuthState,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    slot: RwLock<SessionSlot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh access token and mark the session authenticated.
    pub fn set(&self, token: impl Into<String>) {
        let mut slot = self.slot.write();
        slot.access_token = Some(token.into());
        slot.state = AuthState::Authenticated;
        info!("broker session established");
    }

    pub fn has_session(&self) -> bool {
        self.slot.read().access_token.is_some()
    }

    /// The current access token, or `MissingSession` if no login completed.
    pub fn current_token(&self) -> Result<String, AnalysisError> {
        self.slot
            .read()
            .access_token
            .clone()
            .ok_or(AnalysisError::MissingSession)
    }

    /// Same as [`current_token`](Self::current_token) but without the error,
    /// for callers where no session is a normal case.
    pub fn token(&self) -> Option<String> {
        self.slot.read().access_token.clone()
    }

    pub fn auth_state(&self) -> AuthState {
        self.slot.read().state
    }

    /// User left for the broker's hosted login page.
    ///
    /// An already authenticated session keeps its token and state: the old
    /// token stays usable until a new one replaces it.
    pub fn begin_login(&self) {
        let mut slot = self.slot.write();
        if slot.state == AuthState::Anonymous {
            slot.state = AuthState::Authenticating;
            debug!("login started");
        }
    }

    /// Token exchange failed. Falls back to `Anonymous` unless an earlier
    /// token is still held.
    pub fn fail_login(&self) {
        let mut slot = self.slot.write();
        slot.state = if slot.access_token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_anonymous_without_token() {
        let store = SessionStore::new();
        assert!(!store.has_session());
        assert_eq!(store.auth_state(), AuthState::Anonymous);
        assert!(matches!(
            store.current_token(),
            Err(AnalysisError::MissingSession)
        ));
    }

    #[test]
    fn login_flow_transitions() {
        let store = SessionStore::new();
        store.begin_login();
        assert_eq!(store.auth_state(), AuthState::Authenticating);

        store.set("tok1");
        assert_eq!(store.auth_state(), AuthState::Authenticated);
        assert_eq!(store.current_token().unwrap(), "tok1");
    }

    #[test]
    fn failed_login_returns_to_anonymous() {
        let store = SessionStore::new();
        store.begin_login();
        store.fail_login();
        assert_eq!(store.auth_state(), AuthState::Anonymous);
        assert!(!store.has_session());
    }

    #[test]
    fn relogin_overwrites_token() {
        let store = SessionStore::new();
        store.set("old");
        store.begin_login();
        assert_eq!(store.auth_state(), AuthState::Authenticated);
        store.set("new");
        assert_eq!(store.token().as_deref(), Some("new"));
    }

    #[test]
    fn failed_relogin_keeps_previous_token() {
        let store = SessionStore::new();
        store.set("old");
        store.fail_login();
        assert_eq!(store.auth_state(), AuthState::Authenticated);
        assert_eq!(store.current_token().unwrap(), "old");
    }
}
