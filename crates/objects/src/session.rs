//! The session port: local identity and session-scoped variables.
//!
//! The transport clears the session when the backend rejects the session
//! token; callers redirect to login on their own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

use crate::{AuthToken, Credential, UserId};

/// Local session state consulted for every request.
pub trait Session: Send + Sync {
    fn user_id(&self) -> Option<UserId>;

    fn token(&self) -> Option<AuthToken>;

    /// Stores the identity returned by a successful login.
    fn set_credential(&self, user: UserId, token: AuthToken);

    fn set_var(&self, name: &str, value: Value);

    fn var(&self, name: &str) -> Option<Value>;

    /// Drops identity and all variables.
    fn clear(&self);

    /// The credential to stamp on outgoing requests.
    fn credential(&self) -> Credential {
        Credential::new(self.user_id(), self.token())
    }

    fn is_signed_in(&self) -> bool {
        self.user_id().is_some() && self.token().is_some()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<UserId>,
    token: Option<AuthToken>,
    vars: HashMap<String, Value>,
}

/// In-memory [`Session`], safe to share across tasks.
#[derive(Debug, Default)]
pub struct MemorySession {
    state: RwLock<SessionState>,
    clears: AtomicUsize,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already signed in as `user`.
    pub fn signed_in(user: UserId, token: AuthToken) -> Self {
        let session = Self::new();
        session.set_credential(user, token);
        session
    }

    /// Number of times [`Session::clear`] has run.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl Session for MemorySession {
    fn user_id(&self) -> Option<UserId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    fn token(&self) -> Option<AuthToken> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    fn set_credential(&self, user: UserId, token: AuthToken) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.user = Some(user);
        state.token = Some(token);
    }

    fn set_var(&self, name: &str, value: Value) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .vars
            .insert(name.to_string(), value);
    }

    fn var(&self, name: &str) -> Option<Value> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .vars
            .get(name)
            .cloned()
    }

    fn clear(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = SessionState::default();
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clear_drops_identity_and_vars() {
        let session = MemorySession::signed_in(
            UserId::new("u1").unwrap(),
            AuthToken::new("t1").unwrap(),
        );
        session.set_var("draft", json!("hello"));
        assert!(session.is_signed_in());

        session.clear();
        assert!(!session.is_signed_in());
        assert_eq!(session.var("draft"), None);
        assert_eq!(session.clear_count(), 1);
    }

    #[test]
    fn credential_reflects_identity() {
        let session = MemorySession::new();
        assert_eq!(session.credential(), Credential::default());
        session.set_credential(UserId::new("u1").unwrap(), AuthToken::new("t1").unwrap());
        assert_eq!(session.credential().user.unwrap().as_str(), "u1");
    }
}
