use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{AuthError, CredentialClient};
use crate::storage::{SessionStorage, SESSION_KEY};

use super::{Session, SessionHandle};

/// Why a persisted session record was discarded.
///
/// Never surfaced to the user; `SessionStore::restore` logs it and starts
/// anonymous.
#[derive(Error, Debug)]
pub enum CorruptPersistedState {
    #[error("session record could not be read: {0}")]
    Unreadable(String),

    #[error("session record is not valid JSON: {0}")]
    Unparseable(#[from] serde_json::Error),

    #[error("session record is not a JSON object")]
    NotAnObject,

    #[error("session record has no role")]
    MissingRole,
}

/// Written over the record when it cannot be removed; `restore` rejects it.
const LOGGED_OUT_RECORD: &str = "null";

/// Authentication state as seen by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(Session),
}

/// Single source of truth for "is the user authenticated, and as whom."
///
/// Every transition writes through to storage before returning, so memory and
/// storage agree even if the process dies right after a call.
///
/// Overlapping `login` calls are allowed; whichever resolves last decides the
/// final state. No ordering between them is promised.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    credentials: CredentialClient,
    current: SessionHandle,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, credentials: CredentialClient) -> Self {
        Self {
            storage,
            credentials,
            current: SessionHandle::default(),
        }
    }

    /// Load the persisted session, if any, into memory.
    ///
    /// Fails closed: unreadable or malformed records yield `None` and are
    /// removed from storage.
    pub fn restore(&self) -> Option<Session> {
        match self.read_record() {
            Ok(Some(session)) => {
                info!(identity = %session.identity, role = %session.role, "Session restored");
                *self.current.write() = Some(session.clone());
                Some(session)
            }
            Ok(None) => {
                debug!("No persisted session");
                None
            }
            Err(e) => {
                warn!(error = %e, "Discarding persisted session");
                if let Err(e) = self.storage.remove_item(SESSION_KEY) {
                    warn!(error = %e, "Failed to remove corrupt session record");
                }
                None
            }
        }
    }

    fn read_record(&self) -> Result<Option<Session>, CorruptPersistedState> {
        let raw = self
            .storage
            .get_item(SESSION_KEY)
            .map_err(|e| CorruptPersistedState::Unreadable(format!("{:#}", e)))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        // Derived Deserialize also accepts a sequence of fields; the record
        // is only ever an object
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        if !value.is_object() {
            return Err(CorruptPersistedState::NotAnObject);
        }

        let session: Session = serde_json::from_value(value)?;
        if !session.has_role() {
            return Err(CorruptPersistedState::MissingRole);
        }
        Ok(Some(session))
    }

    /// Authenticate against the credential service and install the session.
    ///
    /// A failed attempt leaves the current state untouched.
    pub async fn login(&self, identity: &str, secret: &str) -> Result<Session, AuthError> {
        let identity = identity.trim();
        if identity.is_empty() || secret.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let session = match self.credentials.authenticate(identity, secret).await {
            Ok(session) => session,
            Err(e) => {
                warn!(identity, error = %e, "Login failed");
                return Err(e);
            }
        };

        // Persist while holding the write lock so overlapping logins cannot
        // leave storage and memory pointing at different sessions
        let mut current = self.current.write();
        *current = Some(session.clone());
        if let Err(e) = self.persist(current.as_ref()) {
            warn!(error = %e, "Failed to save session");
        }
        drop(current);

        info!(identity = %session.identity, role = %session.role, "Login successful");
        Ok(session)
    }

    /// Drop the session from memory and storage. Safe to call repeatedly.
    ///
    /// Memory is always cleared. If the record cannot be removed it is
    /// overwritten with a value `restore` rejects; an error is returned only
    /// when neither works and a stale record may still be on disk.
    pub fn logout(&self) -> Result<()> {
        let mut current = self.current.write();
        let previous = current.take();
        let cleared = self.persist(None).or_else(|e| {
            warn!(error = %e, "Failed to remove persisted session, overwriting it");
            self.storage
                .set_item(SESSION_KEY, LOGGED_OUT_RECORD)
                .context("Failed to invalidate persisted session")
        });
        drop(current);

        match previous {
            Some(session) => info!(identity = %session.identity, "Logged out"),
            None => debug!("Logout with no active session"),
        }
        cleared
    }

    /// The in-memory session. Never touches storage.
    pub fn current(&self) -> Option<Session> {
        self.current.get()
    }

    pub fn state(&self) -> AuthState {
        match self.current() {
            Some(session) => AuthState::Authenticated(session),
            None => AuthState::Anonymous,
        }
    }

    /// Read reference for consumers that must see every transition.
    pub fn handle(&self) -> SessionHandle {
        self.current.clone()
    }

    /// Write the in-memory session to storage, or remove the record when
    /// anonymous.
    pub fn save(&self) -> Result<()> {
        let current = self.current.write();
        self.persist(current.as_ref())
    }

    fn persist(&self, session: Option<&Session>) -> Result<()> {
        match session {
            Some(session) => {
                let contents = serde_json::to_string(session)?;
                self.storage
                    .set_item(SESSION_KEY, &contents)
                    .context("Failed to persist session")
            }
            None => self
                .storage
                .remove_item(SESSION_KEY)
                .context("Failed to clear persisted session"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store_with(storage: Arc<dyn SessionStorage>) -> SessionStore {
        // Nothing listens here; tests below never reach the network
        let credentials = CredentialClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9");
        SessionStore::new(storage, credentials)
    }

    fn record(json: &str) -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::new().with_item(SESSION_KEY, json))
    }

    #[test]
    fn test_restore_valid_record() {
        let storage = record(r#"{"email":"jane@kongu.edu","role":"faculty","allowedServers":["srv-a"]}"#);
        let store = store_with(storage);

        let restored = store.restore().expect("session restored");
        assert_eq!(restored, Session::new("jane@kongu.edu", "faculty", vec!["srv-a".to_string()]));
        assert_eq!(store.current(), Some(restored.clone()));
        assert_eq!(store.state(), AuthState::Authenticated(restored));
    }

    #[test]
    fn test_restore_nothing_stored() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        assert_eq!(store.restore(), None);
        assert_eq!(store.state(), AuthState::Anonymous);
    }

    #[test]
    fn test_restore_invalid_json_fails_closed() {
        let storage = record("{not json");
        let store = store_with(storage.clone());
        assert_eq!(store.restore(), None);
        assert_eq!(store.current(), None);
        assert!(!storage.contains(SESSION_KEY));
    }

    #[test]
    fn test_restore_missing_role_fails_closed() {
        let storage = record(r#"{"email":"jane@kongu.edu"}"#);
        let store = store_with(storage.clone());
        assert_eq!(store.restore(), None);
        assert!(!storage.contains(SESSION_KEY));
    }

    #[test]
    fn test_restore_blank_role_fails_closed() {
        let store = store_with(record(r#"{"email":"jane@kongu.edu","role":""}"#));
        assert_eq!(store.restore(), None);
    }

    #[test]
    fn test_restore_wrong_shape_fails_closed() {
        let storage = record(r#"["jane@kongu.edu","faculty"]"#);
        let store = store_with(storage.clone());
        assert_eq!(store.restore(), None);
        assert_eq!(store.current(), None);
        assert!(!storage.contains(SESSION_KEY));

        let store = store_with(record(r#"["jane@kongu.edu","faculty",["srv-a"]]"#));
        assert_eq!(store.restore(), None);

        let store = store_with(record("null"));
        assert_eq!(store.restore(), None);

        let store = store_with(record(r#"{"email":"a","role":"b","allowedServers":"srv-a"}"#));
        assert_eq!(store.restore(), None);
    }

    #[test]
    fn test_logout_clears_memory_and_storage() {
        let storage = record(r#"{"email":"jane@kongu.edu","role":"faculty"}"#);
        let store = store_with(storage.clone());
        store.restore().expect("session restored");

        store.logout().expect("logout");
        assert_eq!(store.current(), None);
        assert!(!storage.contains(SESSION_KEY));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let storage = record(r#"{"email":"jane@kongu.edu","role":"faculty"}"#);
        let store = store_with(storage.clone());
        store.restore();

        store.logout().expect("first logout");
        store.logout().expect("second logout");
        assert_eq!(store.current(), None);
        assert_eq!(store.state(), AuthState::Anonymous);
        assert!(!storage.contains(SESSION_KEY));
    }

    #[test]
    fn test_save_writes_current_session() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());

        *store.handle().write() = Some(Session::new("jane@kongu.edu", "faculty", Vec::new()));
        store.save().expect("save");
        let saved = storage.get_item(SESSION_KEY).unwrap().expect("record written");
        assert_eq!(saved, r#"{"email":"jane@kongu.edu","role":"faculty"}"#);

        *store.handle().write() = None;
        store.save().expect("save");
        assert!(!storage.contains(SESSION_KEY));
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        assert_eq!(store.login("   ", "secret").await, Err(AuthError::MissingCredentials));
        assert_eq!(store.login("jane@kongu.edu", "").await, Err(AuthError::MissingCredentials));
        assert_eq!(store.current(), None);
    }

    /// Storage whose removals always fail; writes optionally fail too.
    struct StuckStorage {
        inner: MemoryStorage,
        writes_fail: bool,
    }

    impl SessionStorage for StuckStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            if self.writes_fail {
                anyhow::bail!("storage is read-only");
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, _key: &str) -> Result<()> {
            anyhow::bail!("permission denied")
        }
    }

    fn stuck(writes_fail: bool) -> Arc<StuckStorage> {
        Arc::new(StuckStorage {
            inner: MemoryStorage::new()
                .with_item(SESSION_KEY, r#"{"email":"jane@kongu.edu","role":"faculty"}"#),
            writes_fail,
        })
    }

    #[test]
    fn test_logout_invalidates_record_it_cannot_remove() {
        let storage = stuck(false);
        let store = store_with(storage.clone());
        store.restore().expect("session restored");

        store.logout().expect("record overwritten");
        assert_eq!(store.current(), None);

        // A fresh process must not come back authenticated
        let restarted = store_with(storage);
        assert_eq!(restarted.restore(), None);
        assert_eq!(restarted.current(), None);
    }

    #[test]
    fn test_logout_reports_record_it_cannot_clear() {
        let store = store_with(stuck(true));
        store.restore().expect("session restored");

        assert!(store.logout().is_err());
        assert_eq!(store.current(), None);
        assert_eq!(store.state(), AuthState::Anonymous);
    }
}
