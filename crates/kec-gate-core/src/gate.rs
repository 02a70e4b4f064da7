//! Login/logout orchestration.
//!
//! `SessionGate` keeps the request augmenter in step with the session store:
//! it is installed on every transition into an authenticated state and
//! removed on every transition out of it.

use std::sync::Arc;

use anyhow::Result;
use reqwest::{Client, IntoUrl, Method, Request, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::api::{AuthError, CredentialClient};
use crate::auth::{AuthState, Session, SessionStore};
use crate::config::Config;
use crate::dispatch::{AugmenterError, Dispatch, DispatchHandle};
use crate::storage::FileStorage;

/// Assumes a single owner drives login and logout. Concurrent logins are
/// tolerated, but a logout racing a login may leave either outcome.
pub struct SessionGate {
    store: SessionStore,
    dispatch: DispatchHandle,
}

impl SessionGate {
    pub fn new(store: SessionStore, dispatch: DispatchHandle) -> Self {
        Self { store, dispatch }
    }

    /// Build a gate from configuration: file-backed storage in the data
    /// directory and one shared HTTP client for login and app traffic.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        let base_url = config.auth_base_url()?;
        debug!(%base_url, "Auth service configured");

        let storage = Arc::new(FileStorage::new(config.data_dir()?));
        let credentials = CredentialClient::with_client(client.clone(), &base_url);
        let store = SessionStore::new(storage, credentials);
        Ok(Self::new(store, DispatchHandle::new(client)))
    }

    /// Restore a persisted session and, if there was one, start augmenting.
    pub fn startup(&self) -> Option<Session> {
        let session = self.store.restore()?;
        self.sync_augmenter();
        Some(session)
    }

    /// Authenticate and start augmenting outbound requests.
    pub async fn login(&self, identity: &str, secret: &str) -> Result<Session, AuthError> {
        let session = self.store.login(identity, secret).await?;
        self.sync_augmenter();
        Ok(session)
    }

    /// Stop augmenting and forget the session. Safe to call repeatedly.
    ///
    /// Fails only if a stale session record may remain in storage; the
    /// in-memory session is gone either way.
    pub fn logout(&self) -> Result<()> {
        self.deactivate();
        self.store.logout()
    }

    /// Match the augmenter to the store: installed iff a session is present.
    /// The store is re-read here, so a logout that landed after `login`
    /// resolved does not leave an orphaned wrapper.
    fn sync_augmenter(&self) {
        if self.store.handle().is_authenticated() {
            self.activate();
        } else {
            self.deactivate();
        }
    }

    fn activate(&self) {
        match self.dispatch.activate(self.store.handle()) {
            Ok(()) => {}
            // Direct session replacement: the installed wrapper already reads
            // the new session
            Err(AugmenterError::AlreadyActive) => debug!("Augmenter already installed"),
            Err(e) => warn!(error = %e, "Unexpected augmenter state on activation"),
        }
    }

    fn deactivate(&self) {
        match self.dispatch.deactivate() {
            Ok(()) => {}
            Err(AugmenterError::NotActive) => debug!("Augmenter not installed"),
            Err(e) => warn!(error = %e, "Unexpected augmenter state on deactivation"),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.store.current()
    }

    pub fn state(&self) -> AuthState {
        self.store.state()
    }

    pub fn is_augmenting(&self) -> bool {
        self.dispatch.is_active()
    }

    /// The dispatcher the rest of the application should send through.
    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        self.dispatch.dispatcher()
    }

    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.dispatch.request(method, url)
    }

    pub async fn send(&self, request: Request) -> reqwest::Result<Response> {
        self.dispatch.send(request).await
    }
}
