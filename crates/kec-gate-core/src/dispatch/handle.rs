use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::{Client, IntoUrl, Method, Request, RequestBuilder, Response};
use tracing::debug;

use crate::auth::SessionHandle;

use super::{AugmenterError, Dispatch, HttpDispatcher, RequestAugmenter};

/// The one place the application gets its dispatcher from.
///
/// The augmenter always wraps the original base dispatcher, never whatever
/// is currently installed, so login/logout cycles cannot stack wrappers.
pub struct DispatchHandle {
    client: Client,
    base: Arc<dyn Dispatch>,
    installed: Mutex<Option<Arc<RequestAugmenter>>>,
}

impl DispatchHandle {
    /// Dispatch through `client` directly while anonymous.
    pub fn new(client: Client) -> Self {
        let base = Arc::new(HttpDispatcher::new(client.clone()));
        Self::with_base(client, base)
    }

    /// Use a custom base dispatcher. `client` is only used to build requests.
    pub fn with_base(client: Client, base: Arc<dyn Dispatch>) -> Self {
        Self {
            client,
            base,
            installed: Mutex::new(None),
        }
    }

    /// The dispatcher callers should use right now.
    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        match self.installed.lock().as_ref() {
            Some(augmenter) => augmenter.clone() as Arc<dyn Dispatch>,
            None => self.base.clone(),
        }
    }

    /// The unaugmented dispatcher.
    pub fn base(&self) -> Arc<dyn Dispatch> {
        self.base.clone()
    }

    pub fn is_active(&self) -> bool {
        self.installed.lock().is_some()
    }

    /// Install the augmenter over the base dispatcher.
    pub fn activate(&self, session: SessionHandle) -> Result<(), AugmenterError> {
        let mut installed = self.installed.lock();
        if installed.is_some() {
            return Err(AugmenterError::AlreadyActive);
        }

        *installed = Some(Arc::new(RequestAugmenter::new(self.base.clone(), session)));
        debug!("Request augmenter installed");
        Ok(())
    }

    /// Remove the augmenter, restoring the base dispatcher.
    pub fn deactivate(&self) -> Result<(), AugmenterError> {
        match self.installed.lock().take() {
            Some(_) => {
                debug!("Request augmenter removed");
                Ok(())
            }
            None => Err(AugmenterError::NotActive),
        }
    }

    /// Start building a request on the shared client.
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send through whichever dispatcher is current.
    pub async fn send(&self, request: Request) -> reqwest::Result<Response> {
        let dispatcher = self.dispatcher();
        dispatcher.dispatch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> DispatchHandle {
        DispatchHandle::new(Client::new())
    }

    #[test]
    fn test_starts_with_base() {
        let handle = handle();
        assert!(!handle.is_active());
        assert!(Arc::ptr_eq(&handle.dispatcher(), &handle.base()));
    }

    #[test]
    fn test_activate_installs_augmenter() {
        let handle = handle();
        handle.activate(SessionHandle::default()).unwrap();
        assert!(handle.is_active());
        assert!(!Arc::ptr_eq(&handle.dispatcher(), &handle.base()));
    }

    #[test]
    fn test_double_activation_is_rejected() {
        let handle = handle();
        handle.activate(SessionHandle::default()).unwrap();
        let first = handle.dispatcher();

        assert_eq!(
            handle.activate(SessionHandle::default()),
            Err(AugmenterError::AlreadyActive)
        );
        // The original wrapper is still the one handed out
        assert!(Arc::ptr_eq(&first, &handle.dispatcher()));
    }

    #[test]
    fn test_deactivate_without_activation_is_rejected() {
        let handle = handle();
        assert_eq!(handle.deactivate(), Err(AugmenterError::NotActive));
        assert!(Arc::ptr_eq(&handle.dispatcher(), &handle.base()));
    }

    #[test]
    fn test_cycles_restore_base() {
        let handle = handle();
        for _ in 0..5 {
            handle.activate(SessionHandle::default()).unwrap();
            handle.deactivate().unwrap();
            assert!(Arc::ptr_eq(&handle.dispatcher(), &handle.base()));
        }
        assert_eq!(handle.deactivate(), Err(AugmenterError::NotActive));
    }

    #[test]
    fn test_request_builder_uses_shared_client() {
        let handle = handle();
        let request = handle
            .request(Method::GET, "http://localhost:4001/api/servers")
            .header("x-custom", "1")
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/api/servers");
        assert_eq!(request.headers()["x-custom"], "1");
    }
}
