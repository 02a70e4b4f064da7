use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Request;
use tracing::warn;

use crate::auth::{Session, SessionHandle};

use super::{Dispatch, DispatchFuture};

/// Carries `Session.role` verbatim.
pub const ROLE_HEADER: &str = "x-role";

/// Carries the allowed scopes joined with `,`.
pub const ALLOWED_SERVERS_HEADER: &str = "x-allowed-servers";

/// Wraps a dispatcher and stamps the session's role and scopes onto every
/// request it forwards.
///
/// The session is looked up through the handle on each call, so the wrapper
/// never sends a stale role.
pub struct RequestAugmenter {
    inner: Arc<dyn Dispatch>,
    session: SessionHandle,
}

impl RequestAugmenter {
    pub fn new(inner: Arc<dyn Dispatch>, session: SessionHandle) -> Self {
        Self { inner, session }
    }

    /// Apply the current session's headers. No session, no change.
    pub fn augment(&self, headers: &mut HeaderMap) {
        self.session.with(|session| {
            if let Some(session) = session {
                apply_session_headers(headers, session);
            }
        });
    }
}

impl Dispatch for RequestAugmenter {
    fn dispatch(&self, mut request: Request) -> DispatchFuture<'_> {
        self.augment(request.headers_mut());
        self.inner.dispatch(request)
    }
}

/// Set the reserved headers from `session`, replacing whatever the caller put
/// there. Other headers are left alone.
///
/// Never fails: a value that cannot be encoded as a header is dropped.
pub fn apply_session_headers(headers: &mut HeaderMap, session: &Session) {
    set_reserved(headers, ROLE_HEADER, Some(session.role.as_str()));
    set_reserved(headers, ALLOWED_SERVERS_HEADER, session.scopes_header().as_deref());
}

fn set_reserved(headers: &mut HeaderMap, name: &'static str, value: Option<&str>) {
    let name = HeaderName::from_static(name);
    // A caller-supplied value must not survive under a reserved name
    headers.remove(&name);

    let Some(value) = value else {
        return;
    };

    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => {
            warn!(header = %name, error = %e, "Omitting header with unencodable value");
        }
    }
}
