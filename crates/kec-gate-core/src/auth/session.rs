use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix for the per-user storage namespace handed to the downstream app.
const STORAGE_PREFIX: &str = "kec";

/// Namespace used when the identity has no usable characters.
const ANONYMOUS_SLUG: &str = "anon";

/// Separator for the allowed-servers header value.
const SCOPE_SEPARATOR: &str = ",";

/// The authenticated identity/role/scope record for the current user.
///
/// Serialized as `{ "email", "role", "allowedServers"? }`, the same shape the
/// durable `auth-session` record uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    #[serde(rename = "email")]
    pub identity: String,
    pub role: String,
    #[serde(
        rename = "allowedServers",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub allowed_scopes: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Session {
    pub fn new(
        identity: impl Into<String>,
        role: impl Into<String>,
        allowed_scopes: Vec<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            role: role.into(),
            allowed_scopes,
        }
    }

    /// A session without a role must never be treated as authenticated.
    pub fn has_role(&self) -> bool {
        !self.role.trim().is_empty()
    }

    /// Allowed scopes joined for the `X-Allowed-Servers` header, if any.
    pub fn scopes_header(&self) -> Option<String> {
        if self.allowed_scopes.is_empty() {
            None
        } else {
            Some(self.allowed_scopes.join(SCOPE_SEPARATOR))
        }
    }

    /// Per-user storage namespace, e.g. `kec-jane-doe-kongu-edu`.
    pub fn storage_prefix(&self) -> String {
        format!("{}-{}", STORAGE_PREFIX, slug(&self.identity))
    }
}

/// Collapse every run of non-alphanumeric ASCII characters into one `-`
/// and lowercase the rest.
fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_gap = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            in_gap = false;
        } else if !in_gap {
            out.push('-');
            in_gap = true;
        }
    }

    if out.is_empty() {
        ANONYMOUS_SLUG.to_string()
    } else {
        out
    }
}

/// Shared read reference to the canonical in-memory session.
///
/// Clone is cheap. The `SessionStore` is the only writer; readers such as the
/// request augmenter look the value up on every call instead of caching it.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    /// Snapshot of the current session.
    pub fn get(&self) -> Option<Session> {
        self.inner.read().clone()
    }

    /// Run `f` against the current session without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(Option<&Session>) -> R) -> R {
        f(self.inner.read().as_ref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().is_some()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write()
    }
}
