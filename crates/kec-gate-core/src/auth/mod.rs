//! Session lifecycle.
//!
//! This module provides:
//! - `Session`: the identity/role/scope record and its durable JSON shape
//! - `SessionHandle`: the shared read reference handed to the augmenter
//! - `SessionStore`: restore, login, logout and explicit persistence
//!
//! Persisted sessions are restored fail-closed: anything unreadable is
//! treated as "no session".

pub mod session;
pub mod store;

pub use session::{Session, SessionHandle};
pub use store::{AuthState, CorruptPersistedState, SessionStore};
