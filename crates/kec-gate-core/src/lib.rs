//! Core library for kec-gate.
//!
//! This crate provides the client-side session gate for KEC Assistant:
//!
//! - `auth`: the `Session` model and the `SessionStore` that owns its lifecycle
//! - `api`: the credential service client and the `AuthError` taxonomy
//! - `storage`: durable key/value backends for the persisted session record
//! - `dispatch`: the injectable request dispatcher and the header augmenter
//! - `gate`: login/logout orchestration tying the store to the augmenter
//! - `config`: application configuration and auth service URL resolution

pub mod api;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod gate;
pub mod storage;

pub use api::{AuthError, CredentialClient};
pub use auth::{AuthState, CorruptPersistedState, Session, SessionHandle, SessionStore};
pub use config::Config;
pub use dispatch::{
    AugmenterError, Dispatch, DispatchHandle, HttpDispatcher, RequestAugmenter,
    ALLOWED_SERVERS_HEADER, ROLE_HEADER,
};
pub use gate::SessionGate;
pub use storage::{FileStorage, MemoryStorage, SessionStorage, SESSION_KEY};
