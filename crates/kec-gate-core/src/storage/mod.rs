//! Durable client-local storage for the session record.
//!
//! This module provides:
//! - `SessionStorage`: a minimal key/value interface over strings
//! - `FileStorage`: one JSON file per key in the application data directory
//! - `MemoryStorage`: an in-process map for tests and embedding
//!
//! All writes are synchronous; callers block only as long as the medium does.

pub mod file;
pub mod memory;

use anyhow::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key under which the serialized session record lives.
pub const SESSION_KEY: &str = "auth-session";

pub trait SessionStorage: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}
