//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the auth service location, the application origin, and the
//! last email used to sign in.
//!
//! Configuration is stored at `~/.config/kec-gate/config.json`. The
//! `KEC_AUTH_URL` environment variable overrides the auth service base URL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::client::REQUEST_TIMEOUT_SECS;

/// Application name used for config/data directory paths
const APP_NAME: &str = "kec-gate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the auth service base URL
pub const AUTH_URL_ENV: &str = "KEC_AUTH_URL";

/// Port the front-end dev server listens on.
const DEV_SERVER_PORT: u16 = 5173;

/// Where the auth API runs during local development.
const DEV_AUTH_URL: &str = "http://localhost:4001";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Explicit auth service base URL.
    pub auth_url: Option<String>,
    /// Origin the application is served from; the auth service is assumed to
    /// live there unless overridden.
    pub origin: Option<String>,
    pub last_email: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session record.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS))
    }

    /// Auth service base URL, honouring `KEC_AUTH_URL`.
    pub fn auth_base_url(&self) -> Result<String> {
        let env_override = std::env::var(AUTH_URL_ENV).ok();
        let explicit = env_override.as_deref().or(self.auth_url.as_deref());
        resolve_auth_url(explicit, self.origin.as_deref())
    }
}

/// Pick the auth service base URL.
///
/// An explicit URL wins. Otherwise the service lives at the application
/// origin, except when the origin is the front-end dev server, in which case
/// the local auth API is used.
pub fn resolve_auth_url(explicit: Option<&str>, origin: Option<&str>) -> Result<String> {
    if let Some(url) = explicit.map(str::trim).filter(|url| !url.is_empty()) {
        return Ok(url.trim_end_matches('/').to_string());
    }

    let origin = origin
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No auth service configured: set {} or `origin` in the config file",
                AUTH_URL_ENV
            )
        })?;

    let url = Url::parse(origin).with_context(|| format!("Invalid origin: {}", origin))?;
    if url.port() == Some(DEV_SERVER_PORT) {
        return Ok(DEV_AUTH_URL.to_string());
    }
    Ok(url.origin().ascii_serialization())
}
