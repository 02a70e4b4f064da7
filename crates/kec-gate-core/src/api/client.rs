//! Credential service client.
//!
//! One endpoint, one exchange: `POST {base}/auth/login` with
//! `{ "email", "password" }`. The response is mapped onto `AuthError` or a
//! fresh `Session`; identity always comes from the caller, never the server.

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Session;

use super::AuthError;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, relative to the auth service base URL
const LOGIN_PATH: &str = "/auth/login";

/// HTTP request timeout in seconds.
/// Past this point the service is reported as unreachable.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Fields read from a body with `"ok": true`.
#[derive(Debug, Deserialize)]
struct AcceptedLogin {
    role: Option<String>,
    #[serde(rename = "allowedServers")]
    allowed_servers: Option<Vec<String>>,
}

/// Client for the credential service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct CredentialClient {
    client: Client,
    login_url: String,
}

impl CredentialClient {
    /// Reuse an existing client, sharing its connection pool.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            login_url: format!("{}{}", base_url.trim_end_matches('/'), LOGIN_PATH),
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Submit credentials and build a session from an accepted response.
    ///
    /// `email` is expected to be trimmed already.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        debug!(url = %self.login_url, email, "Sending login request");

        let response = self
            .client
            .post(&self.login_url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url = %self.login_url, "Credential service unreachable");
                AuthError::Unreachable
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(error = %e, %status, "Failed to read credential service response");
            AuthError::Unreachable
        })?;

        Self::interpret(status, &body, email)
    }

    /// Map a credential service response onto a session or an error.
    ///
    /// `ok` is read first; the remaining fields only have to be well formed
    /// on an accepted login.
    fn interpret(status: StatusCode, body: &str, email: &str) -> Result<Session, AuthError> {
        let parsed = serde_json::from_str::<Value>(body);

        if !status.is_success() {
            debug!(%status, "Credential service returned error status");
            let reason = parsed.ok().as_ref().and_then(error_reason);
            return Err(AuthError::rejected(reason));
        }

        let value = parsed.map_err(|e| {
            warn!(error = %e, "Unparseable credential service response");
            AuthError::InvalidResponse(format!("{}: {}", e, AuthError::truncate_body(body)))
        })?;

        let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !ok {
            return Err(AuthError::rejected(error_reason(&value)));
        }

        let accepted: AcceptedLogin = serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "Malformed accepted login");
            AuthError::InvalidResponse(format!("{}: {}", e, AuthError::truncate_body(body)))
        })?;

        let role = accepted
            .role
            .filter(|role| !role.trim().is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("accepted login without a role".to_string()))?;

        Ok(Session::new(
            email,
            role,
            accepted.allowed_servers.unwrap_or_default(),
        ))
    }
}

/// The service's `error` field, when it is a string.
fn error_reason(value: &Value) -> Option<String> {
    value.get("error").and_then(Value::as_str).map(str::to_string)
}
