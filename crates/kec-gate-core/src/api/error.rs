use thiserror::Error;

/// Fallback reason when the service rejects without saying why.
pub const FALLBACK_REJECTION: &str = "Invalid credentials";

/// Message shown for transport-level failures.
const UNREACHABLE_MESSAGE: &str = "Unable to reach auth server";

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unable to reach auth server")]
    Unreachable,

    #[error("{0}")]
    Rejected(String),

    #[error("Invalid response from auth server: {0}")]
    InvalidResponse(String),

    #[error("Email and password required")]
    MissingCredentials,
}

impl AuthError {
    /// Build a rejection, falling back to the generic reason when the service
    /// supplied none.
    pub fn rejected(reason: Option<String>) -> Self {
        match reason {
            Some(reason) if !reason.trim().is_empty() => AuthError::Rejected(reason),
            _ => AuthError::Rejected(FALLBACK_REJECTION.to_string()),
        }
    }

    /// Text to show the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            // A garbled success body is indistinguishable from a broken
            // service from the user's point of view
            AuthError::Unreachable | AuthError::InvalidResponse(_) => {
                UNREACHABLE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether retrying with the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Unreachable | AuthError::InvalidResponse(_))
    }

    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        let total = body.chars().count();
        if total <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total chars)", head, total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_uses_service_reason() {
        assert_eq!(
            AuthError::rejected(Some("Account locked".to_string())),
            AuthError::Rejected("Account locked".to_string())
        );
    }

    #[test]
    fn test_rejected_falls_back() {
        assert_eq!(AuthError::rejected(None), AuthError::Rejected("Invalid credentials".to_string()));
        assert_eq!(
            AuthError::rejected(Some("   ".to_string())),
            AuthError::Rejected("Invalid credentials".to_string())
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(AuthError::Unreachable.user_message(), "Unable to reach auth server");
        assert_eq!(
            AuthError::InvalidResponse("missing role".to_string()).user_message(),
            "Unable to reach auth server"
        );
        assert_eq!(
            AuthError::Rejected("Account locked".to_string()).user_message(),
            "Account locked"
        );
        assert_eq!(AuthError::MissingCredentials.user_message(), "Email and password required");
    }

    #[test]
    fn test_is_retryable() {
        assert!(AuthError::Unreachable.is_retryable());
        assert!(!AuthError::rejected(None).is_retryable());
        assert!(!AuthError::MissingCredentials.is_retryable());
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(AuthError::truncate_body("short"), "short");
        let long = "é".repeat(600);
        let truncated = AuthError::truncate_body(&long);
        assert!(truncated.ends_with("(truncated, 600 total chars)"));
        assert!(truncated.starts_with(&"é".repeat(500)));
    }
}
