//! Error types for the MCP login broker.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Each security mechanism has its own error enum; `FlowError` is the taxonomy
//! surfaced to end users.

use axum::http::StatusCode;

/// CSRF double-submit failures.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfError {
    /// Form token or cookie absent
    #[error("CSRF token missing")]
    Missing,

    /// Form token and cookie differ
    #[error("CSRF token mismatch")]
    Mismatch,
}

/// Session-binding cookie failures.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// No binding cookie on the callback request
    #[error("Session binding cookie missing")]
    CookieMissing,

    /// Cookie does not match the hash of the state token
    #[error("Session binding mismatch")]
    Mismatch,
}

/// Errors from the TTL key-value store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Backend unavailable or rejected the operation
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Pending-authorization state failures.
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    /// Unknown, expired, or already consumed state token
    #[error("State not found or expired")]
    NotFound,

    /// Stored record could not be decoded
    #[error("State record corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// Store failure while reading or writing state
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the identity provider client.
#[derive(thiserror::Error, Debug)]
pub enum IdpError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Code exchange rejected or returned no access token
    #[error("Token exchange failed ({status}): {body}")]
    ExchangeFailed {
        /// HTTP status code
        status: u16,
        /// Upstream response body
        body: String,
    },

    /// Profile request rejected
    #[error("Profile fetch failed ({status}): {body}")]
    ProfileFailed {
        /// HTTP status code
        status: u16,
        /// Upstream response body
        body: String,
    },
}

/// Errors from the identity exchange backend.
#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected status from the backend
    #[error("Identity exchange failed ({status}): {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
}

/// Errors from token issuance.
#[derive(thiserror::Error, Debug)]
pub enum IssueError {
    /// The stored redirect URI is not a valid URL
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(#[from] url::ParseError),

    /// Grant unknown, expired, or failed validation
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),
}

impl IssueError {
    /// Create an invalid grant error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }
}

/// Terminal failures of the authorization flow.
#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    /// Missing or malformed OAuth parameters
    #[error("Invalid authorization request: {0}")]
    ClientRequestInvalid(String),

    /// CSRF check failed
    #[error(transparent)]
    Csrf(#[from] CsrfError),

    /// Pending authorization missing, expired, or corrupt
    #[error(transparent)]
    State(#[from] StateError),

    /// Session binding missing or mismatched
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Identity provider rejected the exchange or profile request
    #[error("Identity provider error: {0}")]
    Idp(#[from] IdpError),

    /// No backend account is linked to the IdP user
    #[error("No account linked to this identity")]
    AccountNotLinked,

    /// Identity exchange backend failed
    #[error("Identity exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// Anything else
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

/// Message shown when the identity exchange finds no account.
pub const ACCOUNT_NOT_LINKED_MESSAGE: &str =
    "Account not found. Please register with the service before connecting it to your MCP client.";

impl FlowError {
    /// Create a client request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::ClientRequestInvalid(message.into())
    }

    /// Create an unexpected failure.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// HTTP status for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ClientRequestInvalid(_) => StatusCode::BAD_REQUEST,
            Self::Csrf(CsrfError::Missing) => StatusCode::BAD_REQUEST,
            Self::Csrf(CsrfError::Mismatch) => StatusCode::FORBIDDEN,
            Self::State(StateError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::State(_) => StatusCode::BAD_REQUEST,
            Self::Session(SessionError::CookieMissing) => StatusCode::BAD_REQUEST,
            Self::Session(SessionError::Mismatch) => StatusCode::FORBIDDEN,
            Self::AccountNotLinked => StatusCode::FORBIDDEN,
            Self::Idp(_) | Self::Exchange(_) | Self::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ClientRequestInvalid(_) => "INVALID_REQUEST",
            Self::Csrf(CsrfError::Missing) => "CSRF_MISSING",
            Self::Csrf(CsrfError::Mismatch) => "CSRF_MISMATCH",
            Self::State(StateError::NotFound) => "STATE_NOT_FOUND",
            Self::State(StateError::Corrupt(_)) => "STATE_CORRUPT",
            Self::State(StateError::Store(_)) => "STATE_STORE_UNAVAILABLE",
            Self::Session(SessionError::CookieMissing) => "SESSION_COOKIE_MISSING",
            Self::Session(SessionError::Mismatch) => "SESSION_MISMATCH",
            Self::Idp(IdpError::ProfileFailed { .. }) => "IDP_PROFILE_FAILED",
            Self::Idp(_) => "IDP_EXCHANGE_FAILED",
            Self::AccountNotLinked => "ACCOUNT_NOT_LINKED",
            Self::Exchange(_) => "IDENTITY_EXCHANGE_FAILED",
            Self::Unexpected(_) => "UNEXPECTED_FAILURE",
        }
    }

    /// Message safe to show to the end user.
    ///
    /// Upstream bodies and internal details are never included.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ClientRequestInvalid(message) => message.clone(),
            Self::Csrf(CsrfError::Missing) => {
                "The approval form is missing its security token. Please start again.".to_string()
            }
            Self::Csrf(CsrfError::Mismatch) => {
                "The approval form could not be verified. Please start again.".to_string()
            }
            Self::State(StateError::NotFound) => {
                "This login request has expired or was already used. Please start again."
                    .to_string()
            }
            Self::State(StateError::Corrupt(_)) => {
                "This login request could not be read. Please start again.".to_string()
            }
            Self::Session(SessionError::CookieMissing) => {
                "Your browser session for this login was not found. Please start again."
                    .to_string()
            }
            Self::Session(SessionError::Mismatch) => {
                "Session binding mismatch: this login was started in a different browser session."
                    .to_string()
            }
            Self::Idp(_) => {
                "Login with the identity provider failed. Please try again.".to_string()
            }
            Self::AccountNotLinked => ACCOUNT_NOT_LINKED_MESSAGE.to_string(),
            Self::Exchange(_) => {
                "We could not verify your account right now. Please try again later.".to_string()
            }
            Self::State(StateError::Store(_)) | Self::Unexpected(_) => {
                "An unexpected error occurred. Please try again.".to_string()
            }
        }
    }
}

/// Result type alias for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_status_codes() {
        let missing = FlowError::from(CsrfError::Missing);
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let mismatch = FlowError::from(CsrfError::Mismatch);
        assert_eq!(mismatch.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_session_status_codes() {
        let missing = FlowError::from(SessionError::CookieMissing);
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let mismatch = FlowError::from(SessionError::Mismatch);
        assert_eq!(mismatch.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_account_not_linked_is_distinct() {
        let err = FlowError::AccountNotLinked;
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), "ACCOUNT_NOT_LINKED");
        assert!(err.user_message().contains("register"));
    }

    #[test]
    fn test_idp_body_not_in_user_message() {
        let err = FlowError::from(IdpError::ExchangeFailed {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "IDP_EXCHANGE_FAILED");
        assert!(!err.user_message().contains("invalid_grant"));
        // The body is still available for logging
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn test_profile_failure_code() {
        let err = FlowError::from(IdpError::ProfileFailed {
            status: 401,
            body: String::new(),
        });
        assert_eq!(err.error_code(), "IDP_PROFILE_FAILED");
    }

    #[test]
    fn test_state_store_failure_is_server_error() {
        let err = FlowError::from(StateError::from(StoreError::Backend("down".into())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("down"));
    }
}
