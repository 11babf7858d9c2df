//! Token issuance hand-off.
//!
//! Once the user is identified, the flow hands the original request and the
//! identity payload to a [`TokenIssuer`], which returns the URL to send the
//! user agent back to. [`CodeIssuer`] is an in-memory issuer that mints
//! one-time authorization codes for an external token endpoint to redeem.

pub mod pkce;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use crate::crypto;
use crate::error::IssueError;
use crate::models::{PendingAuthorization, Props};

/// Authorization code lifetime: 10 minutes.
const AUTH_CODE_LIFETIME: Duration = Duration::from_secs(600);
/// Cleanup interval: 5 minutes.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Everything the token issuer needs to complete an authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteAuthorization {
    /// The client's original request.
    pub request: PendingAuthorization,
    /// Subject of the issued token (the IdP user id).
    pub user_id: String,
    pub scope: Vec<String>,
    /// Display metadata stored alongside the grant.
    pub metadata: Value,
    pub props: Props,
}

/// Completes an authorization and returns the redirect URL for the client.
#[async_trait::async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn complete_authorization(
        &self,
        grant: CompleteAuthorization,
    ) -> Result<String, IssueError>;
}

struct IssuedCode {
    grant: CompleteAuthorization,
    created_at: Instant,
}

impl IssuedCode {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > AUTH_CODE_LIFETIME
    }
}

/// In-memory [`TokenIssuer`] minting one-time authorization codes.
#[derive(Clone, Default)]
pub struct CodeIssuer {
    codes: Arc<RwLock<HashMap<String, IssuedCode>>>,
}

impl CodeIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Redeem an authorization code (one-time use).
    ///
    /// Checks expiry, client id, redirect URI, and the PKCE verifier when the
    /// original request carried a challenge.
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<CompleteAuthorization, IssueError> {
        let issued = self
            .codes
            .write()
            .await
            .remove(code)
            .ok_or_else(|| {
                IssueError::invalid_grant("Invalid or already used authorization code")
            })?;

        if issued.is_expired() {
            return Err(IssueError::invalid_grant("Authorization code expired"));
        }

        let request = &issued.grant.request;
        if request.client_id != client_id {
            return Err(IssueError::invalid_grant("client_id mismatch"));
        }
        if request.redirect_uri != redirect_uri {
            return Err(IssueError::invalid_grant("redirect_uri mismatch"));
        }
        if let Some(challenge) = request.code_challenge.as_deref() {
            let verifier = code_verifier
                .ok_or_else(|| IssueError::invalid_grant("Missing code_verifier"))?;
            let method = request.code_challenge_method.as_deref();
            if !pkce::verify(method, verifier, challenge) {
                return Err(IssueError::invalid_grant("PKCE verification failed"));
            }
        }

        tracing::info!(
            client_id = %client_id,
            user_id = %issued.grant.user_id,
            "Redeemed authorization code"
        );
        Ok(issued.grant)
    }

    /// Start background cleanup task for expired codes.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        });
    }

    async fn cleanup_expired(&self) {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, code| !code.is_expired());
        let removed = before - codes.len();
        if removed > 0 {
            tracing::debug!(count = removed, "Cleaned up expired authorization codes");
        }
    }
}

#[async_trait::async_trait]
impl TokenIssuer for CodeIssuer {
    async fn complete_authorization(
        &self,
        grant: CompleteAuthorization,
    ) -> Result<String, IssueError> {
        let mut redirect = Url::parse(&grant.request.redirect_uri)?;
        let code = crypto::random_token();

        {
            let mut pairs = redirect.query_pairs_mut();
            pairs.append_pair("code", &code);
            if let Some(state) = grant.request.state.as_deref() {
                pairs.append_pair("state", state);
            }
        }

        tracing::info!(
            client_id = %grant.request.client_id,
            user_id = %grant.user_id,
            "Issued authorization code"
        );
        let issued = IssuedCode {
            grant,
            created_at: Instant::now(),
        };
        self.codes.write().await.insert(code, issued);

        Ok(redirect.into())
    }
}

impl std::fmt::Debug for CodeIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIssuer").finish()
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use sha2::{Digest, Sha256};

    use super::*;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    fn grant(redirect_uri: &str) -> CompleteAuthorization {
        CompleteAuthorization {
            request: PendingAuthorization {
                response_type: "code".into(),
                client_id: "client1".into(),
                redirect_uri: redirect_uri.into(),
                scope: vec!["mcp".into()],
                state: Some("xyz 123".into()),
                code_challenge: Some(URL_SAFE_NO_PAD.encode(Sha256::digest(VERIFIER.as_bytes()))),
                code_challenge_method: Some("S256".into()),
                resource: None,
            },
            user_id: "U1".into(),
            scope: vec!["mcp".into()],
            metadata: serde_json::json!({"label": "Alice"}),
            props: Props {
                user_id: "U1".into(),
                account_id: "acct-1".into(),
                display_name: "Alice".into(),
            },
        }
    }

    fn code_from(location: &str) -> String {
        let url = Url::parse(location).unwrap();
        let (_, code) = url.query_pairs().find(|(k, _)| k == "code").unwrap();
        code.into_owned()
    }

    #[tokio::test]
    async fn test_redirect_carries_code_and_state() {
        let issuer = CodeIssuer::new();
        let location = issuer
            .complete_authorization(grant("https://client.example/cb?x=1"))
            .await
            .unwrap();

        let url = Url::parse(&location).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["x"], "1");
        assert_eq!(pairs["state"], "xyz 123");
        assert!(!pairs["code"].is_empty());
    }

    #[tokio::test]
    async fn test_redeem_lifecycle() {
        let issuer = CodeIssuer::new();
        let location = issuer
            .complete_authorization(grant("https://client.example/cb"))
            .await
            .unwrap();
        let code = code_from(&location);

        let redeemed = issuer
            .redeem(&code, "client1", "https://client.example/cb", Some(VERIFIER))
            .await
            .unwrap();
        assert_eq!(redeemed.props.account_id, "acct-1");

        // Second redeem fails (already used)
        assert!(
            issuer
                .redeem(&code, "client1", "https://client.example/cb", Some(VERIFIER))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_redeem_rejects_bad_verifier() {
        let issuer = CodeIssuer::new();
        let location = issuer
            .complete_authorization(grant("https://client.example/cb"))
            .await
            .unwrap();
        let code = code_from(&location);

        let err = issuer
            .redeem(&code, "client1", "https://client.example/cb", Some("wrong"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PKCE"));
    }

    #[tokio::test]
    async fn test_redeem_rejects_wrong_client() {
        let issuer = CodeIssuer::new();
        let location = issuer
            .complete_authorization(grant("https://client.example/cb"))
            .await
            .unwrap();
        let code = code_from(&location);

        assert!(
            issuer
                .redeem(&code, "other", "https://client.example/cb", Some(VERIFIER))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_invalid_redirect_uri() {
        let issuer = CodeIssuer::new();
        let result = issuer.complete_authorization(grant("not a url")).await;
        assert!(matches!(result, Err(IssueError::InvalidRedirectUri(_))));
    }
}
