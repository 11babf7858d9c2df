//! Identity exchange: maps an IdP profile to a backend account.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ExchangeError;
use crate::models::IdpProfile;

/// Resolves an IdP profile to an application account id.
#[async_trait::async_trait]
pub trait IdentityExchange: Send + Sync {
    /// `Ok(None)` means the backend has no account linked to this identity.
    async fn resolve(&self, profile: &IdpProfile) -> Result<Option<String>, ExchangeError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest<'a> {
    user_id: &'a str,
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    account_id: Option<String>,
}

/// [`IdentityExchange`] backed by an HTTP endpoint.
///
/// POSTs the profile as JSON. `200 {"accountId": ...}` resolves the account;
/// `404`, or a `200` without an account id, means no linked account.
#[derive(Clone)]
pub struct HttpIdentityExchange {
    http: Client,
    url: String,
}

impl HttpIdentityExchange {
    /// Create a new exchange client.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            url: config.identity_exchange_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl IdentityExchange for HttpIdentityExchange {
    async fn resolve(&self, profile: &IdpProfile) -> Result<Option<String>, ExchangeError> {
        let request = ExchangeRequest {
            user_id: &profile.user_id,
            display_name: &profile.display_name,
            picture_url: profile.picture_url.as_deref(),
        };

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ExchangeResponse =
            serde_json::from_str(&body).map_err(|_| ExchangeError::Backend {
                status: status.as_u16(),
                body,
            })?;

        Ok(parsed.account_id.filter(|id| !id.is_empty()))
    }
}

impl std::fmt::Debug for HttpIdentityExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityExchange")
            .field("url", &self.url)
            .finish()
    }
}
