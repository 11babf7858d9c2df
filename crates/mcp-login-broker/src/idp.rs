//! Identity provider client.
//!
//! Builds the authorize URL and performs the two server-side calls of the
//! login: authorization-code exchange and profile fetch. Calls are never
//! retried, since an authorization code is single-use.

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::{self, Config};
use crate::error::IdpError;
use crate::models::IdpProfile;

/// Identity provider API client.
#[derive(Clone)]
pub struct IdpClient {
    http: Client,
    authorize_url: Url,
    token_url: String,
    profile_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

impl IdpClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the authorize URL is invalid or HTTP client
    /// initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            authorize_url: Url::parse(&config.idp_authorize_url)?,
            token_url: config.idp_token_url.clone(),
            profile_url: config.idp_profile_url.clone(),
        })
    }

    /// URL sending the end user to the IdP login page.
    #[must_use]
    pub fn build_authorize_url(&self, channel_id: &str, redirect_uri: &str, state: &str) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", channel_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state)
            .append_pair("scope", config::idp::SCOPE);
        url.into()
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        channel_id: &str,
        channel_secret: &str,
        redirect_uri: &str,
    ) -> Result<String, IdpError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", channel_id),
            ("client_secret", channel_secret),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(IdpError::ExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(|t| t.access_token)
            .filter(|t| !t.is_empty())
            .ok_or(IdpError::ExchangeFailed {
                status: status.as_u16(),
                body,
            })
    }

    /// Fetch the end user's profile.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<IdpProfile, IdpError> {
        let response = self
            .http
            .get(&self.profile_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(IdpError::ProfileFailed {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|_| IdpError::ProfileFailed {
            status: status.as_u16(),
            body,
        })
    }
}

impl std::fmt::Debug for IdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdpClient")
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url)
            .finish()
    }
}
