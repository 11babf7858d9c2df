//! Configuration for the MCP login broker.

use std::time::Duration;

use anyhow::Context;

use crate::models::{ClientInfo, ServerMetadata};

/// Identity provider endpoints and request settings.
pub mod idp {
    use std::time::Duration;

    /// Authorization endpoint end users are redirected to.
    pub const AUTHORIZE_URL: &str = "https://access.line.me/oauth2/v2.1/authorize";

    /// Token endpoint for the authorization-code exchange.
    pub const TOKEN_URL: &str = "https://api.line.me/oauth2/v2.1/token";

    /// Profile endpoint queried with the issued access token.
    pub const PROFILE_URL: &str = "https://api.line.me/v2/profile";

    /// Minimal scope needed to read the user id and display name.
    pub const SCOPE: &str = "profile";

    /// Request timeout for IdP and identity exchange calls.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Broker defaults.
pub mod defaults {
    use std::time::Duration;

    /// Lifetime of a pending authorization and its session-binding cookie.
    pub const STATE_TTL: Duration = Duration::from_secs(600);

    /// Lifetime of the approved-clients cookie (one year).
    pub const APPROVAL_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 3600);

    /// Path the IdP redirects back to.
    pub const CALLBACK_PATH: &str = "/callback";

    /// Server name shown on the consent page.
    pub const SERVER_NAME: &str = "MCP Login Broker";

    /// Minimum length in bytes of the approval cookie signing key.
    pub const MIN_COOKIE_SECRET_LEN: usize = 32;
}

/// Broker configuration.
#[derive(Clone)]
pub struct Config {
    /// Public base URL of the broker (used to build the IdP callback URL).
    pub base_url: String,

    /// IdP channel (client) id.
    pub channel_id: String,

    /// IdP channel secret.
    pub channel_secret: String,

    /// IdP authorization endpoint.
    pub idp_authorize_url: String,

    /// IdP token endpoint.
    pub idp_token_url: String,

    /// IdP profile endpoint.
    pub idp_profile_url: String,

    /// Backend endpoint mapping an IdP profile to an account id.
    pub identity_exchange_url: String,

    /// Key used to sign the approved-clients cookie.
    pub cookie_secret: String,

    /// Pending authorization lifetime.
    pub state_ttl: Duration,

    /// Approved-clients cookie lifetime.
    pub approval_max_age: Duration,

    /// Outbound request timeout.
    pub request_timeout: Duration,

    /// Outbound connection timeout.
    pub connect_timeout: Duration,

    /// Display metadata for the consent page.
    pub server: ServerMetadata,

    /// OAuth clients preloaded into the in-memory registry.
    pub clients: Vec<ClientInfo>,
}

impl Config {
    /// Create a configuration with default IdP endpoints and lifetimes.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        channel_id: impl Into<String>,
        channel_secret: impl Into<String>,
        cookie_secret: impl Into<String>,
        identity_exchange_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            channel_id: channel_id.into(),
            channel_secret: channel_secret.into(),
            idp_authorize_url: idp::AUTHORIZE_URL.to_string(),
            idp_token_url: idp::TOKEN_URL.to_string(),
            idp_profile_url: idp::PROFILE_URL.to_string(),
            identity_exchange_url: identity_exchange_url.into(),
            cookie_secret: cookie_secret.into(),
            state_ttl: defaults::STATE_TTL,
            approval_max_age: defaults::APPROVAL_MAX_AGE,
            request_timeout: idp::REQUEST_TIMEOUT,
            connect_timeout: idp::CONNECT_TIMEOUT,
            server: ServerMetadata::default(),
            clients: Vec::new(),
        }
    }

    /// Create a configuration for testing, with every outbound endpoint
    /// pointing at `mock_url`.
    #[must_use]
    pub fn for_testing(mock_url: &str) -> Self {
        let mock_url = mock_url.trim_end_matches('/');
        Self {
            base_url: "https://broker.test".to_string(),
            channel_id: "test-channel".to_string(),
            channel_secret: "test-channel-secret".to_string(),
            idp_authorize_url: format!("{mock_url}/oauth2/v2.1/authorize"),
            idp_token_url: format!("{mock_url}/oauth2/v2.1/token"),
            idp_profile_url: format!("{mock_url}/v2/profile"),
            identity_exchange_url: format!("{mock_url}/api/identity/exchange"),
            cookie_secret: "test-cookie-secret-0123456789abcdef".to_string(),
            state_ttl: defaults::STATE_TTL,
            approval_max_age: defaults::APPROVAL_MAX_AGE,
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            server: ServerMetadata::default(),
            clients: Vec::new(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or empty, or a value
    /// is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new(
            required("BROKER_BASE_URL")?,
            required("IDP_CHANNEL_ID")?,
            required("IDP_CHANNEL_SECRET")?,
            required("COOKIE_SECRET")?,
            required("IDENTITY_EXCHANGE_URL")?,
        );

        if let Ok(url) = std::env::var("IDP_AUTHORIZE_URL") {
            config.idp_authorize_url = url;
        }
        if let Ok(url) = std::env::var("IDP_TOKEN_URL") {
            config.idp_token_url = url;
        }
        if let Ok(url) = std::env::var("IDP_PROFILE_URL") {
            config.idp_profile_url = url;
        }
        if let Ok(ttl) = std::env::var("STATE_TTL_SECONDS") {
            let secs: u64 = ttl.parse().context("STATE_TTL_SECONDS must be an integer")?;
            config.state_ttl = Duration::from_secs(secs);
        }

        if let Ok(name) = std::env::var("SERVER_NAME") {
            config.server.name = name;
        }
        config.server.description = std::env::var("SERVER_DESCRIPTION").ok();
        config.server.logo_url = std::env::var("SERVER_LOGO_URL").ok();

        if let Ok(clients) = std::env::var("BROKER_CLIENTS") {
            config.clients = serde_json::from_str(&clients)
                .context("BROKER_CLIENTS must be a JSON array of client records")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that credentials are usable.
    ///
    /// # Errors
    ///
    /// Returns error if the channel credentials are empty or the cookie
    /// secret is shorter than [`defaults::MIN_COOKIE_SECRET_LEN`] bytes.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.channel_id.trim().is_empty(), "IDP_CHANNEL_ID must not be empty");
        anyhow::ensure!(
            !self.channel_secret.trim().is_empty(),
            "IDP_CHANNEL_SECRET must not be empty"
        );
        anyhow::ensure!(
            self.cookie_secret.len() >= defaults::MIN_COOKIE_SECRET_LEN,
            "COOKIE_SECRET must be at least {} bytes",
            defaults::MIN_COOKIE_SECRET_LEN
        );
        Ok(())
    }

    /// URL the IdP redirects back to after login.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url, defaults::CALLBACK_PATH)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    non_blank(name, std::env::var(name).ok())
}

fn non_blank(name: &str, value: Option<String>) -> anyhow::Result<String> {
    let value = value.with_context(|| format!("{name} must be set"))?;
    anyhow::ensure!(!value.trim().is_empty(), "{name} must not be empty");
    Ok(value)
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("channel_id", &self.channel_id)
            .field("idp_authorize_url", &self.idp_authorize_url)
            .field("idp_token_url", &self.idp_token_url)
            .field("idp_profile_url", &self.idp_profile_url)
            .field("identity_exchange_url", &self.identity_exchange_url)
            .field("state_ttl", &self.state_ttl)
            .field("clients", &self.clients.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url_strips_trailing_slash() {
        let config = Config::new("https://broker.example/", "id", "secret", "key", "http://x");
        assert_eq!(config.callback_url(), "https://broker.example/callback");
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("https://b", "id", "secret", "key", "http://x");
        assert_eq!(config.state_ttl, Duration::from_secs(600));
        assert_eq!(config.idp_authorize_url, idp::AUTHORIZE_URL);
        assert!(config.clients.is_empty());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = Config::new(
            "https://b",
            "id",
            "channel-secret-xyz",
            "cookie-key-xyz",
            "http://x",
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("channel-secret-xyz"));
        assert!(!debug.contains("cookie-key-xyz"));
        assert!(debug.contains("channel_id"));
    }

    #[test]
    fn test_for_testing_points_at_mock() {
        let config = Config::for_testing("http://127.0.0.1:9999/");
        assert_eq!(
            config.idp_token_url,
            "http://127.0.0.1:9999/oauth2/v2.1/token"
        );
        assert_eq!(
            config.identity_exchange_url,
            "http://127.0.0.1:9999/api/identity/exchange"
        );
    }

    #[test]
    fn test_validate_accepts_testing_config() {
        let config = Config::for_testing("http://127.0.0.1:9999");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_cookie_secret() {
        let config = Config::new("https://b", "id", "secret", "", "http://x");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("COOKIE_SECRET"));
    }

    #[test]
    fn test_validate_rejects_short_cookie_secret() {
        let short = "a".repeat(defaults::MIN_COOKIE_SECRET_LEN - 1);
        let config = Config::new("https://b", "id", "secret", short, "http://x");
        assert!(config.validate().is_err());

        let exact = "a".repeat(defaults::MIN_COOKIE_SECRET_LEN);
        let config = Config::new("https://b", "id", "secret", exact, "http://x");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_channel_credentials() {
        let secret = "k".repeat(defaults::MIN_COOKIE_SECRET_LEN);

        let config = Config::new("https://b", "", "secret", secret.clone(), "http://x");
        assert!(config.validate().is_err());

        let config = Config::new("https://b", "id", "  ", secret, "http://x");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_required_values_must_be_non_blank() {
        let err = non_blank("COOKIE_SECRET", Some(String::new())).unwrap_err();
        assert_eq!(err.to_string(), "COOKIE_SECRET must not be empty");

        let err = non_blank("COOKIE_SECRET", None).unwrap_err();
        assert_eq!(err.to_string(), "COOKIE_SECRET must be set");

        assert_eq!(non_blank("X", Some("v".into())).unwrap(), "v");
    }
}
