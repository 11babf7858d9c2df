//! Data types shared across the authorization flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::config::defaults;

/// The client's original OAuth authorization request.
///
/// Captured at `/authorize` and replayed at `/callback`, since the round trip
/// through the IdP carries nothing but the state token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Vec<String>,
    /// Opaque state chosen by the OAuth client, echoed back on completion.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// RFC 8707 resource indicator.
    #[serde(default)]
    pub resource: Option<String>,
}

impl PendingAuthorization {
    /// Encode for the hidden `state` field of the consent form.
    #[must_use]
    pub fn to_form_value(&self) -> String {
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode the hidden `state` field posted back from the consent form.
    ///
    /// Returns `None` for anything that is not a well-formed encoded request.
    #[must_use]
    pub fn from_form_value(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Identity payload embedded into the issued token.
///
/// Handed to every downstream tool invocation as the authenticated context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Props {
    /// User id at the identity provider.
    pub user_id: String,
    /// Backend account id.
    pub account_id: String,
    pub display_name: String,
}

/// Profile returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpProfile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// A registered OAuth client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_uri: Option<String>,
    #[serde(default)]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl ClientInfo {
    /// Name to show on the consent page.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.client_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.client_id)
    }
}

/// Display metadata about this server, shown on the consent page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

impl Default for ServerMetadata {
    fn default() -> Self {
        Self {
            name: defaults::SERVER_NAME.to_string(),
            description: None,
            logo_url: None,
        }
    }
}
