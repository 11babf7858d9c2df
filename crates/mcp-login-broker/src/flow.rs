//! Authorization flow controller.
//!
//! Orchestrates the three entry points of the broker:
//!
//! ```text
//! GET /authorize ──▶ CheckApproval ──▶ SkipToIdp ─────────────────────┐
//!                          │                                          ▼
//!                          └──▶ ShowConsent ──▶ POST /authorize ──▶ RedirectedToIdp
//!                                                                     │
//! GET /callback ◀─────────────────────────────────────────────────────┘
//!   ──▶ StateValidated ──▶ CodeExchanged ──▶ ProfileFetched
//!   ──▶ IdentityResolved ──▶ TokenIssued
//! ```
//!
//! Any failure is terminal for the request; nothing is retried.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::Config;
use crate::crypto::{Cookies, SetCookie};
use crate::error::{FlowError, FlowResult};
use crate::exchange::IdentityExchange;
use crate::idp::IdpClient;
use crate::issuer::{CompleteAuthorization, TokenIssuer};
use crate::models::{ClientInfo, PendingAuthorization, Props, ServerMetadata};
use crate::registry::ClientRegistry;
use crate::security::{ApprovalCache, SessionBinder, csrf};
use crate::store::{KvStore, StateStore};

/// Stages of a single authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Start,
    CheckApproval,
    SkipToIdp,
    ShowConsent,
    ConsentSubmitted,
    RedirectedToIdp,
    CallbackReceived,
    StateValidated,
    CodeExchanged,
    ProfileFetched,
    IdentityResolved,
    TokenIssued,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::CheckApproval => "check_approval",
            Self::SkipToIdp => "skip_to_idp",
            Self::ShowConsent => "show_consent",
            Self::ConsentSubmitted => "consent_submitted",
            Self::RedirectedToIdp => "redirected_to_idp",
            Self::CallbackReceived => "callback_received",
            Self::StateValidated => "state_validated",
            Self::CodeExchanged => "code_exchanged",
            Self::ProfileFetched => "profile_fetched",
            Self::IdentityResolved => "identity_resolved",
            Self::TokenIssued => "token_issued",
        };
        f.write_str(name)
    }
}

fn advance(stage: &mut FlowStage, next: FlowStage) {
    tracing::debug!(from = %stage, to = %next, "Authorization flow transition");
    *stage = next;
}

/// Query parameters of `GET /authorize`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
}

impl AuthorizeQuery {
    /// Validate the OAuth parameters and capture them as a pending request.
    pub fn into_pending(self) -> FlowResult<PendingAuthorization> {
        let scope = self
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let pending = PendingAuthorization {
            response_type: non_empty(self.response_type).unwrap_or_default(),
            client_id: non_empty(self.client_id).unwrap_or_default(),
            redirect_uri: non_empty(self.redirect_uri).unwrap_or_default(),
            scope,
            state: non_empty(self.state),
            code_challenge: non_empty(self.code_challenge),
            code_challenge_method: non_empty(self.code_challenge_method),
            resource: non_empty(self.resource),
        };

        validate_pending(&pending)?;
        Ok(pending)
    }
}

/// Check the OAuth parameters of a pending request.
///
/// Applied when the request arrives and again to the copy posted back by the
/// consent form.
pub fn validate_pending(pending: &PendingAuthorization) -> FlowResult<()> {
    if pending.client_id.is_empty() {
        return Err(FlowError::invalid_request("Missing client_id"));
    }
    if pending.redirect_uri.is_empty() {
        return Err(FlowError::invalid_request("Missing redirect_uri"));
    }
    if pending.response_type != "code" {
        return Err(FlowError::invalid_request("response_type must be 'code'"));
    }

    match (
        pending.code_challenge.as_deref(),
        pending.code_challenge_method.as_deref(),
    ) {
        (None, Some(_)) => Err(FlowError::invalid_request(
            "code_challenge_method given without code_challenge",
        )),
        (Some(_), Some(method)) if method != "S256" && method != "plain" => Err(
            FlowError::invalid_request("code_challenge_method must be 'S256' or 'plain'"),
        ),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Form body of `POST /authorize`.
#[derive(Debug, Default, Deserialize)]
pub struct ConsentForm {
    pub csrf_token: Option<String>,
    /// Pending request encoded by the consent page.
    pub state: Option<String>,
}

/// Query parameters of `GET /callback`.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Data needed to render the consent page.
#[derive(Debug, Clone)]
pub struct ConsentPage {
    pub client_id: String,
    pub client_name: String,
    pub client_uri: Option<String>,
    pub client_logo_uri: Option<String>,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub server: ServerMetadata,
    pub csrf_token: String,
    /// Opaque pending request, posted back as the `state` field.
    pub encoded_state: String,
}

/// Result of `GET /authorize`.
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// Client already approved: straight to the IdP.
    Redirect(FlowRedirect),
    /// Ask the user for consent.
    Consent {
        page: ConsentPage,
        csrf_cookie: SetCookie,
    },
}

/// A redirect with the cookies to set alongside it.
#[derive(Debug, Clone)]
pub struct FlowRedirect {
    pub location: String,
    pub cookies: Vec<SetCookie>,
}

/// A terminal failure, with the stage it happened after and any cookies
/// that must still be sent.
#[derive(Debug)]
pub struct FlowFailure {
    pub stage: FlowStage,
    pub error: FlowError,
    pub cookies: Vec<SetCookie>,
}

impl FlowFailure {
    #[must_use]
    pub fn new(stage: FlowStage, error: FlowError) -> Self {
        Self {
            stage,
            error,
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: SetCookie) -> Self {
        self.cookies.push(cookie);
        self
    }
}

/// The broker's authorization state machine.
pub struct AuthorizationFlow {
    config: Config,
    sessions: SessionBinder,
    approvals: ApprovalCache,
    states: StateStore,
    idp: IdpClient,
    registry: Arc<dyn ClientRegistry>,
    exchange: Arc<dyn IdentityExchange>,
    issuer: Arc<dyn TokenIssuer>,
}

impl AuthorizationFlow {
    /// Create the flow controller.
    ///
    /// # Errors
    ///
    /// Returns error if the IdP client cannot be built from `config`.
    pub fn new(
        config: Config,
        kv: Arc<dyn KvStore>,
        registry: Arc<dyn ClientRegistry>,
        exchange: Arc<dyn IdentityExchange>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            sessions: SessionBinder::new(config.state_ttl),
            approvals: ApprovalCache::new(&config.cookie_secret, config.approval_max_age),
            states: StateStore::new(kv),
            idp: IdpClient::new(&config)?,
            registry,
            exchange,
            issuer,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// `GET /authorize`: redirect approved clients to the IdP, otherwise
    /// prepare the consent page.
    ///
    /// Nothing is persisted for unapproved requests; the pending request
    /// round-trips through the consent form instead.
    pub async fn authorize(
        &self,
        query: AuthorizeQuery,
        cookies: &Cookies,
    ) -> Result<AuthorizeOutcome, FlowFailure> {
        let mut stage = FlowStage::Start;
        self.run_authorize(query, cookies, &mut stage)
            .await
            .map_err(|error| FlowFailure::new(stage, error))
    }

    async fn run_authorize(
        &self,
        query: AuthorizeQuery,
        cookies: &Cookies,
        stage: &mut FlowStage,
    ) -> FlowResult<AuthorizeOutcome> {
        let pending = query.into_pending()?;
        let client = self.validate_client(&pending).await?;

        advance(stage, FlowStage::CheckApproval);
        if self.approvals.is_approved(&pending.client_id, cookies) {
            advance(stage, FlowStage::SkipToIdp);
            tracing::info!(
                client_id = %pending.client_id,
                "Client previously approved, skipping consent"
            );
            let redirect = self.redirect_to_idp(&pending, Vec::new(), stage).await?;
            return Ok(AuthorizeOutcome::Redirect(redirect));
        }

        advance(stage, FlowStage::ShowConsent);
        let csrf = csrf::issue();
        let page = ConsentPage {
            client_name: client.display_name().to_string(),
            client_uri: client.client_uri,
            client_logo_uri: client.logo_uri,
            client_id: client.client_id,
            redirect_uri: pending.redirect_uri.clone(),
            scope: pending.scope.clone(),
            server: self.config.server.clone(),
            csrf_token: csrf.token,
            encoded_state: pending.to_form_value(),
        };

        Ok(AuthorizeOutcome::Consent {
            page,
            csrf_cookie: csrf.cookie,
        })
    }

    /// `POST /authorize`: accept the consent form and redirect to the IdP.
    pub async fn approve(
        &self,
        form: ConsentForm,
        cookies: &Cookies,
    ) -> Result<FlowRedirect, FlowFailure> {
        let mut stage = FlowStage::ShowConsent;
        self.run_approve(form, cookies, &mut stage)
            .await
            .map_err(|error| FlowFailure::new(stage, error))
    }

    async fn run_approve(
        &self,
        form: ConsentForm,
        cookies: &Cookies,
        stage: &mut FlowStage,
    ) -> FlowResult<FlowRedirect> {
        csrf::validate(form.csrf_token.as_deref(), cookies)?;
        advance(stage, FlowStage::ConsentSubmitted);

        let pending = form
            .state
            .as_deref()
            .and_then(PendingAuthorization::from_form_value)
            .ok_or_else(|| FlowError::invalid_request("Invalid or missing state"))?;
        validate_pending(&pending)?;
        self.validate_client(&pending).await?;

        let approval = self.approvals.approve(&pending.client_id, cookies);
        tracing::info!(client_id = %pending.client_id, "Client approved by user");

        self.redirect_to_idp(&pending, vec![approval, csrf::clear()], stage)
            .await
    }

    /// `GET /callback`: finish the login and issue the token.
    ///
    /// Every outcome, success or failure, clears the session-binding cookie.
    pub async fn callback(
        &self,
        query: CallbackQuery,
        cookies: &Cookies,
    ) -> Result<FlowRedirect, FlowFailure> {
        let mut stage = FlowStage::CallbackReceived;

        let Some(state_token) = non_empty(query.state.clone()) else {
            return Err(self.callback_rejected("Missing state"));
        };

        let check = self.sessions.verify(&state_token, cookies);
        let result = match check.result {
            Ok(()) => self.run_callback(&state_token, query, &mut stage).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(location) => Ok(FlowRedirect {
                location,
                cookies: vec![check.clear_cookie],
            }),
            Err(error) => {
                let failure = FlowFailure::new(stage, error);
                Err(failure.with_cookie(check.clear_cookie))
            }
        }
    }

    /// Failure for a callback request that never reached state validation.
    ///
    /// Still clears the session-binding cookie.
    #[must_use]
    pub fn callback_rejected(&self, message: &str) -> FlowFailure {
        FlowFailure::new(
            FlowStage::CallbackReceived,
            FlowError::invalid_request(message),
        )
        .with_cookie(self.sessions.clear())
    }

    async fn run_callback(
        &self,
        state_token: &str,
        query: CallbackQuery,
        stage: &mut FlowStage,
    ) -> FlowResult<String> {
        let pending = self.states.consume(state_token).await?;
        advance(stage, FlowStage::StateValidated);

        if let Some(error) = query.error {
            tracing::warn!(
                client_id = %pending.client_id,
                idp_error = %error,
                description = ?query.error_description,
                "Identity provider returned an error"
            );
            return Err(FlowError::invalid_request(
                "The identity provider did not complete the login. Please start again.",
            ));
        }

        let code = non_empty(query.code)
            .ok_or_else(|| FlowError::invalid_request("Missing authorization code"))?;

        let access_token = self
            .idp
            .exchange_code(
                &code,
                &self.config.channel_id,
                &self.config.channel_secret,
                &self.config.callback_url(),
            )
            .await?;
        advance(stage, FlowStage::CodeExchanged);

        let profile = self.idp.fetch_profile(&access_token).await?;
        advance(stage, FlowStage::ProfileFetched);

        let account_id = self.exchange.resolve(&profile).await?.ok_or_else(|| {
            tracing::info!(
                user_id = %profile.user_id,
                "No backend account linked to identity"
            );
            FlowError::AccountNotLinked
        })?;
        advance(stage, FlowStage::IdentityResolved);

        let props = Props {
            user_id: profile.user_id.clone(),
            account_id,
            display_name: profile.display_name.clone(),
        };
        let client_id = pending.client_id.clone();
        let grant = CompleteAuthorization {
            scope: pending.scope.clone(),
            request: pending,
            user_id: profile.user_id,
            metadata: serde_json::json!({ "label": profile.display_name }),
            props,
        };

        let location = self
            .issuer
            .complete_authorization(grant)
            .await
            .map_err(|e| FlowError::unexpected(e.to_string()))?;
        advance(stage, FlowStage::TokenIssued);

        tracing::info!(client_id = %client_id, "Authorization completed");
        Ok(location)
    }

    async fn validate_client(&self, pending: &PendingAuthorization) -> FlowResult<ClientInfo> {
        let client = self
            .registry
            .lookup(&pending.client_id)
            .await
            .ok_or_else(|| FlowError::invalid_request("Unknown client_id"))?;

        let registered = &client.redirect_uris;
        if !registered.is_empty() && !registered.iter().any(|u| *u == pending.redirect_uri) {
            return Err(FlowError::invalid_request(
                "redirect_uri not registered for this client",
            ));
        }

        Ok(client)
    }

    async fn redirect_to_idp(
        &self,
        pending: &PendingAuthorization,
        mut cookies: Vec<SetCookie>,
        stage: &mut FlowStage,
    ) -> FlowResult<FlowRedirect> {
        let state_token = self.states.save(pending, self.config.state_ttl).await?;
        cookies.push(self.sessions.bind(&state_token));

        let location = self.idp.build_authorize_url(
            &self.config.channel_id,
            &self.config.callback_url(),
            &state_token,
        );
        advance(stage, FlowStage::RedirectedToIdp);

        Ok(FlowRedirect { location, cookies })
    }
}

impl fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> AuthorizeQuery {
        AuthorizeQuery {
            response_type: Some("code".into()),
            client_id: Some("abc".into()),
            redirect_uri: Some("https://client.example/cb".into()),
            scope: Some("mcp  profile".into()),
            state: Some("s".into()),
            code_challenge: Some("challenge".into()),
            code_challenge_method: Some("S256".into()),
            resource: None,
        }
    }

    #[test]
    fn test_into_pending_valid() {
        let pending = query().into_pending().unwrap();
        assert_eq!(pending.client_id, "abc");
        assert_eq!(pending.response_type, "code");
        assert_eq!(pending.scope, vec!["mcp", "profile"]);
        assert_eq!(pending.state.as_deref(), Some("s"));
    }

    #[test]
    fn test_into_pending_requires_client_id() {
        let mut q = query();
        q.client_id = Some(String::new());
        let err = q.into_pending().unwrap_err();
        assert!(matches!(err, FlowError::ClientRequestInvalid(_)));
    }

    #[test]
    fn test_into_pending_requires_code_response_type() {
        let mut q = query();
        q.response_type = Some("token".into());
        assert!(q.into_pending().is_err());

        let mut q = query();
        q.response_type = None;
        assert!(q.into_pending().is_err());
    }

    #[test]
    fn test_into_pending_rejects_unknown_challenge_method() {
        let mut q = query();
        q.code_challenge_method = Some("S512".into());
        assert!(q.into_pending().is_err());

        let mut q = query();
        q.code_challenge = None;
        assert!(q.into_pending().is_err());
    }

    #[test]
    fn test_validate_pending_rejects_edited_form_copy() {
        let pending = query().into_pending().unwrap();

        let mut edited = pending.clone();
        edited.response_type = "token".into();
        assert!(validate_pending(&edited).is_err());

        let mut edited = pending.clone();
        edited.code_challenge_method = Some("S999".into());
        assert!(validate_pending(&edited).is_err());

        let mut edited = pending;
        edited.redirect_uri = String::new();
        assert!(validate_pending(&edited).is_err());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(FlowStage::RedirectedToIdp.to_string(), "redirected_to_idp");
    }
}
