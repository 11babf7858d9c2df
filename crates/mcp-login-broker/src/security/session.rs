//! Session binding between a state token and the user agent.
//!
//! The cookie holds `SHA-256(state)`, so a state token injected into another
//! browser (login CSRF, session fixation) fails at the callback.
//! `SameSite=Lax` lets the cookie survive the top-level redirect from the IdP.

use std::time::Duration;

use crate::crypto::{self, Cookies, SameSite, SetCookie};
use crate::error::SessionError;

/// Cookie carrying the hashed state token.
pub const SESSION_COOKIE: &str = "__Host-session";

/// Issues and verifies session-binding cookies.
#[derive(Debug, Clone)]
pub struct SessionBinder {
    ttl: Duration,
}

/// Result of a binding check, plus the directive clearing the cookie.
///
/// The clear directive must be sent whatever the outcome, so a binding
/// cookie never outlives one flow attempt.
#[derive(Debug)]
#[must_use]
pub struct BindingCheck {
    pub result: Result<(), SessionError>,
    pub clear_cookie: SetCookie,
}

impl SessionBinder {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Cookie binding `state_token` to this user agent.
    #[must_use]
    pub fn bind(&self, state_token: &str) -> SetCookie {
        SetCookie::new(
            SESSION_COOKIE,
            crypto::sha256_hex(state_token),
            SameSite::Lax,
        )
        .with_max_age(self.ttl.as_secs())
    }

    /// Check that the request's binding cookie matches `state_token`.
    pub fn verify(&self, state_token: &str, cookies: &Cookies) -> BindingCheck {
        let result = match cookies.get(SESSION_COOKIE) {
            None => Err(SessionError::CookieMissing),
            Some(bound) if crypto::constant_time_eq(bound, &crypto::sha256_hex(state_token)) => {
                Ok(())
            }
            Some(_) => Err(SessionError::Mismatch),
        };

        BindingCheck {
            result,
            clear_cookie: self.clear(),
        }
    }

    /// Directive deleting the binding cookie.
    #[must_use]
    pub fn clear(&self) -> SetCookie {
        SetCookie::clear(SESSION_COOKIE, SameSite::Lax)
    }
}
