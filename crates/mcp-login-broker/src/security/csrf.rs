//! Double-submit CSRF protection for the consent form.
//!
//! The token is sent once as a `SameSite=Strict` cookie and once as a hidden
//! form field. Nothing is stored server-side.

use crate::crypto::{self, Cookies, SameSite, SetCookie};
use crate::error::CsrfError;

/// Cookie carrying the CSRF token.
pub const CSRF_COOKIE: &str = "__Host-csrf";

/// Form field carrying the CSRF token.
pub const CSRF_FIELD: &str = "csrf_token";

/// A freshly issued CSRF token and the cookie that carries it.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub token: String,
    pub cookie: SetCookie,
}

/// Issue a new CSRF token.
#[must_use]
pub fn issue() -> CsrfToken {
    let token = crypto::random_token();
    let cookie = SetCookie::new(CSRF_COOKIE, token.clone(), SameSite::Strict);
    CsrfToken { token, cookie }
}

/// Check the submitted form token against the CSRF cookie.
pub fn validate(submitted: Option<&str>, cookies: &Cookies) -> Result<(), CsrfError> {
    let submitted = submitted
        .filter(|t| !t.is_empty())
        .ok_or(CsrfError::Missing)?;
    let expected = cookies.get(CSRF_COOKIE).ok_or(CsrfError::Missing)?;

    if crypto::constant_time_eq(submitted, expected) {
        Ok(())
    } else {
        Err(CsrfError::Mismatch)
    }
}

/// Directive deleting the CSRF cookie once the form has been accepted.
#[must_use]
pub fn clear() -> SetCookie {
    SetCookie::clear(CSRF_COOKIE, SameSite::Strict)
}
