//! Cookie parsing and `Set-Cookie` serialization.
//!
//! All broker cookies use the `__Host-` prefix, so they are always emitted
//! with `Secure` and `Path=/` and without a `Domain` attribute.

use std::collections::HashMap;
use std::fmt;

use axum::http::HeaderMap;
use axum_extra::headers::{Cookie, HeaderMapExt};

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("Strict"),
            Self::Lax => f.write_str("Lax"),
        }
    }
}

/// A `Set-Cookie` directive, rendered with `HttpOnly; Secure; Path=/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: &'static str,
    value: String,
    same_site: SameSite,
    max_age: Option<u64>,
}

impl SetCookie {
    /// Session cookie (no `Max-Age`).
    #[must_use]
    pub fn new(name: &'static str, value: impl Into<String>, same_site: SameSite) -> Self {
        Self {
            name,
            value: value.into(),
            same_site,
            max_age: None,
        }
    }

    /// Set `Max-Age` in seconds.
    #[must_use]
    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Directive that deletes the named cookie.
    #[must_use]
    pub fn clear(name: &'static str, same_site: SameSite) -> Self {
        Self::new(name, "", same_site).with_max_age(0)
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub const fn same_site(&self) -> SameSite {
        self.same_site
    }

    #[must_use]
    pub const fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    /// True if this directive deletes the cookie.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.max_age == Some(0) && self.value.is_empty()
    }

    /// `name=value` pair as a browser would send it back in a `Cookie` header.
    #[must_use]
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; HttpOnly; Secure; Path=/; SameSite={}",
            self.name, self.value, self.same_site
        )?;
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        Ok(())
    }
}

/// Cookies sent by the user agent.
#[derive(Debug, Clone, Default)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    /// Parse every `Cookie` header in the request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(cookie) = headers.typed_get::<Cookie>() else {
            return Self::default();
        };
        Self::from_pairs(cookie.iter())
    }

    /// Build from explicit name/value pairs.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Non-empty value of the named cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}
