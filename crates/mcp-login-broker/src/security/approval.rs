//! Signed client-side record of approved OAuth clients.
//!
//! Cookie value: `base64url(json) "." base64url(hmac_sha256(json))`.
//! Rotating the secret invalidates every outstanding record.

use std::time::Duration;

use crate::crypto::{self, Cookies, SameSite, SetCookie};

/// Cookie carrying the signed approved-clients list.
pub const APPROVAL_COOKIE: &str = "__Host-approved";

/// Most recent approvals kept in the cookie; older ones are dropped so the
/// cookie stays well under the browser size limit.
pub const MAX_APPROVED_CLIENTS: usize = 32;

/// Reads and extends the approved-clients cookie.
#[derive(Clone)]
pub struct ApprovalCache {
    secret: Vec<u8>,
    max_age: Duration,
}

impl ApprovalCache {
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, max_age: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            max_age,
        }
    }

    /// Client ids in the cookie, or an empty list if it is absent or untrusted.
    #[must_use]
    pub fn approved_clients(&self, cookies: &Cookies) -> Vec<String> {
        cookies
            .get(APPROVAL_COOKIE)
            .and_then(|value| self.decode(value))
            .unwrap_or_default()
    }

    /// Whether this user agent already approved `client_id`.
    #[must_use]
    pub fn is_approved(&self, client_id: &str, cookies: &Cookies) -> bool {
        self.approved_clients(cookies)
            .iter()
            .any(|id| id == client_id)
    }

    /// Add `client_id` to the record and return the re-signed cookie.
    ///
    /// Keeps at most [`MAX_APPROVED_CLIENTS`] ids, evicting the oldest.
    #[must_use]
    pub fn approve(&self, client_id: &str, cookies: &Cookies) -> SetCookie {
        let mut clients = self.approved_clients(cookies);
        if !clients.iter().any(|id| id == client_id) {
            clients.push(client_id.to_string());
        }
        let excess = clients.len().saturating_sub(MAX_APPROVED_CLIENTS);
        clients.drain(..excess);

        SetCookie::new(APPROVAL_COOKIE, self.encode(&clients), SameSite::Lax)
            .with_max_age(self.max_age.as_secs())
    }

    fn encode(&self, clients: &[String]) -> String {
        let json = serde_json::to_vec(clients).unwrap_or_default();
        let signature = crypto::hmac_sign(&self.secret, &json);
        format!(
            "{}.{}",
            crypto::b64_encode(&json),
            crypto::b64_encode(signature)
        )
    }

    fn decode(&self, value: &str) -> Option<Vec<String>> {
        let (data, signature) = value.split_once('.')?;
        let json = crypto::b64_decode(data)?;
        let signature = crypto::b64_decode(signature)?;

        if !crypto::hmac_verify(&self.secret, &json, &signature) {
            tracing::debug!("Ignoring approved-clients cookie with invalid signature");
            return None;
        }

        serde_json::from_slice(&json).ok()
    }
}

impl std::fmt::Debug for ApprovalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalCache")
            .field("max_age", &self.max_age)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(secret: &str) -> ApprovalCache {
        ApprovalCache::new(secret, Duration::from_secs(365 * 24 * 3600))
    }

    fn cookies_for(cookie: &SetCookie) -> Cookies {
        Cookies::from_pairs([(cookie.name(), cookie.value())])
    }

    #[test]
    fn test_approve_then_is_approved() {
        let cache = cache("secret");
        let cookie = cache.approve("abc", &Cookies::default());
        assert!(cache.is_approved("abc", &cookies_for(&cookie)));
        assert!(!cache.is_approved("xyz", &cookies_for(&cookie)));
        assert_eq!(cookie.same_site(), SameSite::Lax);
        assert_eq!(cookie.max_age(), Some(31_536_000));
    }

    #[test]
    fn test_approve_appends_and_dedupes() {
        let cache = cache("secret");
        let first = cache.approve("abc", &Cookies::default());
        let second = cache.approve("xyz", &cookies_for(&first));
        let third = cache.approve("abc", &cookies_for(&second));

        assert_eq!(
            cache.approved_clients(&cookies_for(&third)),
            vec!["abc", "xyz"]
        );
        assert_eq!(second.value(), third.value());
    }

    #[test]
    fn test_approve_keeps_most_recent_clients() {
        let cache = cache("secret");
        let mut cookie = cache.approve("client-0", &Cookies::default());
        for i in 1..MAX_APPROVED_CLIENTS + 8 {
            // Registered client ids are UUIDs.
            let id = format!("client-{i}-{}", uuid::Uuid::new_v4());
            cookie = cache.approve(&id, &cookies_for(&cookie));
        }

        let clients = cache.approved_clients(&cookies_for(&cookie));
        assert_eq!(clients.len(), MAX_APPROVED_CLIENTS);
        assert!(!clients.iter().any(|id| id == "client-0"));
        let newest = format!("client-{}-", MAX_APPROVED_CLIENTS + 7);
        assert!(clients.last().unwrap().starts_with(&newest));
        assert!(cookie.to_string().len() < 4096);
    }

    #[test]
    fn test_rotated_secret_invalidates() {
        let cookie = cache("old").approve("abc", &Cookies::default());
        assert!(!cache("new").is_approved("abc", &cookies_for(&cookie)));
    }

    #[test]
    fn test_unsigned_cookie_is_empty() {
        let json = crypto::b64_encode(br#"["abc"]"#);
        let cookies = Cookies::from_pairs([(APPROVAL_COOKIE, json.as_str())]);
        assert!(!cache("secret").is_approved("abc", &cookies));
    }

    #[test]
    fn test_garbage_cookie_is_empty() {
        for value in ["", ".", "a.b", "!!!.???", "eyJ9.eyJ9"] {
            let cookies = Cookies::from_pairs([(APPROVAL_COOKIE, value)]);
            assert!(cache("secret").approved_clients(&cookies).is_empty());
        }
    }

    #[test]
    fn test_signed_non_list_is_empty() {
        let cache = cache("secret");
        let json = br#"{"not":"a list"}"#;
        let value = format!(
            "{}.{}",
            crypto::b64_encode(json),
            crypto::b64_encode(crypto::hmac_sign(b"secret", json))
        );
        let cookies = Cookies::from_pairs([(APPROVAL_COOKIE, value.as_str())]);
        assert!(cache.approved_clients(&cookies).is_empty());
    }

    #[test]
    fn test_approve_over_tampered_cookie_starts_fresh() {
        let cache = cache("secret");
        let cookies = Cookies::from_pairs([(APPROVAL_COOKIE, "tampered.value")]);
        let cookie = cache.approve("abc", &cookies);
        assert_eq!(cache.approved_clients(&cookies_for(&cookie)), vec!["abc"]);
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", cache("super-secret-key"));
        assert!(!debug.contains("super-secret-key"));
    }
}
