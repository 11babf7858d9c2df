//! Cryptographic building blocks: random tokens, hashing, HMAC signing.

pub mod cookie;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub use cookie::{Cookies, SameSite, SetCookie};

type HmacSha256 = Hmac<Sha256>;

/// Generate a random token using two UUIDs (244 random bits).
#[must_use]
pub fn random_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Hex-encoded SHA-256 of `input`.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// HMAC-SHA256 of `data` under `secret`.
#[must_use]
pub fn hmac_sign(secret: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(secret);
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Verify an HMAC-SHA256 signature in constant time.
#[must_use]
pub fn hmac_verify(secret: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let mut mac = new_mac(secret);
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

fn new_mac(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
}

/// Compare two strings in constant time.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Unpadded base64url encoding.
#[must_use]
pub fn b64_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Unpadded base64url decoding.
#[must_use]
pub fn b64_decode(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_shape() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hmac_sign_verify() {
        let sig = hmac_sign(b"key", b"payload");
        assert_eq!(sig.len(), 32);
        assert!(hmac_verify(b"key", b"payload", &sig));
        assert!(!hmac_verify(b"other-key", b"payload", &sig));
        assert!(!hmac_verify(b"key", b"payload2", &sig));
    }

    #[test]
    fn test_hmac_empty_key() {
        let sig = hmac_sign(b"", b"payload");
        assert!(hmac_verify(b"", b"payload", &sig));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }
}
