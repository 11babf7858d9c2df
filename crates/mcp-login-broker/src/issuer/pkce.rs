//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Implements the S256 and plain methods of RFC 7636.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::crypto;

/// Verify a PKCE S256 code challenge.
///
/// Computes `BASE64URL(SHA256(code_verifier))` and compares to the stored challenge.
#[must_use]
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    let hash = Sha256::digest(code_verifier.as_bytes());
    let computed = URL_SAFE_NO_PAD.encode(hash);
    crypto::constant_time_eq(&computed, code_challenge)
}

/// Verify a verifier against a challenge using `method` (`S256` or `plain`).
///
/// Unknown methods never verify.
#[must_use]
pub fn verify(method: Option<&str>, code_verifier: &str, code_challenge: &str) -> bool {
    match method.unwrap_or("plain") {
        "S256" => verify_s256(code_verifier, code_challenge),
        "plain" => crypto::constant_time_eq(code_verifier, code_challenge),
        _ => false,
    }
}
