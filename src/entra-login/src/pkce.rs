//! PKCE (RFC 7636) verifier/challenge generation.
//!
//! Only the S256 challenge method is implemented; the Plain method
//! defeats the purpose of PKCE and is rejected by Entra anyway.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Challenge method sent in the authorize request. Always S256.
pub const CHALLENGE_METHOD: &str = "S256";

/// A PKCE verifier/challenge pair for one authorization round-trip.
#[derive(Debug, Clone)]
pub struct PkceCodes {
    /// The code verifier, kept client-side until the code exchange.
    pub verifier: String,
    /// The S256 challenge, sent with the authorize request.
    pub challenge: String,
}

impl PkceCodes {
    /// Generate a fresh pair: 32 random bytes base64url-encoded as the
    /// verifier (43 chars, within the RFC's 43-128 range), challenge is
    /// `BASE64URL(SHA256(verifier))`.
    pub fn generate() -> Self {
        let verifier = random_urlsafe();
        let challenge = s256_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// 32 random bytes, base64url without padding. Also used for the OAuth
/// `state` parameter.
pub(crate) fn random_urlsafe() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

fn s256_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
