//! Error types for token acquisition and cache persistence.
//!
//! Failures are explicit values rather than log lines: callers can tell
//! "no cached account" from "refresh rejected" from "cache unreadable"
//! without parsing diagnostics.

use std::path::PathBuf;

/// Errors raised by a [`crate::sealer::Sealer`] backend.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("sealed blob is malformed")]
    Malformed,
    #[error("cipher initialization failed")]
    Cipher,
    #[error("encryption failed")]
    Seal,
    #[error("decryption failed: sealed under a different user identity, or corrupted")]
    Unseal,
    #[error("keyring access failed: {0}")]
    Keyring(String),
    #[error("unknown sealer backend {0:?}, expected \"user\" or \"keyring\"")]
    UnknownBackend(String),
}

/// Errors raised by the cache store around the before/after-access hooks.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache could not be unsealed: {0}")]
    Unseal(#[source] SealError),
    #[error("cache could not be sealed: {0}")]
    Seal(#[source] SealError),
    #[error("cache blob could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("cache could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors raised by the silent and interactive acquisition flows.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("no cached grant matches the requested scopes")]
    NoMatchingGrant,
    #[error("cached grant has no refresh token")]
    NoRefreshToken,
    #[error("authority URL must use https")]
    InsecureAuthority,
    #[error("invalid authority URL: {0}")]
    InvalidAuthority(#[from] url::ParseError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    UnexpectedResponse {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("provider rejected the request: {error}: {description}")]
    Provider { error: String, description: String },
    #[error("user declined the authorization request")]
    Declined,
    #[error("redirect state mismatch, possible CSRF")]
    StateMismatch,
    #[error("redirect response missing the {0} parameter")]
    MissingParameter(&'static str),
    #[error("login timed out after {0} seconds")]
    Timeout(u64),
    #[error("failed to bind loopback listener: {0}")]
    Listener(#[source] std::io::Error),
    #[error("failed to decode token response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("login flow aborted before a code was delivered")]
    Aborted,
}

/// Terminal outcome of a full acquisition run.
///
/// Silent failures never appear here: they route to the interactive
/// fallback. What remains is interactive failure (no further fallback)
/// and cache/seal failure (fatal for the run).
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("interactive login failed: {0}")]
    Interactive(#[source] FlowError),
    #[error("token cache access failed: {0}")]
    Cache(#[from] CacheError),
}
