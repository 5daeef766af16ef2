//! Entra ID token acquisition with an encrypted on-disk token cache.
//!
//! Acquisition policy:
//! - Silent first: a cached access token, or a refresh-token redemption.
//! - Interactive fallback: authorization code + PKCE through the system
//!   browser and a loopback redirect listener.
//!
//! The token cache is sealed at rest: AES-256-GCM under a key bound to
//! the invoking user (or held in the OS keychain), so the cache file is
//! useless to other accounts and other machines.

// Core modules
pub mod constants;
pub mod error;
pub mod types;
mod utils;

// Cache persistence
mod cache;
mod sealer;
mod store;

// Acquisition
mod acquire;
mod client;
mod flows;
pub mod pkce;
mod server;

// Re-exports from error
pub use error::{AcquireError, CacheError, FlowError, SealError};

// Re-exports from types
pub use types::Account;

// Re-exports from cache persistence
pub use cache::{CacheEntry, TokenCache};
pub use sealer::{KeyringSealer, Sealer, SealerKind, UserKeySealer};
pub use store::CacheStore;

// Re-exports from acquisition
pub use acquire::{AccountSelection, acquire_token};
pub use client::{ClientConfig, PublicClient, TokenResponse};
pub use flows::TokenFlows;
pub use server::RedirectListener;

// Re-exports from utils
pub use utils::safe_format_token;
