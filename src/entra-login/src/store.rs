//! Sealed on-disk persistence for the token cache.
//!
//! [`CacheStore::open`] is the before-access hook: read the file if it
//! exists, unseal, decode. [`CacheStore::commit`] is the after-access
//! hook: only when cache state changed, encode, seal, and overwrite the
//! file wholesale. The file on disk is never plaintext.

use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use crate::cache::TokenCache;
use crate::error::CacheError;
use crate::sealer::Sealer;
use crate::utils::set_file_permissions;

/// A token-cache store bound to one file path and one sealer.
///
/// The path and sealer are explicit construction-time values, so a
/// process can hold several independent stores.
pub struct CacheStore {
    path: PathBuf,
    sealer: Box<dyn Sealer>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, sealer: Box<dyn Sealer>) -> Self {
        Self {
            path: path.into(),
            sealer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache from disk. An absent file is the first-run state
    /// and yields an empty cache; an unreadable or unsealable file is an
    /// error.
    pub fn open(&self) -> Result<TokenCache, CacheError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No cache file, starting empty");
            return Ok(TokenCache::empty());
        }

        let sealed = std::fs::read(&self.path).map_err(|source| CacheError::Read {
            path: self.path.clone(),
            source,
        })?;

        let mut blob = self.sealer.unseal(&sealed).map_err(CacheError::Unseal)?;
        let cache = TokenCache::deserialize(&blob);
        blob.zeroize();
        cache
    }

    /// Persist the cache if its state changed; otherwise leave the file
    /// untouched.
    pub fn commit(&self, cache: &TokenCache) -> Result<(), CacheError> {
        if !cache.has_state_changed() {
            tracing::trace!("Cache state unchanged, skipping write");
            return Ok(());
        }

        let mut blob = cache.serialize()?;
        let sealed = self.sealer.seal(&blob).map_err(CacheError::Seal);
        blob.zeroize();
        let sealed = sealed?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        std::fs::write(&self.path, &sealed).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;

        if let Err(e) = set_file_permissions(&self.path) {
            tracing::warn!(error = %e, "Failed to restrict cache file permissions");
        }

        tracing::debug!(
            path = %self.path.display(),
            bytes = sealed.len(),
            "Cache file written"
        );
        Ok(())
    }
}
