//! In-memory token cache and its serialized blob form.
//!
//! The serialized bytes are the only thing the store persists; outside
//! this module the blob is opaque. The cache tracks whether any
//! operation changed its state so the store can skip redundant writes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::CLOCK_SKEW_SECS;
use crate::error::CacheError;
use crate::types::Account;

/// One cached grant: an account's tokens for a (tenant, client) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub home_account_id: String,
    pub username: String,
    pub tenant: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub access_token: String,
    /// Unix timestamp the access token expires at, if known.
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl CacheEntry {
    /// Whether the access token is expired, treating tokens inside the
    /// clock-skew window as already expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() + CLOCK_SKEW_SECS >= expires_at,
            None => true,
        }
    }

    /// Whether every requested scope was granted to this entry.
    pub fn covers_scopes(&self, requested: &[String]) -> bool {
        requested.iter().all(|s| self.scopes.iter().any(|g| g == s))
    }

    pub fn account(&self) -> Account {
        Account {
            home_account_id: self.home_account_id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Serialized cache shape. Versioned so a future layout change can
/// detect (and discard) old blobs instead of misreading them.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCache {
    version: u32,
    entries: Vec<CacheEntry>,
}

const CACHE_VERSION: u32 = 1;

/// The in-memory token cache.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Vec<CacheEntry>,
    dirty: bool,
}

impl TokenCache {
    /// Empty cache, the first-run state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode a cache from its blob form.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CacheError> {
        let stored: StoredCache = serde_json::from_slice(bytes).map_err(CacheError::Decode)?;
        if stored.version != CACHE_VERSION {
            tracing::warn!(
                version = stored.version,
                "Unknown cache version, starting from an empty cache"
            );
            return Ok(Self::empty());
        }
        Ok(Self {
            entries: stored.entries,
            dirty: false,
        })
    }

    /// Encode the cache to its blob form.
    pub fn serialize(&self) -> Result<Vec<u8>, CacheError> {
        let stored = StoredCache {
            version: CACHE_VERSION,
            entries: self.entries.clone(),
        };
        serde_json::to_vec(&stored).map_err(CacheError::Encode)
    }

    /// Accounts known to the cache, in insertion order, deduplicated.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = Vec::new();
        for entry in &self.entries {
            if !accounts.iter().any(|a| a.home_account_id == entry.home_account_id) {
                accounts.push(entry.account());
            }
        }
        accounts
    }

    /// Find the entry for an account covering the requested scopes.
    pub fn find(
        &self,
        tenant: &str,
        client_id: &str,
        account: &Account,
        scopes: &[String],
    ) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| {
            e.tenant == tenant
                && e.client_id == client_id
                && e.home_account_id == account.home_account_id
                && e.covers_scopes(scopes)
        })
    }

    /// Insert or replace the entry for (tenant, client, account) and mark
    /// the cache changed.
    pub fn upsert(&mut self, entry: CacheEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| {
            e.tenant == entry.tenant
                && e.client_id == entry.client_id
                && e.home_account_id == entry.home_account_id
        }) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
        self.dirty = true;
    }

    /// Whether any operation since load changed cache state.
    pub fn has_state_changed(&self) -> bool {
        self.dirty
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(account: &str, scopes: &[&str]) -> CacheEntry {
        CacheEntry {
            home_account_id: account.to_string(),
            username: format!("{account}@contoso.com"),
            tenant: "contoso".to_string(),
            client_id: "client-1".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            access_token: "at".to_string(),
            expires_at: Some(Utc::now().timestamp() + 3600),
            refresh_token: Some("rt".to_string()),
        }
    }

    fn scopes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn blob_round_trip() {
        let mut cache = TokenCache::empty();
        cache.upsert(entry("a1", &["user.read"]));

        let blob = cache.serialize().unwrap();
        let restored = TokenCache::deserialize(&blob).unwrap();
        assert_eq!(restored.accounts().len(), 1);
        assert!(!restored.has_state_changed());
    }

    #[test]
    fn unknown_version_starts_empty() {
        let blob = br#"{"version":99,"entries":[]}"#;
        let cache = TokenCache::deserialize(blob).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn garbage_blob_is_a_decode_error() {
        assert!(matches!(
            TokenCache::deserialize(b"not json"),
            Err(CacheError::Decode(_))
        ));
    }

    #[test]
    fn scope_subset_matching() {
        let e = entry("a1", &["a", "b", "c"]);
        assert!(e.covers_scopes(&scopes(&["a", "c"])));
        assert!(e.covers_scopes(&[]));
        assert!(!e.covers_scopes(&scopes(&["d"])));
    }

    #[test]
    fn find_requires_tenant_client_and_scopes() {
        let mut cache = TokenCache::empty();
        cache.upsert(entry("a1", &["user.read"]));
        let account = Account {
            home_account_id: "a1".to_string(),
            username: String::new(),
        };

        assert!(cache.find("contoso", "client-1", &account, &scopes(&["user.read"])).is_some());
        assert!(cache.find("fabrikam", "client-1", &account, &scopes(&["user.read"])).is_none());
        assert!(cache.find("contoso", "client-2", &account, &scopes(&["user.read"])).is_none());
        assert!(cache.find("contoso", "client-1", &account, &scopes(&["mail.send"])).is_none());
    }

    #[test]
    fn upsert_replaces_matching_entry() {
        let mut cache = TokenCache::empty();
        cache.upsert(entry("a1", &["user.read"]));

        let mut updated = entry("a1", &["user.read"]);
        updated.access_token = "at2".to_string();
        cache.upsert(updated);

        assert_eq!(cache.accounts().len(), 1);
        let account = Account {
            home_account_id: "a1".to_string(),
            username: String::new(),
        };
        let found = cache.find("contoso", "client-1", &account, &scopes(&["user.read"])).unwrap();
        assert_eq!(found.access_token, "at2");
    }

    #[test]
    fn mutation_marks_state_changed() {
        let mut cache = TokenCache::empty();
        assert!(!cache.has_state_changed());
        cache.upsert(entry("a1", &["user.read"]));
        assert!(cache.has_state_changed());
    }

    #[test]
    fn accounts_preserve_insertion_order() {
        let mut cache = TokenCache::empty();
        cache.upsert(entry("first", &["a"]));
        cache.upsert(entry("second", &["a"]));

        let accounts = cache.accounts();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].home_account_id, "first");
    }

    #[test]
    fn expiry_respects_clock_skew() {
        let mut e = entry("a1", &["a"]);
        // Nominally valid but inside the skew window: treated as expired.
        e.expires_at = Some(Utc::now().timestamp() + 60);
        assert!(e.is_expired());

        e.expires_at = Some(Utc::now().timestamp() + 3600);
        assert!(!e.is_expired());

        // No recorded expiry: never trust the token.
        e.expires_at = None;
        assert!(e.is_expired());
    }
}
