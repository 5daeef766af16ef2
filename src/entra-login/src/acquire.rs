//! Acquisition orchestration: silent first, interactive fallback.

use secrecy::SecretString;

use crate::error::AcquireError;
use crate::flows::TokenFlows;
use crate::store::CacheStore;
use crate::types::Account;

/// Policy for choosing among cached accounts.
///
/// `First` matches the historical behavior on multi-account caches:
/// the first entry wins, and nothing beyond that is promised. The
/// policy is explicit so callers and tests can see (and later extend)
/// the choice instead of relying on an implicit first-match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountSelection {
    #[default]
    First,
}

impl AccountSelection {
    pub fn pick(self, accounts: &[Account]) -> Option<&Account> {
        match self {
            Self::First => accounts.first(),
        }
    }
}

/// Acquire an access token: silently against the selected cached
/// account when possible, interactively otherwise.
///
/// Silent failure is logged and falls through to interactive; it never
/// terminates the run. Cache open/commit failures are fatal. The cache
/// is committed whenever its state changed, including on a failed
/// interactive attempt that followed a cache-mutating silent one.
pub async fn acquire_token<F>(
    flows: &F,
    store: &CacheStore,
    selection: AccountSelection,
    scopes: &[String],
) -> Result<SecretString, AcquireError>
where
    F: TokenFlows + Sync,
{
    let mut cache = store.open()?;

    let mut token = None;
    let accounts = cache.accounts();
    match selection.pick(&accounts) {
        Some(account) => {
            let account = account.clone();
            match flows.acquire_silent(&mut cache, &account, scopes).await {
                Ok(t) => token = Some(t),
                Err(e) => {
                    tracing::warn!(
                        account = %account,
                        error = %e,
                        "Silent acquisition failed, falling back to interactive login"
                    );
                }
            }
        }
        None => {
            tracing::debug!("No cached account, using interactive login");
        }
    }

    let token = match token {
        Some(token) => token,
        None => match flows.acquire_interactive(&mut cache, scopes).await {
            Ok(token) => token,
            Err(e) => {
                store.commit(&cache)?;
                return Err(AcquireError::Interactive(e));
            }
        },
    };

    store.commit(&cache)?;
    Ok(token)
}
