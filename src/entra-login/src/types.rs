//! Account identity types.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

/// A user account known to the token cache.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Account {
    /// Stable account identifier, `{object id}.{tenant id}` when the
    /// provider supplied an id_token, a tenant-scoped fallback otherwise.
    pub home_account_id: String,
    /// Display name (UPN), may be empty.
    pub username: String,
}

impl Account {
    /// Extract the account identity from an id_token.
    ///
    /// This reads the `oid`/`tid`/`preferred_username` claims from the
    /// payload segment without validating the signature. The values are
    /// used only as cache bookkeeping keys, never as proof of identity.
    pub fn from_id_token(raw: &str) -> Option<Self> {
        let payload = raw.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

        let oid = claims.get("oid")?.as_str()?;
        let tid = claims.get("tid")?.as_str()?;
        let username = claims
            .get("preferred_username")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        Some(Self {
            home_account_id: format!("{oid}.{tid}"),
            username: username.to_string(),
        })
    }

    /// Identity used when the provider returned no id_token (e.g. the
    /// requested scopes did not include `openid`).
    pub fn fallback(tenant: &str) -> Self {
        Self {
            home_account_id: format!("default.{tenant}"),
            username: String::new(),
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.username.is_empty() {
            write!(f, "{}", self.home_account_id)
        } else {
            write!(f, "{}", self.username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_id_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn account_from_id_token_claims() {
        let token = fake_id_token(&serde_json::json!({
            "oid": "11111111-aaaa-bbbb-cccc-222222222222",
            "tid": "33333333-dddd-eeee-ffff-444444444444",
            "preferred_username": "user@contoso.com",
        }));

        let account = Account::from_id_token(&token).unwrap();
        assert_eq!(
            account.home_account_id,
            "11111111-aaaa-bbbb-cccc-222222222222.33333333-dddd-eeee-ffff-444444444444"
        );
        assert_eq!(account.username, "user@contoso.com");
    }

    #[test]
    fn account_from_id_token_missing_claims() {
        let token = fake_id_token(&serde_json::json!({"sub": "abc"}));
        assert!(Account::from_id_token(&token).is_none());
    }

    #[test]
    fn account_from_garbage() {
        assert!(Account::from_id_token("not-a-jwt").is_none());
    }

    #[test]
    fn fallback_is_tenant_scoped() {
        let account = Account::fallback("contoso.onmicrosoft.com");
        assert_eq!(account.home_account_id, "default.contoso.onmicrosoft.com");
        assert_eq!(account.to_string(), "default.contoso.onmicrosoft.com");
    }
}
