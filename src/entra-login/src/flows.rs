//! Silent and interactive acquisition flows.
//!
//! [`TokenFlows`] is the seam between the orchestrator and the identity
//! client: the production implementation lives on [`PublicClient`],
//! tests substitute scripted fakes.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;

use crate::cache::{CacheEntry, TokenCache};
use crate::client::{ClientConfig, PublicClient, TokenResponse};
use crate::constants::{LOGIN_TIMEOUT_SECS, OFFLINE_ACCESS_SCOPE};
use crate::error::FlowError;
use crate::pkce::{self, PkceCodes};
use crate::server::RedirectListener;
use crate::types::Account;
use crate::utils::safe_format_token;

/// The two acquisition operations the orchestrator drives.
///
/// Both take the open cache so a successful acquisition lands in it;
/// implementations must mark the cache changed only when they mutate it.
#[async_trait]
pub trait TokenFlows {
    /// Acquire a token for `account` without user interaction: cached
    /// access token if still valid, refresh-token redemption otherwise.
    async fn acquire_silent(
        &self,
        cache: &mut TokenCache,
        account: &Account,
        scopes: &[String],
    ) -> Result<SecretString, FlowError>;

    /// Acquire a token through a user-facing browser login.
    async fn acquire_interactive(
        &self,
        cache: &mut TokenCache,
        scopes: &[String],
    ) -> Result<SecretString, FlowError>;
}

#[async_trait]
impl TokenFlows for PublicClient {
    async fn acquire_silent(
        &self,
        cache: &mut TokenCache,
        account: &Account,
        scopes: &[String],
    ) -> Result<SecretString, FlowError> {
        let config = self.config();
        let Some(entry) = cache.find(&config.tenant, &config.client_id, account, scopes) else {
            return Err(FlowError::NoMatchingGrant);
        };

        if !entry.is_expired() {
            tracing::debug!(account = %account, "Cached access token still valid");
            return Ok(SecretString::from(entry.access_token.clone()));
        }

        let refresh_token = entry
            .refresh_token
            .clone()
            .ok_or(FlowError::NoRefreshToken)?;
        let cached_account = entry.account();

        tracing::debug!(account = %account, "Access token expired, redeeming refresh token");
        let token = self.redeem_refresh_token(&refresh_token, scopes).await?;

        let entry = cache_entry_from_response(
            config,
            &token,
            scopes,
            cached_account,
            Some(refresh_token),
        );
        cache.upsert(entry);

        tracing::info!(
            account = %account,
            token = %safe_format_token(&token.access_token),
            "Silent acquisition succeeded"
        );
        Ok(SecretString::from(token.access_token))
    }

    async fn acquire_interactive(
        &self,
        cache: &mut TokenCache,
        scopes: &[String],
    ) -> Result<SecretString, FlowError> {
        let config = self.config();

        // offline_access makes the provider issue a refresh token, which
        // is what keeps future runs silent.
        let mut request_scopes = scopes.to_vec();
        if !request_scopes.iter().any(|s| s == OFFLINE_ACCESS_SCOPE) {
            request_scopes.push(OFFLINE_ACCESS_SCOPE.to_string());
        }
        let scope = request_scopes.join(" ");

        let pkce = PkceCodes::generate();
        let state = pkce::random_urlsafe();
        let listener = RedirectListener::bind().await?;
        let redirect_uri = listener.redirect_uri().to_string();
        let auth_url = self.build_authorize_url(&redirect_uri, &scope, &state, &pkce.challenge);

        eprintln!("\nTo sign in, visit:\n\n  {auth_url}\n");
        if let Err(e) = open_browser(&auth_url) {
            tracing::debug!(error = %e, "Failed to open browser automatically");
            eprintln!("(Could not open a browser automatically - open the URL manually.)");
        } else {
            eprintln!("(Opening browser...)");
        }
        eprintln!("\nWaiting for sign-in to complete...");

        let code = listener
            .wait_for_code(&state, Duration::from_secs(LOGIN_TIMEOUT_SECS))
            .await?;

        let token = self
            .exchange_code(&code, &redirect_uri, &pkce.verifier, &request_scopes)
            .await?;

        let account = token
            .id_token
            .as_deref()
            .and_then(Account::from_id_token)
            .unwrap_or_else(|| Account::fallback(&config.tenant));

        let entry = cache_entry_from_response(config, &token, scopes, account.clone(), None);
        cache.upsert(entry);

        tracing::info!(
            account = %account,
            token = %safe_format_token(&token.access_token),
            "Interactive acquisition succeeded"
        );
        Ok(SecretString::from(token.access_token))
    }
}

/// Build the cache entry for a token response.
///
/// The granted scope string from the response wins over the requested
/// list when present; a rotated refresh token replaces the one redeemed.
fn cache_entry_from_response(
    config: &ClientConfig,
    token: &TokenResponse,
    requested_scopes: &[String],
    account: Account,
    previous_refresh_token: Option<String>,
) -> CacheEntry {
    let expires_at = token
        .expires_in
        .map(|secs| Utc::now().timestamp() + secs as i64);

    let scopes = token
        .scope
        .as_deref()
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_else(|| requested_scopes.to_vec());

    CacheEntry {
        home_account_id: account.home_account_id,
        username: account.username,
        tenant: config.tenant.clone(),
        client_id: config.client_id.clone(),
        scopes,
        access_token: token.access_token.clone(),
        expires_at,
        refresh_token: token.refresh_token.clone().or(previous_refresh_token),
    }
}

/// Open a URL in the default browser.
///
/// The URL is validated first: http/https only, no embedded credentials,
/// no shell metacharacters. It is passed as an argument, never through a
/// shell.
fn open_browser(url: &str) -> Result<()> {
    let parsed_url = url::Url::parse(url).context("invalid URL")?;

    match parsed_url.scheme() {
        "http" | "https" => {}
        scheme => {
            anyhow::bail!(
                "refusing to open URL with scheme '{scheme}': only http and https are allowed"
            );
        }
    }

    if !parsed_url.username().is_empty() || parsed_url.password().is_some() {
        anyhow::bail!("refusing to open URL with embedded credentials");
    }

    const DANGEROUS_CHARS: &[char] = &[
        '`', '$', '|', ';', '&', '<', '>', '(', ')', '{', '}', '[', ']', '!', '\n', '\r',
    ];
    if url.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        anyhow::bail!("URL contains potentially dangerous characters");
    }

    let safe_url = parsed_url.as_str();

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg("--")
            .arg(safe_url)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(safe_url)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", safe_url])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;

    fn config() -> ClientConfig {
        ClientConfig::with_authority_host("https://login.microsoftonline.com", "contoso", "c1")
            .unwrap()
    }

    fn response(scope: Option<&str>, refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "at".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            refresh_token: refresh.map(str::to_string),
            scope: scope.map(str::to_string),
            id_token: None,
        }
    }

    #[test]
    fn entry_prefers_granted_scopes() {
        let entry = cache_entry_from_response(
            &config(),
            &response(Some("user.read offline_access"), None),
            &["user.read".to_string()],
            Account::fallback("contoso"),
            None,
        );
        assert_eq!(entry.scopes, vec!["user.read", "offline_access"]);
    }

    #[test]
    fn entry_falls_back_to_requested_scopes() {
        let entry = cache_entry_from_response(
            &config(),
            &response(None, None),
            &["user.read".to_string()],
            Account::fallback("contoso"),
            None,
        );
        assert_eq!(entry.scopes, vec!["user.read"]);
    }

    #[test]
    fn rotated_refresh_token_wins() {
        let entry = cache_entry_from_response(
            &config(),
            &response(None, Some("rotated")),
            &[],
            Account::fallback("contoso"),
            Some("previous".to_string()),
        );
        assert_eq!(entry.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn previous_refresh_token_survives_when_not_rotated() {
        let entry = cache_entry_from_response(
            &config(),
            &response(None, None),
            &[],
            Account::fallback("contoso"),
            Some("previous".to_string()),
        );
        assert_eq!(entry.refresh_token.as_deref(), Some("previous"));
    }

    #[test]
    fn entry_records_expiry() {
        let entry = cache_entry_from_response(
            &config(),
            &response(None, None),
            &[],
            Account::fallback("contoso"),
            None,
        );
        let expires_at = entry.expires_at.unwrap();
        let delta = expires_at - Utc::now().timestamp();
        assert!((3590..=3610).contains(&delta));
    }

    #[test]
    fn browser_rejects_non_http_schemes() {
        assert!(open_browser("file:///etc/passwd").is_err());
        assert!(open_browser("javascript:alert(1)").is_err());
    }

    #[test]
    fn browser_rejects_embedded_credentials() {
        assert!(open_browser("https://user:pw@example.com/").is_err());
    }
}
