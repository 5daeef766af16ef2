//! Entra ID public-client configuration and token-endpoint plumbing.

use reqwest::Client;
use serde::Deserialize;

use crate::constants::{AUTHORITY_ENV_VAR, DEFAULT_AUTHORITY_HOST, HTTP_TIMEOUT, USER_AGENT};
use crate::error::FlowError;
use crate::pkce;

/// Configuration of a public-client registration in one tenant.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Authority host, `https://login.microsoftonline.com` for the
    /// Azure public cloud.
    pub authority_host: String,
    /// Directory tenant: a GUID, a domain name, or `common`.
    pub tenant: String,
    /// Application (client) ID.
    pub client_id: String,
}

impl ClientConfig {
    /// Config against the default authority host, honoring the
    /// `ENTRA_TOKEN_AUTHORITY` override.
    pub fn new(
        tenant: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, FlowError> {
        let authority_host = std::env::var(AUTHORITY_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_AUTHORITY_HOST.to_string());
        Self::with_authority_host(authority_host, tenant, client_id)
    }

    /// Config against an explicit authority host. The host must be
    /// HTTPS; plain HTTP is allowed only for loopback hosts.
    pub fn with_authority_host(
        authority_host: impl Into<String>,
        tenant: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, FlowError> {
        let authority_host = authority_host.into().trim_end_matches('/').to_string();
        validate_authority(&authority_host)?;
        Ok(Self {
            authority_host,
            tenant: tenant.into(),
            client_id: client_id.into(),
        })
    }

    pub(crate) fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, self.tenant)
    }

    pub(crate) fn authorize_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/authorize", self.authority_host, self.tenant)
    }
}

fn validate_authority(authority: &str) -> Result<(), FlowError> {
    let url = url::Url::parse(authority)?;

    match url.scheme() {
        "https" => {}
        "http" if is_loopback_host(&url) => {}
        _ => return Err(FlowError::InsecureAuthority),
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(FlowError::InsecureAuthority);
    }

    Ok(())
}

fn is_loopback_host(url: &url::Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

/// Successful response from the token endpoint.
///
/// Optional fields vary by grant: `refresh_token` arrives only when
/// `offline_access` was granted, `id_token` only with `openid`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// HTTP client for one public-client registration.
pub struct PublicClient {
    config: ClientConfig,
    http: Client,
}

impl PublicClient {
    pub fn new(config: ClientConfig) -> Result<Self, FlowError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Redeem a refresh token for a fresh access token.
    pub(crate) async fn redeem_refresh_token(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenResponse, FlowError> {
        let scope = scopes.join(" ");
        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        decode_token_response(response).await
    }

    /// Exchange an authorization code (plus PKCE verifier) for tokens.
    pub(crate) async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
        scopes: &[String],
    ) -> Result<TokenResponse, FlowError> {
        let scope = scopes.join(" ");
        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("code_verifier", code_verifier),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        decode_token_response(response).await
    }

    pub(crate) fn build_authorize_url(
        &self,
        redirect_uri: &str,
        scope: &str,
        state: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&response_mode=query&scope={}&state={}&code_challenge={}&code_challenge_method={}",
            self.config.authorize_endpoint(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(scope),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
            pkce::CHALLENGE_METHOD,
        )
    }
}

async fn decode_token_response(response: reqwest::Response) -> Result<TokenResponse, FlowError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body_len = body.len(), "Failed to parse token response JSON");
            FlowError::Decode(e)
        });
    }

    if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
        tracing::debug!(
            status = %status,
            error = %err.error,
            "Token endpoint returned an OAuth error"
        );
        return Err(FlowError::Provider {
            error: err.error,
            description: err.error_description.unwrap_or_default(),
        });
    }

    Err(FlowError::UnexpectedResponse { status, body })
}
