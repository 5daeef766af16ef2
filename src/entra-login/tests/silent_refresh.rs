//! Silent-flow behavior against a stubbed token endpoint.

use chrono::Utc;
use secrecy::ExposeSecret;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use entra_login::{
    Account, CacheEntry, ClientConfig, FlowError, PublicClient, TokenCache, TokenFlows,
};

const TENANT: &str = "contoso.onmicrosoft.com";
const CLIENT_ID: &str = "11111111-2222-3333-4444-555555555555";

fn client_for(server: &MockServer) -> PublicClient {
    let config = ClientConfig::with_authority_host(server.uri(), TENANT, CLIENT_ID).unwrap();
    PublicClient::new(config).unwrap()
}

fn cached_entry(expires_in: i64, refresh_token: Option<&str>) -> CacheEntry {
    CacheEntry {
        home_account_id: "oid.tid".to_string(),
        username: "user@contoso.com".to_string(),
        tenant: TENANT.to_string(),
        client_id: CLIENT_ID.to_string(),
        scopes: vec!["user.read".to_string()],
        access_token: "cached-access-token".to_string(),
        expires_at: Some(Utc::now().timestamp() + expires_in),
        refresh_token: refresh_token.map(str::to_string),
    }
}

fn account() -> Account {
    Account {
        home_account_id: "oid.tid".to_string(),
        username: "user@contoso.com".to_string(),
    }
}

fn scopes() -> Vec<String> {
    vec!["user.read".to_string()]
}

#[tokio::test]
async fn valid_cached_token_needs_no_network() {
    // No mock is mounted: any request to the server would 404 and fail
    // the flow, so success proves the fast path stayed local.
    let server = MockServer::start().await;
    let client = client_for(&server);

    let mut cache = TokenCache::empty();
    cache.upsert(cached_entry(3600, Some("refresh-1")));

    let token = client
        .acquire_silent(&mut cache, &account(), &scopes())
        .await
        .unwrap();
    assert_eq!(token.expose_secret(), "cached-access-token");
}

#[tokio::test]
async fn expired_token_is_redeemed_with_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-2",
            "scope": "user.read",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut cache = TokenCache::empty();
    cache.upsert(cached_entry(-60, Some("refresh-1")));

    let token = client
        .acquire_silent(&mut cache, &account(), &scopes())
        .await
        .unwrap();
    assert_eq!(token.expose_secret(), "fresh-access-token");

    // The rotated refresh token replaced the redeemed one.
    let entry = cache
        .find(TENANT, CLIENT_ID, &account(), &scopes())
        .unwrap();
    assert_eq!(entry.access_token, "fresh-access-token");
    assert_eq!(entry.refresh_token.as_deref(), Some("refresh-2"));
    assert!(cache.has_state_changed());
}

#[tokio::test]
async fn rejected_refresh_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "AADSTS70008: The refresh token has expired.",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut cache = TokenCache::empty();
    cache.upsert(cached_entry(-60, Some("refresh-1")));

    let err = client
        .acquire_silent(&mut cache, &account(), &scopes())
        .await
        .unwrap_err();
    match err {
        FlowError::Provider { error, description } => {
            assert_eq!(error, "invalid_grant");
            assert!(description.contains("AADSTS70008"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_grant_and_missing_refresh_token_are_distinct() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    // Cache entry does not cover the requested scope.
    let mut cache = TokenCache::empty();
    cache.upsert(cached_entry(3600, Some("refresh-1")));
    let err = client
        .acquire_silent(&mut cache, &account(), &["mail.send".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::NoMatchingGrant));

    // Covering entry, expired, but nothing to redeem.
    let mut cache = TokenCache::empty();
    cache.upsert(cached_entry(-60, None));
    let err = client
        .acquire_silent(&mut cache, &account(), &scopes())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::NoRefreshToken));
}
