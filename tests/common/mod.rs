// ABOUTME: Shared test harness: in-memory server with seeded users and clients
// ABOUTME: PKCE helpers and protocol-error unwrapping used across the integration tests
#![allow(clippy::unwrap_used, clippy::panic, dead_code)]

use chrono::Utc;
use harbor_auth::config::ProviderConfig;
use harbor_auth::crypto;
use harbor_auth::errors::FlowError;
use harbor_auth::models::{AuthorizeRequest, ClientType, OAuth2Error, OAuthClient, User};
use harbor_auth::pkce;
use harbor_auth::server::AuthorizationServer;
use harbor_auth::store::sqlite::SqliteStore;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_SIGNING_SECRET: &[u8] = b"test-signing-secret-0123456789abcdef";
pub const PUBLIC_CLIENT_ID: &str = "web-app";
pub const CONFIDENTIAL_CLIENT_ID: &str = "backend-service";
pub const CONFIDENTIAL_CLIENT_SECRET: &str = "backend-s3cr3t-value";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";

pub struct TestHarness {
    pub server: Arc<AuthorizationServer>,
    pub store: SqliteStore,
    pub user_id: Uuid,
}

/// Spin up an in-memory server with one active user, one public client,
/// and one confidential client.
pub async fn setup() -> TestHarness {
    let store = SqliteStore::in_memory().await.unwrap();
    let user_id = Uuid::new_v4();
    store
        .store_user(&User {
            id: user_id,
            is_active: true,
        })
        .await
        .unwrap();
    store
        .store_client(&OAuthClient {
            client_id: PUBLIC_CLIENT_ID.to_owned(),
            client_secret_hash: None,
            client_type: ClientType::Public,
            redirect_uris: vec![REDIRECT_URI.to_owned()],
            allowed_scopes: vec!["read".to_owned(), "write".to_owned()],
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    store
        .store_client(&OAuthClient {
            client_id: CONFIDENTIAL_CLIENT_ID.to_owned(),
            client_secret_hash: Some(
                crypto::hash_client_secret(CONFIDENTIAL_CLIENT_SECRET).unwrap(),
            ),
            client_type: ClientType::Confidential,
            redirect_uris: vec![REDIRECT_URI.to_owned()],
            allowed_scopes: vec!["read".to_owned(), "write".to_owned(), "admin".to_owned()],
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let config = ProviderConfig::for_tests(TEST_SIGNING_SECRET);
    let server = Arc::new(AuthorizationServer::with_sqlite(config, store.clone()));
    TestHarness {
        server,
        store,
        user_id,
    }
}

/// Generate a fresh RFC 7636 code verifier (43 chars of base64url)
pub fn generate_code_verifier() -> String {
    crypto::generate_random_string(32).unwrap()
}

/// Compute the S256 challenge for a verifier
pub fn challenge_for(verifier: &str) -> String {
    pkce::compute_s256_challenge(verifier)
}

/// An authorize request for the public client with PKCE attached
pub fn public_authorize_request(verifier: &str, scope: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: PUBLIC_CLIENT_ID.to_owned(),
        redirect_uri: REDIRECT_URI.to_owned(),
        scope: Some(scope.to_owned()),
        state: Some("xyz-state".to_owned()),
        code_challenge: Some(challenge_for(verifier)),
        code_challenge_method: Some("S256".to_owned()),
    }
}

/// Run authorize + consent approval for the public client and return
/// the issued authorization code
pub async fn obtain_code(h: &TestHarness, verifier: &str, scope: &str) -> String {
    use harbor_auth::models::{AuthorizeOutcome, ConsentRequest};

    let request = public_authorize_request(verifier, scope);
    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    match outcome {
        AuthorizeOutcome::Granted { code, .. } => code,
        AuthorizeOutcome::ConsentRequired { .. } => {
            let consent = ConsentRequest {
                decision: "approve".to_owned(),
                client_id: request.client_id,
                redirect_uri: request.redirect_uri,
                scope: request.scope,
                state: request.state,
                code_challenge: request.code_challenge,
                code_challenge_method: request.code_challenge_method,
            };
            match h.server.decide_consent(&consent, h.user_id).await.unwrap() {
                AuthorizeOutcome::Granted { code, .. } => code,
                AuthorizeOutcome::ConsentRequired { .. } => {
                    panic!("consent approval did not issue a code")
                }
            }
        }
    }
}

/// Unwrap a flow error into its protocol payload, panicking on
/// infrastructure errors
pub fn protocol_error(err: FlowError) -> OAuth2Error {
    match err {
        FlowError::Protocol(oauth) | FlowError::Direct(oauth) => oauth,
        FlowError::Infra(e) => panic!("expected protocol error, got infrastructure error: {e}"),
    }
}
