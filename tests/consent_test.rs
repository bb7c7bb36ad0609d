// ABOUTME: Consent tracking tests: first-visit prompt, remembered grants, scope widening
// ABOUTME: Also covers consent denial and the expired-grant purge
#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use chrono::{Duration, Utc};
use common::{
    generate_code_verifier, obtain_code, protocol_error, public_authorize_request, setup,
    PUBLIC_CLIENT_ID, REDIRECT_URI,
};
use harbor_auth::crypto::hash_token;
use harbor_auth::models::{
    AuthorizationCode, AuthorizeOutcome, ConsentRequest, RefreshTokenRecord,
};
use harbor_auth::store::{CodeStore, TokenStore};
use uuid::Uuid;

#[tokio::test]
async fn test_first_authorization_requires_consent() {
    let h = setup().await;
    let request = public_authorize_request(&generate_code_verifier(), "read");

    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    match outcome {
        AuthorizeOutcome::ConsentRequired {
            client_id, scope, state,
        } => {
            assert_eq!(client_id, PUBLIC_CLIENT_ID);
            assert_eq!(scope, "read");
            assert_eq!(state.as_deref(), Some("xyz-state"));
        }
        AuthorizeOutcome::Granted { .. } => panic!("expected consent prompt on first visit"),
    }
}

#[tokio::test]
async fn test_consent_denial_is_access_denied() {
    let h = setup().await;
    let consent = ConsentRequest {
        decision: "deny".to_owned(),
        client_id: PUBLIC_CLIENT_ID.to_owned(),
        redirect_uri: REDIRECT_URI.to_owned(),
        scope: Some("read".to_owned()),
        state: None,
        code_challenge: Some(common::challenge_for(&generate_code_verifier())),
        code_challenge_method: Some("S256".to_owned()),
    };

    let err = h.server.decide_consent(&consent, h.user_id).await.unwrap_err();
    assert_eq!(protocol_error(err).error, "access_denied");

    // Denial records nothing; the next visit prompts again.
    let request = public_authorize_request(&generate_code_verifier(), "read");
    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    assert!(matches!(outcome, AuthorizeOutcome::ConsentRequired { .. }));
}

#[tokio::test]
async fn test_remembered_consent_skips_prompt() {
    let h = setup().await;
    // obtain_code walks the consent approval path.
    let _ = obtain_code(&h, &generate_code_verifier(), "read write").await;

    let request = public_authorize_request(&generate_code_verifier(), "read write");
    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    assert!(matches!(outcome, AuthorizeOutcome::Granted { .. }));

    // A narrower request is covered by the existing grant too.
    let request = public_authorize_request(&generate_code_verifier(), "read");
    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    assert!(matches!(outcome, AuthorizeOutcome::Granted { .. }));
}

#[tokio::test]
async fn test_scope_widening_prompts_again_and_merges() {
    let h = setup().await;
    let _ = obtain_code(&h, &generate_code_verifier(), "read").await;

    // "write" is not yet covered.
    let request = public_authorize_request(&generate_code_verifier(), "read write");
    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    assert!(matches!(outcome, AuthorizeOutcome::ConsentRequired { .. }));

    // Approving merges the grant, covering both scope sets afterwards.
    let _ = obtain_code(&h, &generate_code_verifier(), "read write").await;
    let request = public_authorize_request(&generate_code_verifier(), "write");
    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    assert!(matches!(outcome, AuthorizeOutcome::Granted { .. }));
}

#[tokio::test]
async fn test_revoked_consent_prompts_again() {
    let h = setup().await;
    let _ = obtain_code(&h, &generate_code_verifier(), "read").await;

    let removed = h
        .server
        .consent_manager()
        .revoke(h.user_id, PUBLIC_CLIENT_ID)
        .await
        .unwrap();
    assert!(removed, "a grant was on file and must report as removed");

    // The remembered grant is gone; the next visit prompts again.
    let request = public_authorize_request(&generate_code_verifier(), "read");
    let outcome = h.server.authorize(&request, h.user_id).await.unwrap();
    assert!(matches!(outcome, AuthorizeOutcome::ConsentRequired { .. }));

    // Revoking again finds nothing to delete.
    let removed = h
        .server
        .consent_manager()
        .revoke(h.user_id, PUBLIC_CLIENT_ID)
        .await
        .unwrap();
    assert!(!removed);
}

#[tokio::test]
async fn test_purge_removes_expired_grants() {
    let h = setup().await;
    let verifier = generate_code_verifier();
    h.store
        .store_code(&AuthorizationCode {
            code: "stale-code".to_owned(),
            client_id: PUBLIC_CLIENT_ID.to_owned(),
            user_id: h.user_id,
            redirect_uri: REDIRECT_URI.to_owned(),
            scope: "read".to_owned(),
            code_challenge: Some(common::challenge_for(&verifier)),
            code_challenge_method: Some("S256".to_owned()),
            state: None,
            expires_at: Utc::now() - Duration::minutes(5),
            used: false,
        })
        .await
        .unwrap();
    h.store
        .store_refresh_token(&RefreshTokenRecord {
            token_hash: hash_token("stale-refresh"),
            jti: Uuid::new_v4(),
            client_id: PUBLIC_CLIENT_ID.to_owned(),
            user_id: h.user_id,
            scope: "read".to_owned(),
            expires_at: Utc::now() - Duration::days(1),
            revoked: false,
            created_at: Utc::now() - Duration::days(31),
            last_used_at: None,
        })
        .await
        .unwrap();

    // A live grant must survive the purge.
    let live_code = obtain_code(&h, &generate_code_verifier(), "read").await;

    let (codes, tokens) = h.server.purge_expired().await.unwrap();
    assert_eq!(codes, 1);
    assert_eq!(tokens, 1);
    assert!(h.store.get_code(&live_code).await.unwrap().is_some());
}
