// ABOUTME: HTTP-level tests over the axum router: metadata, auth, and the full code flow
// ABOUTME: Drives the endpoints with tower::ServiceExt::oneshot, no network involved
#![allow(clippy::unwrap_used)]

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use common::{generate_code_verifier, setup, PUBLIC_CLIENT_ID, REDIRECT_URI};
use harbor_auth::routes;
use std::sync::Arc;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_metadata_document() {
    let h = setup().await;
    let app = routes::router(Arc::clone(&h.server));

    let response = app
        .oneshot(
            Request::get("/.well-known/oauth-authorization-server")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["issuer"], "https://auth.harbor.test");
    assert_eq!(
        doc["token_endpoint"],
        "https://auth.harbor.test/oauth2/token"
    );
    assert_eq!(doc["code_challenge_methods_supported"][0], "S256");
    assert_eq!(doc["response_types_supported"][0], "code");
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = setup().await;
    let app = routes::router(Arc::clone(&h.server));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authorize_without_session_is_unauthorized() {
    let h = setup().await;
    let app = routes::router(Arc::clone(&h.server));
    let response = app
        .oneshot(
            Request::get("/oauth2/authorize?response_type=code&client_id=web-app&redirect_uri=x")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_endpoint_rejects_unknown_grant() {
    let h = setup().await;
    let app = routes::router(Arc::clone(&h.server));
    let response = app
        .oneshot(
            Request::post("/oauth2/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "grant_type=password&client_id=web-app&username=u&password=p",
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let doc = body_json(response).await;
    assert_eq!(doc["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_token_endpoint_unknown_client_is_401() {
    let h = setup().await;
    let app = routes::router(Arc::clone(&h.server));
    let response = app
        .oneshot(
            Request::post("/oauth2/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "grant_type=refresh_token&client_id=nobody&refresh_token=x",
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let doc = body_json(response).await;
    assert_eq!(doc["error"], "invalid_client");
}

#[tokio::test]
async fn test_introspect_and_revoke_always_200() {
    let h = setup().await;

    let response = routes::router(Arc::clone(&h.server))
        .oneshot(
            Request::post("/oauth2/introspect")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("token=garbage&token_type_hint=access_token"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert_eq!(doc["active"], false);

    let response = routes::router(Arc::clone(&h.server))
        .oneshot(
            Request::post("/oauth2/revoke")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("token=garbage"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authorize_error_delivered_on_redirect_with_302() {
    let h = setup().await;
    let session = h.server.issue_session_token(h.user_id).unwrap();

    // Client and redirect URI are valid, so the error rides the redirect.
    let authorize_uri = format!(
        "/oauth2/authorize?response_type=token&client_id={PUBLIC_CLIENT_ID}\
         &redirect_uri={REDIRECT_URI}&scope=read&state=abc"
    );
    let response = routes::router(Arc::clone(&h.server))
        .oneshot(
            Request::get(authorize_uri.as_str())
                .header(header::AUTHORIZATION, format!("Bearer {session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with(REDIRECT_URI));
    assert!(location.contains("error=invalid_request"));
    assert!(location.contains("state=abc"));
}

#[tokio::test]
async fn test_unregistered_redirect_uri_never_redirects() {
    let h = setup().await;
    let session = h.server.issue_session_token(h.user_id).unwrap();

    let authorize_uri = format!(
        "/oauth2/authorize?response_type=code&client_id={PUBLIC_CLIENT_ID}\
         &redirect_uri=https://evil.example.com/cb&scope=read"
    );
    let response = routes::router(Arc::clone(&h.server))
        .oneshot(
            Request::get(authorize_uri.as_str())
                .header(header::AUTHORIZATION, format!("Bearer {session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // The unvalidated redirect URI must never receive the error.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
    let doc = body_json(response).await;
    assert_eq!(doc["error"], "invalid_request");
}

#[tokio::test]
async fn test_full_flow_over_http() {
    let h = setup().await;
    let session = h.server.issue_session_token(h.user_id).unwrap();
    let verifier = generate_code_verifier();
    let challenge = common::challenge_for(&verifier);

    // First visit: consent is required.
    let authorize_uri = format!(
        "/oauth2/authorize?response_type=code&client_id={PUBLIC_CLIENT_ID}\
         &redirect_uri={REDIRECT_URI}&scope=read&state=abc\
         &code_challenge={challenge}&code_challenge_method=S256"
    );
    let response = routes::router(Arc::clone(&h.server))
        .oneshot(
            Request::get(authorize_uri.as_str())
                .header(header::AUTHORIZATION, format!("Bearer {session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert_eq!(doc["status"], "consent_required");
    assert_eq!(doc["scope"], "read");

    // Approve: the redirect carries the code.
    let consent_body = format!(
        "decision=approve&client_id={PUBLIC_CLIENT_ID}&redirect_uri={REDIRECT_URI}\
         &scope=read&state=abc&code_challenge={challenge}&code_challenge_method=S256"
    );
    let response = routes::router(Arc::clone(&h.server))
        .oneshot(
            Request::post("/oauth2/authorize/consent")
                .header(header::AUTHORIZATION, format!("Bearer {session}"))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(consent_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(location.starts_with(REDIRECT_URI));
    assert!(location.contains("state=abc"));
    let code = location
        .split("code=")
        .nth(1)
        .unwrap()
        .split('&')
        .next()
        .unwrap()
        .to_owned();

    // Exchange the code for tokens.
    let token_body = format!(
        "grant_type=authorization_code&code={code}&redirect_uri={REDIRECT_URI}\
         &client_id={PUBLIC_CLIENT_ID}&code_verifier={verifier}"
    );
    let response = routes::router(Arc::clone(&h.server))
        .oneshot(
            Request::post("/oauth2/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(token_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert_eq!(doc["token_type"], "Bearer");
    assert_eq!(doc["scope"], "read");
    assert!(doc["access_token"].as_str().unwrap().contains('.'));
}
