// ABOUTME: Axum HTTP surface for the authorization server endpoints
// ABOUTME: Thin handlers that map flow outcomes and errors onto RFC 6749 status codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::errors::FlowError;
use crate::models::{AuthorizeOutcome, AuthorizeRequest, ConsentRequest, OAuth2Error, TokenRequest};
use crate::server::AuthorizationServer;
use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Per-request timeout for every endpoint
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the router exposing the OAuth 2.0 endpoints
#[must_use]
pub fn router(server: Arc<AuthorizationServer>) -> Router {
    Router::new()
        .route("/oauth2/authorize", get(authorize))
        .route("/oauth2/authorize/consent", post(consent))
        .route("/oauth2/token", post(token))
        .route("/oauth2/introspect", post(introspect))
        .route("/oauth2/revoke", post(revoke))
        .route("/.well-known/oauth-authorization-server", get(metadata))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .with_state(server)
}

/// Map a flow failure onto its HTTP response. Infrastructure failures
/// are logged server-side and collapse to a 500 `server_error`.
fn error_response(err: FlowError) -> Response {
    match err {
        FlowError::Protocol(oauth) | FlowError::Direct(oauth) => {
            let status = match oauth.error.as_str() {
                "invalid_client" => StatusCode::UNAUTHORIZED,
                "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(oauth)).into_response()
        }
        FlowError::Infra(e) => {
            tracing::error!(error = %e, "request failed on infrastructure error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OAuth2Error::server_error()),
            )
                .into_response()
        }
    }
}

/// Extract and verify the bearer session token from the request headers
fn session_user(server: &AuthorizationServer, headers: &HeaderMap) -> Result<Uuid, Response> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(OAuth2Error::access_denied()),
        )
            .into_response()
    };
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;
    server.authenticate_session(bearer).ok_or_else(unauthorized)
}

/// A 302 Found carrying the code or error back to the client; RFC 6749
/// delivers authorization responses with 302, not 303
fn found_redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Turn an authorize outcome into its response: granted codes redirect
/// back to the client, pending consent renders as JSON for the UI
fn outcome_response(redirect_uri: &str, outcome: AuthorizeOutcome) -> Response {
    match outcome {
        AuthorizeOutcome::Granted { ref code, ref state } => {
            let mut location = format!("{redirect_uri}?code={code}");
            if let Some(state) = state {
                location.push_str("&state=");
                location.push_str(&urlencode(state));
            }
            found_redirect(&location)
        }
        consent_required @ AuthorizeOutcome::ConsentRequired { .. } => {
            (StatusCode::OK, Json(consent_required)).into_response()
        }
    }
}

/// Percent-encode a query component
fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Errors raised after the client and redirect URI are validated are
/// delivered back on the redirect URI per RFC 6749 §4.1.2.1. Failures
/// raised before that point carry `FlowError::Direct` and never
/// redirect.
fn authorize_error_response(redirect_uri: &str, state: Option<&str>, err: FlowError) -> Response {
    match err {
        FlowError::Protocol(oauth) => {
            let mut location = format!("{redirect_uri}?error={}", oauth.error);
            if let Some(description) = &oauth.error_description {
                location.push_str("&error_description=");
                location.push_str(&urlencode(description));
            }
            if let Some(state) = state {
                location.push_str("&state=");
                location.push_str(&urlencode(state));
            }
            found_redirect(&location)
        }
        other => error_response(other),
    }
}

async fn authorize(
    State(server): State<Arc<AuthorizationServer>>,
    headers: HeaderMap,
    Query(request): Query<AuthorizeRequest>,
) -> Response {
    let user_id = match session_user(&server, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match server.authorize(&request, user_id).await {
        Ok(outcome) => outcome_response(&request.redirect_uri, outcome),
        Err(e) => authorize_error_response(&request.redirect_uri, request.state.as_deref(), e),
    }
}

async fn consent(
    State(server): State<Arc<AuthorizationServer>>,
    headers: HeaderMap,
    Form(request): Form<ConsentRequest>,
) -> Response {
    let user_id = match session_user(&server, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match server.decide_consent(&request, user_id).await {
        Ok(outcome) => outcome_response(&request.redirect_uri, outcome),
        Err(e) => authorize_error_response(&request.redirect_uri, request.state.as_deref(), e),
    }
}

async fn token(
    State(server): State<Arc<AuthorizationServer>>,
    Form(request): Form<TokenRequest>,
) -> Response {
    match server.token(&request).await {
        Ok(tokens) => (StatusCode::OK, Json(tokens)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Form body for the introspection and revocation endpoints
#[derive(Debug, Deserialize)]
struct TokenActionRequest {
    token: String,
    token_type_hint: Option<String>,
}

async fn introspect(
    State(server): State<Arc<AuthorizationServer>>,
    Form(request): Form<TokenActionRequest>,
) -> Response {
    tracing::debug!(hint = ?request.token_type_hint, "introspection request");
    let introspection = server.introspect(&request.token).await;
    (StatusCode::OK, Json(introspection)).into_response()
}

async fn revoke(
    State(server): State<Arc<AuthorizationServer>>,
    Form(request): Form<TokenActionRequest>,
) -> Response {
    match server
        .revoke(&request.token, request.token_type_hint.as_deref())
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(e.into()),
    }
}

#[allow(clippy::unused_async)]
async fn metadata(State(server): State<Arc<AuthorizationServer>>) -> Response {
    Json(server.metadata()).into_response()
}

#[allow(clippy::unused_async)]
async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}
