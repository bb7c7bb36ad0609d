// ABOUTME: OAuth 2.0 data models for the embedded authorization server
// ABOUTME: Persisted records, request/response structures, and the RFC 6749 error type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered client application type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// Browser or native app that cannot keep a secret; authenticates via PKCE
    Public,
    /// Server-side app holding a verifiable client secret
    Confidential,
}

impl ClientType {
    /// Wire/storage representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Confidential => "confidential",
        }
    }

    /// Parse the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "confidential" => Some(Self::Confidential),
            _ => None,
        }
    }
}

/// Registered OAuth 2.0 client application
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Public client identifier
    pub client_id: String,
    /// Argon2 hash of the client secret; `None` for public clients
    pub client_secret_hash: Option<String>,
    /// Public or confidential
    pub client_type: ClientType,
    /// Exact-match redirect URIs registered for this client
    pub redirect_uris: Vec<String>,
    /// Scopes this client may request
    pub allowed_scopes: Vec<String>,
    /// Inactive clients fail all lookups
    pub is_active: bool,
    /// When the client was registered
    pub created_at: DateTime<Utc>,
}

/// Single-use authorization code record
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// Opaque high-entropy code value
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// User who approved the grant
    pub user_id: Uuid,
    /// Redirect URI the code is bound to (exact match at exchange)
    pub redirect_uri: String,
    /// Space-joined granted scopes
    pub scope: String,
    /// PKCE challenge, mandatory for public clients
    pub code_challenge: Option<String>,
    /// PKCE challenge method (`S256` only at issuance)
    pub code_challenge_method: Option<String>,
    /// Opaque client state passed through the flow
    pub state: Option<String>,
    /// Expiry timestamp (short TTL)
    pub expires_at: DateTime<Utc>,
    /// Set exactly once by the atomic consume
    pub used: bool,
}

/// Refresh token record; only the hash of the token is ever stored
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    /// SHA-256 hex of the opaque refresh token
    pub token_hash: String,
    /// Correlation id referenced from the access token's `jti` claim
    pub jti: Uuid,
    /// Client the token belongs to
    pub client_id: String,
    /// User the token acts for
    pub user_id: Uuid,
    /// Space-joined granted scopes
    pub scope: String,
    /// Expiry timestamp (days-scale TTL)
    pub expires_at: DateTime<Utc>,
    /// Soft revocation flag; records are retained for audit
    pub revoked: bool,
    /// When the token was issued
    pub created_at: DateTime<Utc>,
    /// Last successful refresh using this token
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Per user/client consent grant
#[derive(Debug, Clone)]
pub struct Consent {
    /// User who granted consent
    pub user_id: Uuid,
    /// Client the consent applies to
    pub client_id: String,
    /// Space-joined granted scopes
    pub granted_scopes: String,
    /// First grant timestamp
    pub granted_at: DateTime<Utc>,
    /// Last scope update
    pub updated_at: DateTime<Utc>,
}

/// Directory entry for a platform user (collaborator contract)
#[derive(Debug, Clone)]
pub struct User {
    /// Platform user id
    pub id: Uuid,
    /// Deactivated users cannot authorize clients
    pub is_active: bool,
}

/// Claims carried by signed access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user id
    pub sub: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Space-joined granted scopes
    pub scope: String,
    /// Issuer URL
    pub iss: String,
    /// Issued-at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Correlates to the refresh token issued alongside
    pub jti: String,
}

/// OAuth 2.0 authorization request (GET /oauth2/authorize)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    /// Response type; only `code` is supported
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI for the response
    pub redirect_uri: String,
    /// Requested scopes; empty defaults to the client's full allow-list
    pub scope: Option<String>,
    /// Opaque state for CSRF protection, echoed back unchanged
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE challenge method; only `S256` is accepted
    pub code_challenge_method: Option<String>,
}

/// Outcome of a validated authorization request
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthorizeOutcome {
    /// Consent already on file; redirect with the issued code
    Granted {
        /// Issued authorization code
        code: String,
        /// Echoed state parameter
        state: Option<String>,
    },
    /// No matching consent; the consent UI must be shown
    ConsentRequired {
        /// Client requesting access
        client_id: String,
        /// Scopes that will be granted on approval
        scope: String,
        /// Echoed state parameter
        state: Option<String>,
    },
}

/// Consent form submission (POST /oauth2/authorize/consent)
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentRequest {
    /// `approve` or `deny`
    pub decision: String,
    /// Client identifier from the pending authorize request
    pub client_id: String,
    /// Redirect URI from the pending authorize request
    pub redirect_uri: String,
    /// Requested scopes from the pending authorize request
    pub scope: Option<String>,
    /// Opaque state parameter
    pub state: Option<String>,
    /// PKCE code challenge
    pub code_challenge: Option<String>,
    /// PKCE challenge method
    pub code_challenge_method: Option<String>,
}

/// OAuth 2.0 token request (POST /oauth2/token)
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: String,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI; must exactly match the one bound at issuance
    pub redirect_uri: Option<String>,
    /// Client identifier
    pub client_id: String,
    /// Client secret; required for confidential clients
    pub client_secret: Option<String>,
    /// Requested scope narrowing (refresh_token grant)
    pub scope: Option<String>,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
    /// PKCE code verifier (authorization_code grant)
    pub code_verifier: Option<String>,
}

/// OAuth 2.0 token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Signed JWT access token
    pub access_token: String,
    /// Opaque rotating refresh token
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Space-joined granted scopes
    pub scope: String,
}

/// RFC 7662 introspection response
#[derive(Debug, Serialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active
    pub active: bool,
    /// Space-joined scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Client the token was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Subject (user id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// `access_token` or `refresh_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiration timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl IntrospectionResponse {
    /// The uniform inactive response; never reveals why a token is inactive
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            sub: None,
            token_type: None,
            exp: None,
        }
    }
}

/// RFC 8414 authorization server metadata document
#[derive(Debug, Serialize)]
pub struct ServerMetadata {
    /// Issuer identifier URL
    pub issuer: String,
    /// Authorization endpoint URL
    pub authorization_endpoint: String,
    /// Token endpoint URL
    pub token_endpoint: String,
    /// Introspection endpoint URL
    pub introspection_endpoint: String,
    /// Revocation endpoint URL
    pub revocation_endpoint: String,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Supported PKCE challenge methods
    pub code_challenge_methods_supported: Vec<String>,
    /// Supported token endpoint auth methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Advertised scopes, when the deployment publishes a fixed list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
}

/// OAuth 2.0 error response (RFC 6749 §5.2)
#[derive(Debug, Serialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// URI for error information
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    fn new(error: &str, description: Option<&str>, uri: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: description.map(std::borrow::ToOwned::to_owned),
            error_uri: Some(uri.to_owned()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new(
            "invalid_request",
            Some(description),
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            "invalid_client",
            Some("Client authentication failed"),
            "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        )
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new(
            "invalid_grant",
            Some(description),
            "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        )
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self::new(
            "invalid_scope",
            Some(description),
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }

    /// Create an `access_denied` error (user declined consent)
    #[must_use]
    pub fn access_denied() -> Self {
        Self::new(
            "access_denied",
            Some("The user denied the authorization request"),
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            "unsupported_grant_type",
            Some("Grant type not supported"),
            "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        )
    }

    /// Generic server error used for every infrastructure failure.
    /// Clients must not be able to probe protocol state through
    /// infrastructure behavior, so no detail is attached.
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(
            "server_error",
            Some("The authorization server encountered an unexpected condition"),
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }
}
