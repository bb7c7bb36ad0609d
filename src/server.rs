// ABOUTME: The authorization server facade tying validator, codes, tokens, and consent together
// ABOUTME: One method per protocol operation; the HTTP layer in routes.rs stays thin
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::clients::ClientValidator;
use crate::codes::AuthorizationCodeManager;
use crate::config::ProviderConfig;
use crate::consent::ConsentManager;
use crate::errors::{AppResult, FlowResult};
use crate::introspection::IntrospectionService;
use crate::models::{
    AuthorizeOutcome, AuthorizeRequest, ConsentRequest, IntrospectionResponse, OAuth2Error,
    ServerMetadata, TokenRequest, TokenResponse,
};
use crate::store::sqlite::SqliteStore;
use crate::store::{ClientStore, CodeStore, ConsentStore, TokenStore, UserStore};
use crate::tokens::TokenService;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Platform session token lifetime in minutes
const SESSION_TTL_MINUTES: i64 = 8 * 60;

/// Claims carried by platform session tokens presented at the
/// authorization endpoint
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// The embedded OAuth 2.0 authorization server
pub struct AuthorizationServer {
    clients: ClientValidator,
    codes: AuthorizationCodeManager,
    tokens: Arc<TokenService>,
    introspection: IntrospectionService,
    consents: ConsentManager,
    users: Arc<dyn UserStore>,
    code_store: Arc<dyn CodeStore>,
    token_store: Arc<dyn TokenStore>,
    config: ProviderConfig,
}

impl AuthorizationServer {
    /// Assemble the server from its collaborator stores
    #[must_use]
    pub fn new(
        config: ProviderConfig,
        users: Arc<dyn UserStore>,
        clients: Arc<dyn ClientStore>,
        codes: Arc<dyn CodeStore>,
        tokens: Arc<dyn TokenStore>,
        consents: Arc<dyn ConsentStore>,
    ) -> Self {
        let token_service = Arc::new(TokenService::new(Arc::clone(&tokens), config.clone()));
        Self {
            clients: ClientValidator::new(clients),
            codes: AuthorizationCodeManager::new(Arc::clone(&codes), config.clone()),
            introspection: IntrospectionService::new(
                Arc::clone(&token_service),
                Arc::clone(&tokens),
            ),
            tokens: token_service,
            consents: ConsentManager::new(consents),
            users,
            code_store: codes,
            token_store: tokens,
            config,
        }
    }

    /// Assemble the server over a single SQLite store backing every trait
    #[must_use]
    pub fn with_sqlite(config: ProviderConfig, store: SqliteStore) -> Self {
        Self::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        )
    }

    /// The configuration this server was built with
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Token service accessor for out-of-band operations such as
    /// revoking every token for a deactivated user
    #[must_use]
    pub fn token_service(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Consent manager accessor for out-of-band operations such as a
    /// user removing a client from their account settings
    #[must_use]
    pub fn consent_manager(&self) -> &ConsentManager {
        &self.consents
    }

    /// Handle a validated, authenticated authorization request.
    ///
    /// Validates the client, redirect URI, and scope, then either issues
    /// a code immediately (consent already on file) or asks the caller
    /// to show the consent screen.
    ///
    /// # Errors
    /// Returns the RFC 6749 error matching the first failed check
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
        user_id: Uuid,
    ) -> FlowResult<AuthorizeOutcome> {
        // Client and redirect URI come first: until both check out, no
        // error may be delivered via redirect.
        let client = self.clients.get_active_client(&request.client_id).await?;
        ClientValidator::validate_redirect_uri(&client, &request.redirect_uri)?;

        if request.response_type != "code" {
            return Err(
                OAuth2Error::invalid_request("Only response_type=code is supported").into(),
            );
        }

        let scope = ClientValidator::resolve_scopes(&client, request.scope.as_deref())?;

        match self.users.get_user(user_id).await? {
            Some(user) if user.is_active => {}
            _ => {
                tracing::warn!(user_id = %user_id, "authorization attempt by unknown or inactive user");
                return Err(OAuth2Error::access_denied().into());
            }
        }

        if self
            .consents
            .covers(user_id, &client.client_id, &scope)
            .await?
        {
            let code = self
                .codes
                .issue_code(
                    &client,
                    user_id,
                    &request.redirect_uri,
                    &scope,
                    request.code_challenge.as_deref(),
                    request.code_challenge_method.as_deref(),
                    request.state.as_deref(),
                )
                .await?;
            return Ok(AuthorizeOutcome::Granted {
                code,
                state: request.state.clone(),
            });
        }

        Ok(AuthorizeOutcome::ConsentRequired {
            client_id: client.client_id,
            scope,
            state: request.state.clone(),
        })
    }

    /// Handle a consent decision for a pending authorization request.
    ///
    /// Approval records the grant and issues the code; denial is the
    /// `access_denied` protocol error.
    ///
    /// # Errors
    /// Returns `access_denied` on denial, or the error matching any
    /// re-validation failure
    pub async fn decide_consent(
        &self,
        request: &ConsentRequest,
        user_id: Uuid,
    ) -> FlowResult<AuthorizeOutcome> {
        // Re-validate everything; the form round-trip is untrusted.
        let client = self.clients.get_active_client(&request.client_id).await?;
        ClientValidator::validate_redirect_uri(&client, &request.redirect_uri)?;
        let scope = ClientValidator::resolve_scopes(&client, request.scope.as_deref())?;

        if request.decision != "approve" {
            tracing::info!(user_id = %user_id, client_id = %client.client_id, "consent denied");
            return Err(OAuth2Error::access_denied().into());
        }

        self.consents
            .grant(user_id, &client.client_id, &scope)
            .await?;
        let code = self
            .codes
            .issue_code(
                &client,
                user_id,
                &request.redirect_uri,
                &scope,
                request.code_challenge.as_deref(),
                request.code_challenge_method.as_deref(),
                request.state.as_deref(),
            )
            .await?;
        Ok(AuthorizeOutcome::Granted {
            code,
            state: request.state.clone(),
        })
    }

    /// Handle a token endpoint request for either supported grant
    ///
    /// # Errors
    /// Returns the RFC 6749 error matching the first failed check
    pub async fn token(&self, request: &TokenRequest) -> FlowResult<TokenResponse> {
        let client = self
            .clients
            .authenticate(&request.client_id, request.client_secret.as_deref())
            .await?;

        match request.grant_type.as_str() {
            "authorization_code" => {
                let Some(code) = request.code.as_deref() else {
                    return Err(OAuth2Error::invalid_request("code is required").into());
                };
                let Some(redirect_uri) = request.redirect_uri.as_deref() else {
                    return Err(OAuth2Error::invalid_request("redirect_uri is required").into());
                };
                let record = self
                    .codes
                    .exchange(&client, code, redirect_uri, request.code_verifier.as_deref())
                    .await?;
                Ok(self
                    .tokens
                    .issue_tokens(&client.client_id, record.user_id, &record.scope)
                    .await?)
            }
            "refresh_token" => {
                let Some(refresh_token) = request.refresh_token.as_deref() else {
                    return Err(OAuth2Error::invalid_request("refresh_token is required").into());
                };
                self.tokens
                    .refresh(refresh_token, &client.client_id, request.scope.as_deref())
                    .await
            }
            _ => Err(OAuth2Error::unsupported_grant_type().into()),
        }
    }

    /// Introspect a token (RFC 7662). Infallible: anything that is not
    /// a live token reports `active: false`.
    pub async fn introspect(&self, token: &str) -> IntrospectionResponse {
        self.introspection.introspect(token).await
    }

    /// Revoke a token (RFC 7009). Always succeeds regardless of whether
    /// the token existed, so callers cannot probe token validity.
    ///
    /// # Errors
    /// Returns an error only on store failure
    pub async fn revoke(&self, token: &str, token_type_hint: Option<&str>) -> AppResult<()> {
        self.tokens.revoke(token, token_type_hint).await
    }

    /// RFC 8414 authorization server metadata
    #[must_use]
    pub fn metadata(&self) -> ServerMetadata {
        let issuer = self.config.issuer_url.clone();
        ServerMetadata {
            authorization_endpoint: format!("{issuer}/oauth2/authorize"),
            token_endpoint: format!("{issuer}/oauth2/token"),
            introspection_endpoint: format!("{issuer}/oauth2/introspect"),
            revocation_endpoint: format!("{issuer}/oauth2/revoke"),
            issuer,
            response_types_supported: vec!["code".to_owned()],
            grant_types_supported: vec![
                "authorization_code".to_owned(),
                "refresh_token".to_owned(),
            ],
            code_challenge_methods_supported: vec!["S256".to_owned()],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_post".to_owned(),
                "none".to_owned(),
            ],
            scopes_supported: None,
        }
    }

    /// Issue a platform session token for a user. Session tokens
    /// authenticate the browser at the authorization endpoint and are
    /// signed with the provider key.
    ///
    /// # Errors
    /// Returns an error on signing failure
    pub fn issue_session_token(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iss: self.config.issuer_url.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + SESSION_TTL_MINUTES * 60,
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.config.signing_secret),
        )?)
    }

    /// Authenticate a bearer session token, returning the user id.
    /// Invalid, expired, or foreign-issuer tokens return `None`.
    #[must_use]
    pub fn authenticate_session(&self, bearer: &str) -> Option<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer_url]);
        validation.validate_exp = true;
        let data = decode::<SessionClaims>(
            bearer,
            &DecodingKey::from_secret(&self.config.signing_secret),
            &validation,
        )
        .ok()?;
        Uuid::parse_str(&data.claims.sub).ok()
    }

    /// Delete expired codes and refresh tokens; returns (codes, tokens)
    /// removed. Intended for a periodic housekeeping task.
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn purge_expired(&self) -> AppResult<(u64, u64)> {
        let now = Utc::now();
        let codes = self.code_store.purge_expired_codes(now).await?;
        let tokens = self.token_store.purge_expired_tokens(now).await?;
        if codes > 0 || tokens > 0 {
            tracing::info!(codes, tokens, "purged expired grants");
        }
        Ok((codes, tokens))
    }
}
