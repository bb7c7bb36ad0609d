// ABOUTME: Token service: signed JWT access tokens and rotating opaque refresh tokens
// ABOUTME: Issuance, rotation with scope narrowing, and RFC 7009 revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::config::ProviderConfig;
use crate::crypto::{generate_random_string, hash_token, parse_scopes};
use crate::errors::{AppResult, FlowResult};
use crate::models::{AccessTokenClaims, OAuth2Error, RefreshTokenRecord, TokenResponse};
use crate::store::TokenStore;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

/// Entropy bytes backing each opaque refresh token
const REFRESH_TOKEN_BYTES: usize = 32;

/// Issues, rotates, and revokes the server's tokens
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    config: ProviderConfig,
}

impl TokenService {
    /// Create a token service over the given token store
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, config: ProviderConfig) -> Self {
        Self { store, config }
    }

    /// Issue an access/refresh token pair for a granted scope.
    ///
    /// The access token is an HS256 JWT carrying the grant; the refresh
    /// token is opaque and persisted only as a SHA-256 hash. The JWT
    /// `jti` claim correlates the pair for revocation checks.
    ///
    /// # Errors
    /// Returns an error on signing or store failure
    pub async fn issue_tokens(
        &self,
        client_id: &str,
        user_id: Uuid,
        scope: &str,
    ) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let jti = Uuid::new_v4();
        let expires_in = self.config.access_token_ttl_minutes * 60;

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            iss: self.config.issuer_url.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + expires_in,
            jti: jti.to_string(),
        };
        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.config.signing_secret),
        )?;

        let refresh_token = generate_random_string(REFRESH_TOKEN_BYTES)?;
        let record = RefreshTokenRecord {
            token_hash: hash_token(&refresh_token),
            jti,
            client_id: client_id.to_owned(),
            user_id,
            scope: scope.to_owned(),
            expires_at: now + Duration::days(self.config.refresh_token_ttl_days),
            revoked: false,
            created_at: now,
            last_used_at: None,
        };
        self.store.store_refresh_token(&record).await?;

        tracing::info!(client_id, user_id = %user_id, jti = %jti, "issued token pair");

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_owned(),
            expires_in,
            scope: scope.to_owned(),
        })
    }

    /// Rotate a refresh token, optionally narrowing scope.
    ///
    /// The presented token is revoked atomically as it is claimed; a
    /// replay or a concurrent second use fails. All failure shapes
    /// return the same uniform error so callers cannot distinguish an
    /// unknown token from a revoked or expired one.
    ///
    /// # Errors
    /// Returns `invalid_grant` for an unknown, revoked, expired, or
    /// cross-client token, `invalid_scope` when the requested scope
    /// exceeds the original grant
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        requested_scope: Option<&str>,
    ) -> FlowResult<TokenResponse> {
        let now = Utc::now();
        let record = self
            .store
            .consume_refresh_token(&hash_token(refresh_token), now)
            .await?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid or expired refresh token"))?;

        if record.client_id != client_id {
            tracing::warn!(
                client_id,
                owner = %record.client_id,
                "refresh token presented by a different client"
            );
            return Err(OAuth2Error::invalid_grant("Invalid or expired refresh token").into());
        }

        let scope = match requested_scope.map(str::trim).filter(|s| !s.is_empty()) {
            None => record.scope.clone(),
            Some(raw) => {
                let requested = parse_scopes(raw);
                let granted = parse_scopes(&record.scope);
                if requested.is_subset(&granted) {
                    raw.to_owned()
                } else {
                    return Err(OAuth2Error::invalid_scope("Cannot expand scope").into());
                }
            }
        };

        Ok(self.issue_tokens(client_id, record.user_id, &scope).await?)
    }

    /// Revoke a token per RFC 7009. The token may be either kind: an
    /// opaque refresh token is revoked by hash, a JWT access token
    /// through its `jti` lineage (access tokens are stateless, so only
    /// the refresh record behind them can be revoked). Unknown and
    /// already-revoked tokens succeed silently; revocation leaks
    /// nothing about token validity. The `token_type_hint` is advisory
    /// and only orders the lookups.
    ///
    /// # Errors
    /// Returns an error only on store failure
    pub async fn revoke(&self, token: &str, token_type_hint: Option<&str>) -> AppResult<()> {
        if token_type_hint == Some("access_token") {
            if self.revoke_access_token(token).await? {
                return Ok(());
            }
            self.revoke_refresh_by_hash(token).await?;
            return Ok(());
        }
        if self.revoke_refresh_by_hash(token).await? {
            return Ok(());
        }
        self.revoke_access_token(token).await?;
        Ok(())
    }

    async fn revoke_refresh_by_hash(&self, token: &str) -> AppResult<bool> {
        let token_hash = hash_token(token);
        let Some(record) = self.store.get_refresh_token(&token_hash).await? else {
            return Ok(false);
        };
        self.store.revoke_refresh_token(&token_hash).await?;
        tracing::info!(client_id = %record.client_id, jti = %record.jti, "refresh token revoked");
        Ok(true)
    }

    async fn revoke_access_token(&self, token: &str) -> AppResult<bool> {
        let Some(claims) = self.decode_access_token(token) else {
            return Ok(false);
        };
        let Ok(jti) = Uuid::parse_str(&claims.jti) else {
            return Ok(false);
        };
        let Some(record) = self.store.get_refresh_token_by_jti(jti).await? else {
            return Ok(false);
        };
        self.store.revoke_refresh_token(&record.token_hash).await?;
        tracing::info!(client_id = %record.client_id, jti = %jti, "access token lineage revoked");
        Ok(true)
    }

    /// Revoke every live refresh token for a user; returns the count
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let count = self.store.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, count, "revoked all refresh tokens for user");
        Ok(count)
    }

    /// Decode and validate an access token's signature, issuer, and
    /// expiry. Returns `None` for anything that does not verify.
    #[must_use]
    pub fn decode_access_token(&self, token: &str) -> Option<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer_url]);
        validation.validate_exp = true;
        decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(&self.config.signing_secret),
            &validation,
        )
        .map(|data| data.claims)
        .ok()
    }
}
