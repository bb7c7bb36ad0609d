// ABOUTME: RFC 7662 token introspection over both token kinds
// ABOUTME: Infallible by design: every failure shape collapses to the inactive response
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::crypto::hash_token;
use crate::models::IntrospectionResponse;
use crate::store::TokenStore;
use crate::tokens::TokenService;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Answers "is this token active right now" for resource servers
pub struct IntrospectionService {
    tokens: Arc<TokenService>,
    store: Arc<dyn TokenStore>,
}

impl IntrospectionService {
    /// Create an introspection service
    #[must_use]
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn TokenStore>) -> Self {
        Self { tokens, store }
    }

    /// Introspect a token of either kind.
    ///
    /// This never returns an error: malformed tokens, unknown tokens,
    /// and store failures all collapse to `active: false`. A resource
    /// server must fail closed, and an attacker must not be able to
    /// distinguish "never existed" from "revoked" from "store down".
    pub async fn introspect(&self, token: &str) -> IntrospectionResponse {
        if let Some(claims) = self.tokens.decode_access_token(token) {
            return self.introspect_access_token(&claims).await;
        }
        self.introspect_refresh_token(token).await
    }

    async fn introspect_access_token(
        &self,
        claims: &crate::models::AccessTokenClaims,
    ) -> IntrospectionResponse {
        // Signature, issuer, and expiry already verified by decode.
        // Revocation is visible through the correlated refresh record.
        let Ok(jti) = Uuid::parse_str(&claims.jti) else {
            return IntrospectionResponse::inactive();
        };
        match self.store.get_refresh_token_by_jti(jti).await {
            Ok(Some(record)) if record.revoked => IntrospectionResponse::inactive(),
            Ok(_) => IntrospectionResponse {
                active: true,
                scope: Some(claims.scope.clone()),
                client_id: Some(claims.client_id.clone()),
                sub: Some(claims.sub.clone()),
                token_type: Some("access_token".to_owned()),
                exp: Some(claims.exp),
            },
            Err(e) => {
                tracing::error!(error = %e, "introspection store lookup failed, reporting inactive");
                IntrospectionResponse::inactive()
            }
        }
    }

    async fn introspect_refresh_token(&self, token: &str) -> IntrospectionResponse {
        match self.store.get_refresh_token(&hash_token(token)).await {
            Ok(Some(record)) if !record.revoked && record.expires_at > Utc::now() => {
                IntrospectionResponse {
                    active: true,
                    scope: Some(record.scope),
                    client_id: Some(record.client_id),
                    sub: Some(record.user_id.to_string()),
                    token_type: Some("refresh_token".to_owned()),
                    exp: Some(record.expires_at.timestamp()),
                }
            }
            Ok(_) => IntrospectionResponse::inactive(),
            Err(e) => {
                tracing::error!(error = %e, "introspection store lookup failed, reporting inactive");
                IntrospectionResponse::inactive()
            }
        }
    }
}
