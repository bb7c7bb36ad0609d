// ABOUTME: Authorization code lifecycle: issuance with PKCE binding, single-use exchange
// ABOUTME: Codes are consumed atomically so a replayed or raced exchange always fails
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::config::ProviderConfig;
use crate::crypto::generate_random_string;
use crate::errors::FlowResult;
use crate::models::{AuthorizationCode, ClientType, OAuth2Error, OAuthClient};
use crate::pkce;
use crate::store::CodeStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Entropy bytes backing each authorization code
const AUTH_CODE_BYTES: usize = 32;

/// Issues and exchanges single-use authorization codes
pub struct AuthorizationCodeManager {
    store: Arc<dyn CodeStore>,
    config: ProviderConfig,
}

impl AuthorizationCodeManager {
    /// Create a code manager over the given code store
    #[must_use]
    pub fn new(store: Arc<dyn CodeStore>, config: ProviderConfig) -> Self {
        Self { store, config }
    }

    /// Issue an authorization code bound to a client, user, redirect URI,
    /// and scope.
    ///
    /// PKCE is mandatory for public clients and optional for
    /// confidential ones; when a challenge is supplied the method must
    /// be `S256`.
    ///
    /// # Errors
    /// Returns `invalid_request` when a public client omits the
    /// challenge or the method is unsupported
    #[allow(clippy::too_many_arguments)]
    pub async fn issue_code(
        &self,
        client: &OAuthClient,
        user_id: Uuid,
        redirect_uri: &str,
        scope: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
        state: Option<&str>,
    ) -> FlowResult<String> {
        if client.client_type == ClientType::Public && code_challenge.is_none() {
            return Err(OAuth2Error::invalid_request(
                "PKCE code_challenge is required for public clients",
            )
            .into());
        }
        if let Some(challenge) = code_challenge {
            if challenge.is_empty() {
                return Err(
                    OAuth2Error::invalid_request("code_challenge must not be empty").into(),
                );
            }
            if code_challenge_method.unwrap_or("") != "S256" {
                return Err(OAuth2Error::invalid_request(
                    "Only the S256 code_challenge_method is supported",
                )
                .into());
            }
        }

        let code = generate_random_string(AUTH_CODE_BYTES)?;
        let record = AuthorizationCode {
            code: code.clone(),
            client_id: client.client_id.clone(),
            user_id,
            redirect_uri: redirect_uri.to_owned(),
            scope: scope.to_owned(),
            code_challenge: code_challenge.map(std::borrow::ToOwned::to_owned),
            code_challenge_method: code_challenge
                .is_some()
                .then(|| "S256".to_owned()),
            state: state.map(std::borrow::ToOwned::to_owned),
            expires_at: Utc::now() + Duration::minutes(self.config.auth_code_ttl_minutes),
            used: false,
        };
        self.store.store_code(&record).await?;

        tracing::info!(
            client_id = %client.client_id,
            user_id = %user_id,
            pkce = code_challenge.is_some(),
            "issued authorization code"
        );
        Ok(code)
    }

    /// Exchange an authorization code, consuming it.
    ///
    /// The code is claimed atomically before any other check, so a
    /// failed exchange (bad verifier, wrong redirect URI) still burns
    /// the code and a concurrent duplicate exchange has exactly one
    /// winner.
    ///
    /// # Errors
    /// Returns `invalid_grant` for unknown, replayed, expired, or
    /// mismatched codes and for missing or failed PKCE verification
    pub async fn exchange(
        &self,
        client: &OAuthClient,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> FlowResult<AuthorizationCode> {
        let Some(record) = self.store.consume_code(code).await? else {
            // Distinguish replay from a code that never existed; a
            // replayed code is a possible interception signal.
            if self.store.get_code(code).await?.is_some() {
                tracing::warn!(client_id = %client.client_id, "authorization code replay detected");
                return Err(
                    OAuth2Error::invalid_grant("Authorization code has already been used").into(),
                );
            }
            return Err(OAuth2Error::invalid_grant("Invalid authorization code").into());
        };

        if record.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                issued_to = %record.client_id,
                "authorization code presented by a different client"
            );
            return Err(OAuth2Error::invalid_grant("Invalid authorization code").into());
        }

        if record.expires_at <= Utc::now() {
            return Err(OAuth2Error::invalid_grant("Authorization code expired").into());
        }

        if record.redirect_uri != redirect_uri {
            return Err(OAuth2Error::invalid_grant("redirect_uri mismatch").into());
        }

        if let Some(challenge) = record.code_challenge.as_deref() {
            // Missing and wrong verifiers are indistinguishable on purpose.
            let method = record.code_challenge_method.as_deref().unwrap_or("S256");
            let verified = code_verifier
                .is_some_and(|verifier| pkce::verify_challenge(verifier, challenge, method));
            if !verified {
                tracing::warn!(client_id = %client.client_id, "PKCE verification failed");
                return Err(OAuth2Error::invalid_grant("Invalid code_verifier").into());
            }
        }

        Ok(record)
    }
}
