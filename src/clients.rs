// ABOUTME: Client validation: lookup, secret verification, redirect URI and scope checks
// ABOUTME: Confidential clients authenticate with Argon2-hashed secrets, public clients via PKCE
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::crypto::{join_scopes, parse_scopes, verify_client_secret};
use crate::errors::{FlowError, FlowResult};
use crate::models::{ClientType, OAuth2Error, OAuthClient};
use crate::store::ClientStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Validates registered clients, their credentials, redirect URIs, and scopes
pub struct ClientValidator {
    clients: Arc<dyn ClientStore>,
}

impl ClientValidator {
    /// Create a validator over the given client registry
    #[must_use]
    pub fn new(clients: Arc<dyn ClientStore>) -> Self {
        Self { clients }
    }

    /// Look up an active client. Unknown and deactivated clients are
    /// indistinguishable to callers.
    ///
    /// # Errors
    /// Returns `invalid_client` when the client is unknown or inactive
    pub async fn get_active_client(&self, client_id: &str) -> FlowResult<OAuthClient> {
        let client = self.clients.get_client(client_id).await?;
        match client {
            Some(c) if c.is_active => Ok(c),
            Some(_) => {
                tracing::warn!(client_id, "deactivated client attempted access");
                Err(FlowError::Direct(OAuth2Error::invalid_client()))
            }
            None => Err(FlowError::Direct(OAuth2Error::invalid_client())),
        }
    }

    /// Authenticate a client for the token endpoint.
    ///
    /// Confidential clients must present the correct secret. Public
    /// clients have no secret; their proof of possession is PKCE,
    /// enforced at code issuance and exchange.
    ///
    /// # Errors
    /// Returns `invalid_client` on unknown client, missing secret, or
    /// secret mismatch
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> FlowResult<OAuthClient> {
        let client = self.get_active_client(client_id).await?;
        match client.client_type {
            ClientType::Public => Ok(client),
            ClientType::Confidential => {
                let Some(stored_hash) = client.client_secret_hash.as_deref() else {
                    tracing::error!(client_id, "confidential client has no stored secret hash");
                    return Err(FlowError::Direct(OAuth2Error::invalid_client()));
                };
                let Some(presented) = client_secret else {
                    return Err(FlowError::Direct(OAuth2Error::invalid_client()));
                };
                if verify_client_secret(presented, stored_hash) {
                    Ok(client)
                } else {
                    tracing::warn!(client_id, "client secret verification failed");
                    Err(FlowError::Direct(OAuth2Error::invalid_client()))
                }
            }
        }
    }

    /// Validate a redirect URI against the client's registered list.
    /// Matching is exact string comparison; an empty registered list
    /// rejects everything.
    ///
    /// # Errors
    /// Returns `invalid_request` when the URI is not registered
    pub fn validate_redirect_uri(client: &OAuthClient, redirect_uri: &str) -> FlowResult<()> {
        if client.redirect_uris.iter().any(|r| r == redirect_uri) {
            Ok(())
        } else {
            tracing::warn!(
                client_id = %client.client_id,
                redirect_uri,
                "redirect URI not registered for client"
            );
            Err(FlowError::Direct(OAuth2Error::invalid_request(
                "Invalid redirect_uri",
            )))
        }
    }

    /// Resolve the scopes to grant for a request.
    ///
    /// An absent or empty request defaults to the client's full
    /// allow-list. Otherwise the requested scopes are filtered down to
    /// the allow-list and the grant carries the intersection.
    ///
    /// # Errors
    /// Returns `invalid_scope` when filtering leaves no scope at all
    pub fn resolve_scopes(client: &OAuthClient, requested: Option<&str>) -> FlowResult<String> {
        let allowed: BTreeSet<String> = client.allowed_scopes.iter().cloned().collect();
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(join_scopes(&allowed)),
            Some(raw) => {
                let granted: BTreeSet<String> =
                    parse_scopes(raw).intersection(&allowed).cloned().collect();
                if granted.is_empty() {
                    return Err(OAuth2Error::invalid_scope(
                        "None of the requested scopes are allowed for this client",
                    )
                    .into());
                }
                Ok(join_scopes(&granted))
            }
        }
    }
}
