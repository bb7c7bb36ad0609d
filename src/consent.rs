// ABOUTME: Consent tracking: remembers which scopes a user granted to which client
// ABOUTME: Repeat authorizations skip the consent screen when the grant already covers the request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::crypto::{join_scopes, parse_scopes};
use crate::errors::AppResult;
use crate::models::Consent;
use crate::store::ConsentStore;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Tracks per user/client consent grants
pub struct ConsentManager {
    store: Arc<dyn ConsentStore>,
}

impl ConsentManager {
    /// Create a consent manager over the given consent store
    #[must_use]
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self { store }
    }

    /// True when an existing consent covers every requested scope
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn covers(
        &self,
        user_id: Uuid,
        client_id: &str,
        requested_scope: &str,
    ) -> AppResult<bool> {
        let Some(consent) = self.store.get_consent(user_id, client_id).await? else {
            return Ok(false);
        };
        let granted = parse_scopes(&consent.granted_scopes);
        Ok(parse_scopes(requested_scope).is_subset(&granted))
    }

    /// Record an approval, merging the new scopes into any existing grant
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn grant(&self, user_id: Uuid, client_id: &str, scope: &str) -> AppResult<()> {
        let now = Utc::now();
        let (granted_scopes, granted_at) =
            match self.store.get_consent(user_id, client_id).await? {
                Some(existing) => {
                    let mut merged = parse_scopes(&existing.granted_scopes);
                    merged.extend(parse_scopes(scope));
                    (join_scopes(&merged), existing.granted_at)
                }
                None => (join_scopes(&parse_scopes(scope)), now),
            };
        self.store
            .upsert_consent(&Consent {
                user_id,
                client_id: client_id.to_owned(),
                granted_scopes,
                granted_at,
                updated_at: now,
            })
            .await?;
        tracing::info!(user_id = %user_id, client_id, scope, "consent recorded");
        Ok(())
    }

    /// Remove a user's consent for a client; returns whether a grant
    /// was on file. The next authorization request prompts again.
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn revoke(&self, user_id: Uuid, client_id: &str) -> AppResult<bool> {
        let removed = self.store.revoke_consent(user_id, client_id).await?;
        if removed {
            tracing::info!(user_id = %user_id, client_id, "consent revoked");
        }
        Ok(removed)
    }
}
