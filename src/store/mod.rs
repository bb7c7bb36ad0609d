// ABOUTME: Collaborator storage traits the authorization server is generic over
// ABOUTME: User directory, client registry, code store, token store, and consent store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

//! Storage abstraction.
//!
//! The server core never talks to a database directly; it goes through
//! these traits so the durable store can be swapped per deployment. The
//! bundled implementation is [`sqlite::SqliteStore`].

pub mod sqlite;

use crate::errors::AppResult;
use crate::models::{AuthorizationCode, Consent, OAuthClient, RefreshTokenRecord, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Platform user directory
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by id
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>>;
}

/// Registered client lookup
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Look up a client by its public identifier, regardless of active flag
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn get_client(&self, client_id: &str) -> AppResult<Option<OAuthClient>>;
}

/// Authorization code persistence with atomic single-use consumption
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Persist a newly issued authorization code
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn store_code(&self, code: &AuthorizationCode) -> AppResult<()>;

    /// Atomically mark an unused code as used and return it.
    ///
    /// Returns `None` when the code does not exist or was already
    /// consumed. Under concurrent calls for the same code, at most one
    /// caller receives `Some`.
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn consume_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>>;

    /// Fetch a code without consuming it. Used after a failed consume to
    /// distinguish a replayed code from one that never existed.
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn get_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>>;

    /// Delete expired codes; returns the number removed
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Refresh token persistence with atomic rotation
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a newly issued refresh token record
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn store_refresh_token(&self, token: &RefreshTokenRecord) -> AppResult<()>;

    /// Atomically revoke a live, unexpired refresh token and return its
    /// record, stamping `last_used_at`. Returns `None` when the hash is
    /// unknown, already revoked, or expired. Under concurrent calls for
    /// the same token, at most one caller receives `Some`.
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn consume_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshTokenRecord>>;

    /// Fetch a refresh token record by its hash without consuming it
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn get_refresh_token(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>>;

    /// Fetch a refresh token record by the `jti` correlated with an
    /// access token. Used to check access token revocation status.
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn get_refresh_token_by_jti(&self, jti: Uuid) -> AppResult<Option<RefreshTokenRecord>>;

    /// Mark a refresh token revoked by its hash. Idempotent; succeeds
    /// whether or not the hash exists.
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn revoke_refresh_token(&self, token_hash: &str) -> AppResult<()>;

    /// Revoke every live refresh token for a user; returns the count revoked
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64>;

    /// Delete expired refresh token records; returns the number removed
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Consent grant persistence
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Fetch the consent record for a user/client pair
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn get_consent(&self, user_id: Uuid, client_id: &str) -> AppResult<Option<Consent>>;

    /// Insert or update the consent record for a user/client pair
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn upsert_consent(&self, consent: &Consent) -> AppResult<()>;

    /// Remove the consent record for a user/client pair; returns
    /// whether a record existed
    ///
    /// # Errors
    /// Returns an error on store failure
    async fn revoke_consent(&self, user_id: Uuid, client_id: &str) -> AppResult<bool>;
}
