// ABOUTME: SQLite-backed implementation of the storage traits via sqlx
// ABOUTME: Schema migration, manual row mapping, and atomic UPDATE..RETURNING consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::errors::{AppError, AppResult};
use crate::models::{
    AuthorizationCode, ClientType, Consent, OAuthClient, RefreshTokenRecord, User,
};
use crate::store::{ClientStore, CodeStore, ConsentStore, TokenStore, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// SQLite-backed store implementing every storage trait
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the database at `database_url`, creating the file if needed
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connection fails
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests. A single connection is required because
    /// each SQLite memory connection gets its own private database.
    ///
    /// # Errors
    /// Returns an error if the connection fails
    pub async fn in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the schema if it does not exist
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_clients (
                client_id TEXT PRIMARY KEY,
                client_secret_hash TEXT,
                client_type TEXT NOT NULL,
                redirect_uris TEXT NOT NULL,
                allowed_scopes TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_auth_codes (
                code TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                scope TEXT NOT NULL,
                code_challenge TEXT,
                code_challenge_method TEXT,
                state TEXT,
                expires_at TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_refresh_tokens (
                token_hash TEXT PRIMARY KEY,
                jti TEXT NOT NULL UNIQUE,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                scope TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                revoked INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used_at TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_consents (
                user_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                granted_scopes TEXT NOT NULL,
                granted_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, client_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!("database schema ready");
        Ok(())
    }

    /// Register a client. Used by deployment seeding and tests; dynamic
    /// registration (RFC 7591) is deliberately not exposed over HTTP.
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn store_client(&self, client: &OAuthClient) -> AppResult<()> {
        let redirect_uris = serde_json::to_string(&client.redirect_uris)
            .map_err(|e| AppError::corrupt(format!("redirect_uris encode: {e}")))?;
        let allowed_scopes = serde_json::to_string(&client.allowed_scopes)
            .map_err(|e| AppError::corrupt(format!("allowed_scopes encode: {e}")))?;

        sqlx::query(
            r"
            INSERT OR REPLACE INTO oauth_clients
                (client_id, client_secret_hash, client_type, redirect_uris,
                 allowed_scopes, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(client.client_type.as_str())
        .bind(redirect_uris)
        .bind(allowed_scopes)
        .bind(client.is_active)
        .bind(client.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Register a user. Used by deployment seeding and tests.
    ///
    /// # Errors
    /// Returns an error on store failure
    pub async fn store_user(&self, user: &User) -> AppResult<()> {
        sqlx::query("INSERT OR REPLACE INTO users (id, is_active) VALUES (?, ?)")
            .bind(user.id.to_string())
            .bind(user.is_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_uuid(raw: &str, column: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::corrupt(format!("{column} is not a uuid: {e}")))
}

fn map_client_row(row: &SqliteRow) -> AppResult<OAuthClient> {
    let client_type_raw: String = row.try_get("client_type")?;
    let client_type = ClientType::parse(&client_type_raw)
        .ok_or_else(|| AppError::corrupt(format!("unknown client_type {client_type_raw:?}")))?;
    let redirect_uris_raw: String = row.try_get("redirect_uris")?;
    let redirect_uris: Vec<String> = serde_json::from_str(&redirect_uris_raw)
        .map_err(|e| AppError::corrupt(format!("redirect_uris decode: {e}")))?;
    let allowed_scopes_raw: String = row.try_get("allowed_scopes")?;
    let allowed_scopes: Vec<String> = serde_json::from_str(&allowed_scopes_raw)
        .map_err(|e| AppError::corrupt(format!("allowed_scopes decode: {e}")))?;

    Ok(OAuthClient {
        client_id: row.try_get("client_id")?,
        client_secret_hash: row.try_get("client_secret_hash")?,
        client_type,
        redirect_uris,
        allowed_scopes,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_code_row(row: &SqliteRow) -> AppResult<AuthorizationCode> {
    let user_id_raw: String = row.try_get("user_id")?;
    Ok(AuthorizationCode {
        code: row.try_get("code")?,
        client_id: row.try_get("client_id")?,
        user_id: parse_uuid(&user_id_raw, "user_id")?,
        redirect_uri: row.try_get("redirect_uri")?,
        scope: row.try_get("scope")?,
        code_challenge: row.try_get("code_challenge")?,
        code_challenge_method: row.try_get("code_challenge_method")?,
        state: row.try_get("state")?,
        expires_at: row.try_get("expires_at")?,
        used: row.try_get("used")?,
    })
}

fn map_token_row(row: &SqliteRow) -> AppResult<RefreshTokenRecord> {
    let jti_raw: String = row.try_get("jti")?;
    let user_id_raw: String = row.try_get("user_id")?;
    Ok(RefreshTokenRecord {
        token_hash: row.try_get("token_hash")?,
        jti: parse_uuid(&jti_raw, "jti")?,
        client_id: row.try_get("client_id")?,
        user_id: parse_uuid(&user_id_raw, "user_id")?,
        scope: row.try_get("scope")?,
        expires_at: row.try_get("expires_at")?,
        revoked: row.try_get("revoked")?,
        created_at: row.try_get("created_at")?,
        last_used_at: row.try_get("last_used_at")?,
    })
}

fn map_consent_row(row: &SqliteRow) -> AppResult<Consent> {
    let user_id_raw: String = row.try_get("user_id")?;
    Ok(Consent {
        user_id: parse_uuid(&user_id_raw, "user_id")?,
        client_id: row.try_get("client_id")?,
        granted_scopes: row.try_get("granted_scopes")?,
        granted_at: row.try_get("granted_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT id, is_active FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let id_raw: String = r.try_get("id")?;
            Ok(User {
                id: parse_uuid(&id_raw, "id")?,
                is_active: r.try_get("is_active")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl ClientStore for SqliteStore {
    async fn get_client(&self, client_id: &str) -> AppResult<Option<OAuthClient>> {
        let row = sqlx::query(
            r"
            SELECT client_id, client_secret_hash, client_type, redirect_uris,
                   allowed_scopes, is_active, created_at
            FROM oauth_clients WHERE client_id = ?
            ",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_client_row(&r)).transpose()
    }
}

#[async_trait]
impl CodeStore for SqliteStore {
    async fn store_code(&self, code: &AuthorizationCode) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_auth_codes
                (code, client_id, user_id, redirect_uri, scope, code_challenge,
                 code_challenge_method, state, expires_at, used)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id.to_string())
        .bind(&code.redirect_uri)
        .bind(&code.scope)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(&code.state)
        .bind(code.expires_at)
        .bind(code.used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>> {
        // The WHERE used = 0 guard makes this a compare-and-set: under
        // concurrent exchanges of the same code, exactly one UPDATE
        // matches and returns the row.
        let row = sqlx::query(
            r"
            UPDATE oauth_auth_codes SET used = 1
            WHERE code = ? AND used = 0
            RETURNING code, client_id, user_id, redirect_uri, scope,
                      code_challenge, code_challenge_method, state, expires_at, used
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_code_row(&r)).transpose()
    }

    async fn get_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>> {
        let row = sqlx::query(
            r"
            SELECT code, client_id, user_id, redirect_uri, scope, code_challenge,
                   code_challenge_method, state, expires_at, used
            FROM oauth_auth_codes WHERE code = ?
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_code_row(&r)).transpose()
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM oauth_auth_codes WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn store_refresh_token(&self, token: &RefreshTokenRecord) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_refresh_tokens
                (token_hash, jti, client_id, user_id, scope, expires_at,
                 revoked, created_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&token.token_hash)
        .bind(token.jti.to_string())
        .bind(&token.client_id)
        .bind(token.user_id.to_string())
        .bind(&token.scope)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.created_at)
        .bind(token.last_used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshTokenRecord>> {
        // Rotation: the old token is revoked in the same statement that
        // claims it, so a concurrently replayed token loses the race.
        let row = sqlx::query(
            r"
            UPDATE oauth_refresh_tokens SET revoked = 1, last_used_at = ?
            WHERE token_hash = ? AND revoked = 0 AND expires_at > ?
            RETURNING token_hash, jti, client_id, user_id, scope, expires_at,
                      revoked, created_at, last_used_at
            ",
        )
        .bind(now)
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_token_row(&r)).transpose()
    }

    async fn get_refresh_token(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query(
            r"
            SELECT token_hash, jti, client_id, user_id, scope, expires_at,
                   revoked, created_at, last_used_at
            FROM oauth_refresh_tokens WHERE token_hash = ?
            ",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_token_row(&r)).transpose()
    }

    async fn get_refresh_token_by_jti(&self, jti: Uuid) -> AppResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query(
            r"
            SELECT token_hash, jti, client_id, user_id, scope, expires_at,
                   revoked, created_at, last_used_at
            FROM oauth_refresh_tokens WHERE jti = ?
            ",
        )
        .bind(jti.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_token_row(&r)).transpose()
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE oauth_refresh_tokens SET revoked = 1 WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE oauth_refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0",
        )
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM oauth_refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ConsentStore for SqliteStore {
    async fn get_consent(&self, user_id: Uuid, client_id: &str) -> AppResult<Option<Consent>> {
        let row = sqlx::query(
            r"
            SELECT user_id, client_id, granted_scopes, granted_at, updated_at
            FROM oauth_consents WHERE user_id = ? AND client_id = ?
            ",
        )
        .bind(user_id.to_string())
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_consent_row(&r)).transpose()
    }

    async fn upsert_consent(&self, consent: &Consent) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_consents (user_id, client_id, granted_scopes, granted_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, client_id)
            DO UPDATE SET granted_scopes = excluded.granted_scopes,
                          updated_at = excluded.updated_at
            ",
        )
        .bind(consent.user_id.to_string())
        .bind(&consent.client_id)
        .bind(&consent.granted_scopes)
        .bind(consent.granted_at)
        .bind(consent.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_consent(&self, user_id: Uuid, client_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM oauth_consents WHERE user_id = ? AND client_id = ?")
            .bind(user_id.to_string())
            .bind(client_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;

    fn sample_code(code: &str) -> AuthorizationCode {
        AuthorizationCode {
            code: code.to_owned(),
            client_id: "client-a".to_owned(),
            user_id: Uuid::new_v4(),
            redirect_uri: "https://app.example.com/cb".to_owned(),
            scope: "read".to_owned(),
            code_challenge: Some("challenge".to_owned()),
            code_challenge_method: Some("S256".to_owned()),
            state: None,
            expires_at: Utc::now() + Duration::minutes(10),
            used: false,
        }
    }

    #[tokio::test]
    async fn test_file_backed_connect_and_client_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}/store.db", dir.path().display());
        let store = SqliteStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();

        let client = OAuthClient {
            client_id: "client-a".to_owned(),
            client_secret_hash: Some("$argon2id$stub".to_owned()),
            client_type: ClientType::Confidential,
            redirect_uris: vec!["https://app.example.com/cb".to_owned()],
            allowed_scopes: vec!["read".to_owned(), "write".to_owned()],
            is_active: true,
            created_at: Utc::now(),
        };
        store.store_client(&client).await.unwrap();

        let loaded = store.get_client("client-a").await.unwrap().unwrap();
        assert_eq!(loaded.client_type, ClientType::Confidential);
        assert_eq!(loaded.redirect_uris, client.redirect_uris);
        assert_eq!(loaded.allowed_scopes, client.allowed_scopes);
        assert!(store.get_client("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consume_code_is_single_use() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.store_code(&sample_code("abc")).await.unwrap();

        let first = store.consume_code("abc").await.unwrap();
        assert!(first.is_some());
        let second = store.consume_code("abc").await.unwrap();
        assert!(second.is_none());

        // The record survives, marked used.
        let record = store.get_code("abc").await.unwrap().unwrap();
        assert!(record.used);
    }

    #[tokio::test]
    async fn test_consume_refresh_token_stamps_last_used() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = RefreshTokenRecord {
            token_hash: "hash-a".to_owned(),
            jti: Uuid::new_v4(),
            client_id: "client-a".to_owned(),
            user_id: Uuid::new_v4(),
            scope: "read".to_owned(),
            expires_at: Utc::now() + Duration::days(30),
            revoked: false,
            created_at: Utc::now(),
            last_used_at: None,
        };
        store.store_refresh_token(&record).await.unwrap();

        let consumed = store
            .consume_refresh_token("hash-a", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(consumed.last_used_at.is_some());
        assert!(store
            .consume_refresh_token("hash-a", Utc::now())
            .await
            .unwrap()
            .is_none());
    }
}
