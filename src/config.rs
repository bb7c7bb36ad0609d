// ABOUTME: Environment configuration for the OAuth provider: issuer, signing key, TTLs
// ABOUTME: Loaded once at startup and passed explicitly into each component
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

//! Provider configuration.
//!
//! The issuer URL, signing key, and token lifetimes are explicit,
//! read-only configuration handed to each component at construction.
//! Nothing here is ambient or global, which keeps per-environment issuer
//! setups and tests straightforward.

use anyhow::{Context, Result};
use std::env;

/// Default access token lifetime in minutes
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 60;
/// Default authorization code lifetime in minutes
pub const DEFAULT_AUTH_CODE_TTL_MINUTES: i64 = 10;
/// Default refresh token lifetime in days
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Minimum accepted signing secret length in bytes.
/// HS256 keys shorter than the hash output weaken the MAC.
const MIN_SIGNING_SECRET_BYTES: usize = 32;

/// Read-only provider configuration shared by every component
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Issuer URL placed in the `iss` claim and RFC 8414 metadata
    pub issuer_url: String,
    /// HMAC key for access token signing (HS256)
    pub signing_secret: Vec<u8>,
    /// Access token lifetime in minutes
    pub access_token_ttl_minutes: i64,
    /// Authorization code lifetime in minutes
    pub auth_code_ttl_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_token_ttl_days: i64,
    /// Database connection URL
    pub database_url: String,
    /// HTTP listen address
    pub http_bind: String,
}

impl ProviderConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `HARBOR_SIGNING_SECRET` is missing or too short,
    /// or if a TTL override does not parse as an integer
    pub fn from_env() -> Result<Self> {
        let issuer_url = env::var("HARBOR_ISSUER_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_owned())
            .trim_end_matches('/')
            .to_owned();

        let signing_secret = env::var("HARBOR_SIGNING_SECRET")
            .context("HARBOR_SIGNING_SECRET must be set")?
            .into_bytes();
        if signing_secret.len() < MIN_SIGNING_SECRET_BYTES {
            anyhow::bail!(
                "HARBOR_SIGNING_SECRET must be at least {MIN_SIGNING_SECRET_BYTES} bytes"
            );
        }

        let access_token_ttl_minutes = env_i64(
            "HARBOR_ACCESS_TOKEN_TTL_MINUTES",
            DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
        )?;
        let auth_code_ttl_minutes =
            env_i64("HARBOR_AUTH_CODE_TTL_MINUTES", DEFAULT_AUTH_CODE_TTL_MINUTES)?;
        let refresh_token_ttl_days = env_i64(
            "HARBOR_REFRESH_TOKEN_TTL_DAYS",
            DEFAULT_REFRESH_TOKEN_TTL_DAYS,
        )?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/harbor-auth.db".to_owned());

        let http_bind = env::var("HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8081".to_owned());

        Ok(Self {
            issuer_url,
            signing_secret,
            access_token_ttl_minutes,
            auth_code_ttl_minutes,
            refresh_token_ttl_days,
            database_url,
            http_bind,
        })
    }

    /// Configuration for tests: fixed issuer, in-memory database, short names
    #[must_use]
    pub fn for_tests(signing_secret: &[u8]) -> Self {
        Self {
            issuer_url: "https://auth.harbor.test".to_owned(),
            signing_secret: signing_secret.to_vec(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            auth_code_ttl_minutes: DEFAULT_AUTH_CODE_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            database_url: "sqlite::memory:".to_owned(),
            http_bind: "127.0.0.1:0".to_owned(),
        }
    }
}

/// Parse an integer environment override with a default
fn env_i64(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("{name} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
