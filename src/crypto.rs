// ABOUTME: Cryptographic primitives shared across the authorization server
// ABOUTME: Secure randomness, token hashing for storage, constant-time comparison, scope strings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::errors::{AppError, AppResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use subtle::ConstantTimeEq;

/// Generate a URL-safe random string backed by `length` bytes of system
/// entropy. Used for authorization codes and refresh tokens.
///
/// # Errors
/// Returns an error if the system RNG fails - the server cannot operate
/// securely without working randomness, so there is no fallback.
pub fn generate_random_string(length: usize) -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!("CRITICAL: SystemRandom failed - cannot generate secure random bytes: {e}");
        AppError::crypto("system RNG failure")
    })?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
}

/// SHA-256 hash of a bearer token, hex-encoded, for at-rest storage and
/// lookup. Plaintext refresh tokens are never persisted.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time equality for secrets and secret-derived strings
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Hash a client secret for storage using Argon2id with a random salt
///
/// # Errors
/// Returns an error if Argon2 hashing fails
pub fn hash_client_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AppError::crypto(format!("argon2 hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a presented client secret against its stored Argon2 hash
#[must_use]
pub fn verify_client_secret(secret: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::error!("Failed to parse stored client secret hash");
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

/// Parse a space-delimited scope string into a deduplicated, ordered set
#[must_use]
pub fn parse_scopes(scope: &str) -> BTreeSet<String> {
    scope
        .split_whitespace()
        .map(std::string::ToString::to_string)
        .collect()
}

/// Join a scope set back into the space-delimited wire form
#[must_use]
pub fn join_scopes(scopes: &BTreeSet<String>) -> String {
    scopes.iter().cloned().collect::<Vec<_>>().join(" ")
}

/// True iff `requested` is a subset of `granted`
#[must_use]
pub fn scopes_subset(requested: &BTreeSet<String>, granted: &BTreeSet<String>) -> bool {
    requested.is_subset(granted)
}
