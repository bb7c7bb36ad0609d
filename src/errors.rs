// ABOUTME: Infrastructure error types shared across the authorization server
// ABOUTME: Keeps store and crypto failures distinct from caller-facing protocol errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

//! Infrastructure error handling.
//!
//! Protocol errors (RFC 6749 `error`/`error_description` pairs) live in
//! [`crate::models::OAuth2Error`] and are deterministic, caller-facing
//! outcomes. Everything in this module is an infrastructure failure: the
//! durable store timing out, the RNG failing, a misconfigured signing key.
//! These are surfaced to clients as a generic `server_error` so protocol
//! state can never be probed through infrastructure behavior.

use crate::models::OAuth2Error;
use thiserror::Error;

/// Result alias for infrastructure operations
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for protocol flow operations
pub type FlowResult<T> = Result<T, FlowError>;

/// Infrastructure failure inside the authorization server
#[derive(Debug, Error)]
pub enum AppError {
    /// Durable-store failure (query error, connectivity, timeout)
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// A stored record could not be decoded into its domain type
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// System RNG or hashing primitive failure
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// Token signing or decoding infrastructure failure
    #[error("token signing failure: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// A failure during an OAuth flow operation.
///
/// The two arms are kept distinct all the way to the HTTP layer:
/// protocol errors map to deterministic RFC 6749 responses, while
/// infrastructure failures always surface as a generic `server_error`.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Deterministic, caller-facing RFC 6749 error. On the authorize
    /// endpoint these arise after the client and redirect URI have been
    /// validated, so they may be delivered on the redirect URI.
    #[error("oauth error: {}", .0.error)]
    Protocol(OAuth2Error),

    /// Protocol error raised before the client identity or redirect URI
    /// checked out. Must be answered directly; delivering it on the
    /// unvalidated redirect URI would be an open redirect.
    #[error("oauth error: {}", .0.error)]
    Direct(OAuth2Error),

    /// Infrastructure failure; never exposed in detail to callers
    #[error(transparent)]
    Infra(#[from] AppError),
}

impl From<OAuth2Error> for FlowError {
    fn from(e: OAuth2Error) -> Self {
        Self::Protocol(e)
    }
}

impl From<sqlx::Error> for FlowError {
    fn from(e: sqlx::Error) -> Self {
        Self::Infra(AppError::Store(e))
    }
}

impl AppError {
    /// Crypto failure with a context message
    #[must_use]
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    /// Corrupt stored record with a context message
    #[must_use]
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptRecord(msg.into())
    }

    /// Configuration error with a context message
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
