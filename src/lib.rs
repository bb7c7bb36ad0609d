// ABOUTME: Main library entry point for the Harbor embedded OAuth 2.0 authorization server
// ABOUTME: Provides authorization-code + PKCE + refresh-rotation flows with introspection and revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

#![deny(unsafe_code)]

//! # Harbor Auth Server
//!
//! The embedded OAuth 2.0 authorization server ("provider mode") of the Harbor
//! account platform. It issues and validates credentials for third-party
//! clients acting on behalf of a user, independent of the social-login flows
//! elsewhere in the platform.
//!
//! ## Features
//!
//! - **Authorization code flow**: single-use, short-lived codes bound to
//!   client, user, redirect URI, scope, and PKCE challenge
//! - **PKCE (RFC 7636)**: S256-only challenge verification, mandatory for
//!   public clients
//! - **Signed access tokens**: stateless JWTs carrying subject, client,
//!   scope, and issuer claims
//! - **Refresh token rotation**: opaque tokens hashed at rest, atomically
//!   invalidated on every use
//! - **Introspection (RFC 7662)** and **revocation (RFC 7009)**
//! - **Consent tracking**: per user/client scope grants that skip re-prompting
//!
//! ## Architecture
//!
//! - **Models**: protocol request/response types and persisted records
//! - **Crypto**: random generators, token hashing, constant-time comparison
//! - **Store**: durable-store traits plus the SQLite implementation
//! - **Server**: the protocol state machine behind the HTTP endpoints
//! - **Routes**: axum handlers for authorize, consent, token, introspect,
//!   revoke, and RFC 8414 metadata
//!
//! ## Example
//!
//! ```rust,no_run
//! use harbor_auth::config::ProviderConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ProviderConfig::from_env()?;
//!     println!("issuer: {}", config.issuer_url);
//!     Ok(())
//! }
//! ```

/// Registered-client resolution, authentication, and allow-list validation
pub mod clients;

/// Authorization code issuance and single-use exchange
pub mod codes;

/// Provider configuration loaded from the environment
pub mod config;

/// Consent grant recording and subset checks
pub mod consent;

/// Cryptographic primitives: RNG, token hashing, constant-time comparison,
/// scope string handling
pub mod crypto;

/// Infrastructure error handling
pub mod errors;

/// Token and bearer-credential introspection (RFC 7662)
pub mod introspection;

/// Structured logging setup
pub mod logging;

/// Protocol data models and persisted records
pub mod models;

/// PKCE challenge verification (RFC 7636)
pub mod pkce;

/// HTTP route handlers and RFC 8414 discovery metadata
pub mod routes;

/// The authorization server facade wired from the components above
pub mod server;

/// Durable-store contracts and the SQLite implementation
pub mod store;

/// Access token signing and refresh token rotation
pub mod tokens;
