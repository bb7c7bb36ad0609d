// ABOUTME: PKCE (RFC 7636) challenge verification for the authorization code flow
// ABOUTME: S256 challenge computation, verifier format checks, fail-closed on unknown methods
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use crate::crypto::constant_time_eq;
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

/// Minimum code verifier length (RFC 7636 §4.1)
const MIN_VERIFIER_LENGTH: usize = 43;
/// Maximum code verifier length (RFC 7636 §4.1)
const MAX_VERIFIER_LENGTH: usize = 128;

/// Compute the S256 challenge for a code verifier:
/// `BASE64URL-ENCODE(SHA256(ASCII(code_verifier)))`, unpadded.
#[must_use]
pub fn compute_s256_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Check the RFC 7636 verifier grammar: 43-128 characters from the
/// unreserved set `[A-Za-z0-9-._~]`.
#[must_use]
pub fn verifier_format_valid(verifier: &str) -> bool {
    (MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&verifier.len())
        && verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

/// Verify a presented code verifier against the stored challenge.
///
/// Only `S256` is accepted at issuance, but stored records are verified
/// by whatever method they carry: `S256` hashes the verifier and compares,
/// `plain` compares directly. Any other method fails closed. Both paths
/// use constant-time comparison.
#[must_use]
pub fn verify_challenge(verifier: &str, challenge: &str, method: &str) -> bool {
    if !verifier_format_valid(verifier) {
        return false;
    }
    match method {
        "S256" => constant_time_eq(&compute_s256_challenge(verifier), challenge),
        "plain" => constant_time_eq(verifier, challenge),
        other => {
            tracing::warn!(method = other, "unknown PKCE challenge method rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 appendix B test vector
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_s256_rfc_vector() {
        assert_eq!(compute_s256_challenge(RFC_VERIFIER), RFC_CHALLENGE);
        assert!(verify_challenge(RFC_VERIFIER, RFC_CHALLENGE, "S256"));
    }

    #[test]
    fn test_wrong_verifier_rejected() {
        let wrong = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        assert!(!verify_challenge(wrong, RFC_CHALLENGE, "S256"));
    }

    #[test]
    fn test_unknown_method_fails_closed() {
        assert!(!verify_challenge(RFC_VERIFIER, RFC_CHALLENGE, "S512"));
        assert!(!verify_challenge(RFC_VERIFIER, RFC_CHALLENGE, ""));
    }

    #[test]
    fn test_plain_method_compares_directly() {
        let verifier = "plain-verifier-value-that-is-long-enough-to-pass";
        assert!(verify_challenge(verifier, verifier, "plain"));
        assert!(!verify_challenge(verifier, "something-else-entirely-but-also-long-enough", "plain"));
    }

    #[test]
    fn test_verifier_format_bounds() {
        assert!(!verifier_format_valid("too-short"));
        assert!(verifier_format_valid(&"a".repeat(43)));
        assert!(verifier_format_valid(&"a".repeat(128)));
        assert!(!verifier_format_valid(&"a".repeat(129)));
        assert!(!verifier_format_valid(&format!("{}!", "a".repeat(50))));
    }
}
