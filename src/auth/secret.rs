//! Checks for the shared secrets that authorize machine-to-machine requests.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use sha2::{Digest, Sha256};

use crate::Error;

/// The header the auth provider puts the webhook secret in.
pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// Check that `provided` matches `expected`.
///
/// The values are compared as SHA-256 digests without short-circuiting.
///
/// # Errors
///
/// Returns [Error::InvalidSecret] if `provided` is missing or does not match.
pub fn verify_secret(provided: Option<&str>, expected: &str) -> Result<(), Error> {
    let provided = provided.ok_or(Error::InvalidSecret)?;

    let provided_digest = Sha256::digest(provided.as_bytes());
    let expected_digest = Sha256::digest(expected.as_bytes());

    let difference = provided_digest
        .iter()
        .zip(expected_digest.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    if difference == 0 {
        Ok(())
    } else {
        Err(Error::InvalidSecret)
    }
}

/// Get the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
