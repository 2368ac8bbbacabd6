// crates/delta-ledger-core/src/core/hashing.rs
// ============================================================================
// Module: Delta Ledger Canonical Hashing
// Description: Canonical JSON hashing for attribute payloads and stored rows.
// Purpose: Provide deterministic digests for idempotent merge decisions.
// Dependencies: serde, serde_jcs, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Attribute payloads are hashed over their RFC 8785 canonical JSON form, so
//! equal attribute maps always produce equal digests regardless of field
//! order or formatting. Digest equality is the no-op test for re-delivered
//! changes and the corruption check for stored dimension rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default hash algorithm for attribute digests.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Maximum canonical size of one attribute payload in bytes.
pub const MAX_ATTRIBUTE_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the stable wire label for the algorithm.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// Hash digest with its algorithm and lowercase hex value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm used to produce the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest value.
    pub value: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Hashing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Canonical JSON serialization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(String),
    /// Canonical payload exceeded the configured size limit.
    #[error("canonical payload too large: {actual} bytes (max {limit})")]
    SizeLimitExceeded {
        /// Maximum allowed bytes.
        limit: usize,
        /// Actual payload size in bytes.
        actual: usize,
    },
}

// ============================================================================
// SECTION: Functions
// ============================================================================

/// Serializes a value to RFC 8785 canonical JSON bytes.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Serializes a value to canonical JSON bytes with a size limit.
///
/// # Errors
///
/// Returns [`HashError`] when serialization fails or the payload exceeds
/// `max_bytes`.
pub fn canonical_json_bytes_with_limit<T: Serialize>(
    value: &T,
    max_bytes: usize,
) -> Result<Vec<u8>, HashError> {
    let bytes = canonical_json_bytes(value)?;
    if bytes.len() > max_bytes {
        return Err(HashError::SizeLimitExceeded {
            limit: max_bytes,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Hashes a value over its canonical JSON form.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn hash_canonical_json<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes a value over its canonical JSON form with a size limit.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails or the payload exceeds
/// `max_bytes`.
pub fn hash_canonical_json_with_limit<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
    max_bytes: usize,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes_with_limit(value, max_bytes)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes raw bytes with the requested algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = Sha256::digest(bytes);
            HashDigest {
                algorithm,
                value: hex_encode(&digest),
            }
        }
    }
}

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
