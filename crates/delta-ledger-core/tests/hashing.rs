// crates/delta-ledger-core/tests/hashing.rs
// ============================================================================
// Module: Canonical Hashing Tests
// Description: Canonical JSON digests for attribute payloads.
// Purpose: Validate digest determinism, size limits, and wire labels.
// Dependencies: delta-ledger-core, serde_json
// ============================================================================
//! ## Overview
//! Ensures equal attribute payloads always produce equal digests, distinct
//! payloads differ, oversized payloads are rejected, and digest values use
//! the stable lowercase hex form merge idempotence depends on.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use delta_ledger_core::AttributeMap;
use delta_ledger_core::DEFAULT_HASH_ALGORITHM;
use delta_ledger_core::HashAlgorithm;
use delta_ledger_core::HashError;
use delta_ledger_core::MAX_ATTRIBUTE_BYTES;
use delta_ledger_core::attribute_hash;
use delta_ledger_core::canonical_json_bytes;
use delta_ledger_core::canonical_json_bytes_with_limit;
use delta_ledger_core::hash_bytes;
use delta_ledger_core::hash_canonical_json;
use serde_json::json;

/// Builds an attribute map from name/value pairs.
fn payload(pairs: &[(&str, serde_json::Value)]) -> AttributeMap {
    pairs.iter().map(|(name, value)| ((*name).to_owned(), value.clone())).collect()
}

/// Verifies equal payloads built in different orders hash identically.
#[test]
fn equal_payloads_hash_equal() {
    let first = payload(&[("a", json!(1)), ("b", json!("two"))]);
    let second = payload(&[("b", json!("two")), ("a", json!(1))]);

    let first_digest = attribute_hash(&first).expect("hash first");
    let second_digest = attribute_hash(&second).expect("hash second");
    assert_eq!(first_digest, second_digest);
    assert_eq!(first_digest.algorithm, DEFAULT_HASH_ALGORITHM);
}

/// Verifies distinct payloads produce distinct digests.
#[test]
fn distinct_payloads_hash_differently() {
    let first = payload(&[("tier", json!("bronze"))]);
    let second = payload(&[("tier", json!("silver"))]);

    let first_digest = attribute_hash(&first).expect("hash first");
    let second_digest = attribute_hash(&second).expect("hash second");
    assert_ne!(first_digest, second_digest);
}

/// Verifies the digest value is 64 characters of lowercase hex.
#[test]
fn digest_value_is_lowercase_hex() {
    let digest = attribute_hash(&payload(&[("tier", json!("bronze"))])).expect("hash payload");

    assert_eq!(digest.value.len(), 64);
    assert!(digest.value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(digest.algorithm.label(), "sha256");
}

/// Verifies the raw byte hasher matches the SHA-256 empty-input vector.
#[test]
fn empty_input_matches_known_sha256_vector() {
    let digest = hash_bytes(HashAlgorithm::Sha256, b"");

    assert_eq!(digest.value, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
}

/// Verifies hashing over canonical JSON equals hashing the canonical bytes.
#[test]
fn canonical_hash_matches_canonical_bytes() {
    let value = json!({"b": 2, "a": 1});
    let bytes = canonical_json_bytes(&value).expect("canonical bytes");

    let direct = hash_bytes(HashAlgorithm::Sha256, &bytes);
    let via_json = hash_canonical_json(HashAlgorithm::Sha256, &value).expect("hash json");
    assert_eq!(direct, via_json);
}

/// Verifies the size limit rejects payloads just past the boundary.
#[test]
fn size_limit_is_exact() {
    let value = json!("abc");

    assert!(canonical_json_bytes_with_limit(&value, 5).is_ok());
    let error = canonical_json_bytes_with_limit(&value, 4);
    assert!(matches!(error, Err(HashError::SizeLimitExceeded { limit: 4, actual: 5 })));
}

/// Verifies an oversized attribute payload is rejected with the default limit.
#[test]
fn oversized_attribute_payload_is_rejected() {
    let oversized = payload(&[("blob", json!("x".repeat(MAX_ATTRIBUTE_BYTES + 1)))]);

    let error = attribute_hash(&oversized);
    assert!(matches!(
        error,
        Err(HashError::SizeLimitExceeded { limit: MAX_ATTRIBUTE_BYTES, .. })
    ));
}
