//! Content hashing over canonical JSON.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the compact, key-sorted JSON encoding of `value`.
///
/// `serde_json` objects are ordered maps, so two records with the same fields
/// hash identically regardless of insertion order.
#[must_use]
pub fn content_hash(value: &Value) -> String {
    let canonical = value.to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}
