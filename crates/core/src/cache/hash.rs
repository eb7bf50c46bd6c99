//! Request identity key generation.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request identity.
///
/// Identity is method plus URL; headers never take part in matching.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
