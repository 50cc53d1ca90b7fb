//! Content hashing helpers.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes `payload` chained onto `previous`.
///
/// The first link of a chain has no predecessor and hashes the payload alone,
/// so a chain of one record is still verifiable.
pub fn chain_hash(previous: Option<&str>, payload: &str) -> String {
    match previous {
        Some(prev) => sha256_hex(&format!("{}\n{}", prev, payload)),
        None => sha256_hex(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_chain_hash_without_predecessor_is_plain_hash() {
        assert_eq!(chain_hash(None, "payload"), sha256_hex("payload"));
    }

    #[test]
    fn test_chain_hash_depends_on_predecessor() {
        let a = chain_hash(Some("aaaa"), "payload");
        let b = chain_hash(Some("bbbb"), "payload");
        assert_ne!(a, b);
        assert_ne!(a, chain_hash(None, "payload"));
    }

    #[test]
    fn test_chain_hash_deterministic() {
        assert_eq!(
            chain_hash(Some("prev"), "same"),
            chain_hash(Some("prev"), "same")
        );
    }
}
