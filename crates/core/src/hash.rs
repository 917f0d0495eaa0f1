//! Content hashing.
//!
//! `contentHash = SHA-256(content bytes)` (spec.md I5). File hashes use the
//! same primitive so `FileRecord`/`Chunk` hashes are always comparable
//! without a second hashing scheme in play.

use sha2::{Digest, Sha256};

/// Lowercase hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_sha256() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn deterministic_and_sensitive_to_every_byte() {
        let a = sha256_hex(b"fn foo() {}");
        let b = sha256_hex(b"fn foo() {}");
        let c = sha256_hex(b"fn foo() { }");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
