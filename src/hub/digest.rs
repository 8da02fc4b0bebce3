//! Content checksums.
//!
//! Every piece of content gets two digests computed from the same bytes: a
//! SHA-256 that names blobs, and an MD5 that only exists because the
//! registry still reports it in tag metadata.

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::hub::types::Sha256Digest;

/// both digests of a byte sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub sha256: Sha256Digest,
    pub md5: String,
}

/// compute the primary and secondary digests of `content`
pub fn compute_checksums(content: &[u8]) -> Checksums {
    Checksums {
        sha256: sha256(content),
        md5: hex::encode(Md5::digest(content)),
    }
}

/// compute only the primary digest
pub fn sha256(content: &[u8]) -> Sha256Digest {
    Sha256Digest::from_bytes(&Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        let sums = compute_checksums(b"hello");
        assert_eq!(
            sums.sha256.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(sums.md5, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_deterministic_and_content_sensitive() {
        assert_eq!(compute_checksums(b"echo hi"), compute_checksums(b"echo hi"));
        assert_ne!(sha256(b"echo hi"), sha256(b"echo bye"));
        assert_eq!(sha256(b"echo hi"), compute_checksums(b"echo hi").sha256);
    }
}
