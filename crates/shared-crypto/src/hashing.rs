//! # Protocol Hashing
//!
//! SHA-256d (double SHA-256) for order ids and transaction identifiers,
//! HASH-160 (RIPEMD-160 of SHA-256) for script hashes and hashed secrets.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// A 20-byte HASH-160 digest.
pub type Hash160 = [u8; 20];

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// HASH-160: RIPEMD-160 over SHA-256.
pub fn hash160(data: &[u8]) -> Hash160 {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// Incremental SHA-256d writer for multi-field digests.
pub struct Sha256dWriter {
    inner: Sha256,
}

impl Sha256dWriter {
    /// Start a fresh digest.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Append raw bytes.
    pub fn write(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finish the double hash.
    pub fn finalize(self) -> [u8; 32] {
        Sha256::digest(self.inner.finalize()).into()
    }
}

impl Default for Sha256dWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256d_deterministic() {
        assert_eq!(sha256d(b"test"), sha256d(b"test"));
        assert_ne!(sha256d(b"a"), sha256d(b"b"));
    }

    #[test]
    fn test_sha256d_is_double_hash() {
        let once = sha256(b"hello");
        assert_eq!(sha256d(b"hello"), sha256(&once));
    }

    #[test]
    fn test_hash160_length_and_composition() {
        let h = hash160(b"script bytes");
        assert_eq!(h.len(), 20);
        let expected: Hash160 = Ripemd160::digest(Sha256::digest(b"script bytes")).into();
        assert_eq!(h, expected);
    }

    #[test]
    fn test_writer_matches_oneshot() {
        let mut w = Sha256dWriter::new();
        w.write(b"hello ").write(b"world");
        assert_eq!(w.finalize(), sha256d(b"hello world"));
    }
}
