//! # Swap Secret
//!
//! The HTLC preimage chosen by the Maker. The hashed form placed in both
//! deposit scripts is the HASH-160 of the preimage, so a revealed secret is
//! checkable by any party holding either script.
//!
//! ## Security
//!
//! The preimage is worth the full trade amount while the swap is in flight;
//! it must not linger in memory or appear in logs. This wrapper zeroizes on
//! drop and never prints the value.

use crate::hashing::{hash160, Hash160};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an HTLC secret preimage.
pub const SECRET_SIZE: usize = 32;

/// A swap secret that zeroizes on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SwapSecret {
    inner: [u8; SECRET_SIZE],
}

impl SwapSecret {
    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        Self {
            inner: rand::random(),
        }
    }

    /// Wrap existing preimage bytes.
    pub fn from_bytes(bytes: [u8; SECRET_SIZE]) -> Self {
        Self { inner: bytes }
    }

    /// Wrap a slice (copies into a fixed array).
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != SECRET_SIZE {
            return None;
        }
        let mut inner = [0u8; SECRET_SIZE];
        inner.copy_from_slice(slice);
        Some(Self { inner })
    }

    /// The hashed form placed in HTLC scripts.
    pub fn hashed(&self) -> Hash160 {
        hash160(&self.inner)
    }

    /// Check this preimage against a hashed secret.
    pub fn matches(&self, hashed: &Hash160) -> bool {
        self.hashed() == *hashed
    }

    /// Expose the preimage bytes (use immediately, do not retain).
    pub fn expose(&self) -> &[u8; SECRET_SIZE] {
        &self.inner
    }
}

impl std::fmt::Debug for SwapSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the preimage.
        f.write_str("SwapSecret(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        assert_ne!(SwapSecret::generate().inner, SwapSecret::generate().inner);
    }

    #[test]
    fn test_hashed_matches() {
        let secret = SwapSecret::generate();
        let hashed = secret.hashed();
        assert!(secret.matches(&hashed));
        assert!(!SwapSecret::generate().matches(&hashed));
    }

    #[test]
    fn test_from_slice_wrong_length() {
        assert!(SwapSecret::from_slice(&[1u8; 16]).is_none());
        assert!(SwapSecret::from_slice(&[1u8; 32]).is_some());
    }

    #[test]
    fn test_debug_hides_value() {
        let secret = SwapSecret::from_bytes([0xAB; 32]);
        let s = format!("{:?}", secret);
        assert!(!s.contains("ab"));
        assert!(s.contains("***"));
    }
}
