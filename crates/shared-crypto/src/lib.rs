//! # Shared Crypto - Swap Protocol Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | Packet and UTXO signing, order keypairs |
//! | `hashing` | SHA-256d, HASH-160 | Order ids, script hashes, hashed secrets |
//! | `secret` | 32-byte preimage | HTLC secrets, zeroized on drop |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, recoverable 65-byte
//!   signatures compatible with wallet `signmessage` output
//! - **Secrets**: never printed, zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod secret;

pub use ecdsa::{KeyPair, PublicKey, RecoverableSignature, PUBKEY_SIZE, SIGNATURE_SIZE};
pub use errors::CryptoError;
pub use hashing::{hash160, sha256, sha256d, Hash160, Sha256dWriter};
pub use secret::SwapSecret;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
