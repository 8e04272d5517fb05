//! # Crypto Errors

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Public key bytes do not describe a point on the curve.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Private key bytes are out of range for the curve.
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Signature bytes are malformed.
    #[error("invalid signature encoding")]
    InvalidSignature,

    /// The signature does not verify under the given key.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// Signing failed (should not happen with a valid key).
    #[error("signing failed")]
    SigningFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CryptoError::SignatureVerificationFailed.to_string(),
            "signature verification failed"
        );
    }
}
