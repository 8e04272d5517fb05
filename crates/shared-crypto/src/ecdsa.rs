//! # ECDSA Signatures (secp256k1)
//!
//! Keypairs and recoverable signatures for packet authentication and
//! per-order trader identities.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - 65-byte recoverable form (`r || s || recovery_id`) on the wire
//! - Secret key material zeroized on drop

use crate::errors::CryptoError;
use k256::ecdsa::{
    signature::Verifier, RecoveryId, Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

/// Size of a compressed secp256k1 public key.
pub const PUBKEY_SIZE: usize = 33;

/// Size of a recoverable signature on the wire.
pub const SIGNATURE_SIZE: usize = 65;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBKEY_SIZE]);

impl PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; PUBKEY_SIZE]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Create from a slice, validating length and curve membership.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != PUBKEY_SIZE {
            return Err(CryptoError::InvalidPublicKey);
        }
        let mut bytes = [0u8; PUBKEY_SIZE];
        bytes.copy_from_slice(slice);
        Self::from_bytes(bytes)
    }

    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; PUBKEY_SIZE] {
        &self.0
    }

    /// Verify a recoverable signature over `message`.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &RecoverableSignature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_slice(&signature.0[..64])
            .map_err(|_| CryptoError::InvalidSignature)?;
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// HASH-160 of the compressed key (the standard address payload).
    pub fn key_id(&self) -> [u8; 20] {
        crate::hashing::hash160(&self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..6]))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Recoverable ECDSA signature (64 bytes `r || s` plus 1 recovery byte).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature([u8; SIGNATURE_SIZE]);

impl RecoverableSignature {
    /// Create from wire bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, validating length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignature);
        }
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Raw wire bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Recover the signing public key from the signature and message.
    pub fn recover(&self, message: &[u8]) -> Result<PublicKey, CryptoError> {
        let sig =
            Signature::from_slice(&self.0[..64]).map_err(|_| CryptoError::InvalidSignature)?;
        let recid =
            RecoveryId::from_byte(self.0[64]).ok_or(CryptoError::InvalidSignature)?;
        let key = VerifyingKey::recover_from_msg(message, &sig, recid)
            .map_err(|_| CryptoError::SignatureVerificationFailed)?;
        let sec1 = key.to_sec1_bytes();
        let mut bytes = [0u8; PUBKEY_SIZE];
        bytes.copy_from_slice(&sec1[..PUBKEY_SIZE]);
        Ok(PublicKey(bytes))
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature({})", hex::encode(&self.0[..6]))
    }
}

/// secp256k1 keypair.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Compressed public key (33 bytes).
    pub fn public_key(&self) -> PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        let sec1 = verifying_key.to_sec1_bytes();
        // SEC1 compressed form is always exactly 33 bytes.
        let mut bytes = [0u8; PUBKEY_SIZE];
        bytes.copy_from_slice(&sec1[..PUBKEY_SIZE]);
        PublicKey(bytes)
    }

    /// Sign a message, producing the 65-byte recoverable wire form.
    pub fn sign_recoverable(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError> {
        let (sig, recid) = self
            .signing_key
            .sign_recoverable(message)
            .map_err(|_| CryptoError::SigningFailed)?;
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recid.to_byte();
        Ok(RecoverableSignature(bytes))
    }

    /// Secret key bytes (for persistence; handle with care).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair({:?})", self.public_key())
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = KeyPair::generate();
        let message = b"swap packet body";

        let signature = keypair.sign_recoverable(message).unwrap();
        assert!(keypair.public_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign_recoverable(b"message1").unwrap();
        assert!(keypair.public_key().verify(b"message2", &signature).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair = KeyPair::generate();
        let other = KeyPair::generate();
        let signature = keypair.sign_recoverable(b"message").unwrap();
        assert!(other.public_key().verify(b"message", &signature).is_err());
    }

    #[test]
    fn test_recover_pubkey() {
        let keypair = KeyPair::generate();
        let message = b"recoverable";
        let signature = keypair.sign_recoverable(message).unwrap();
        let recovered = signature.recover(message).unwrap();
        assert_eq!(recovered, keypair.public_key());
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = KeyPair::from_bytes([0xAB; 32]).unwrap();
        let s1 = keypair.sign_recoverable(b"det").unwrap();
        let s2 = keypair.sign_recoverable(b"det").unwrap();
        assert_eq!(s1.as_bytes()[..], s2.as_bytes()[..]);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let original = KeyPair::generate();
        let restored = KeyPair::from_bytes(original.to_bytes()).unwrap();
        assert_eq!(original.public_key(), restored.public_key());
    }

    #[test]
    fn test_bad_pubkey_rejected() {
        assert!(PublicKey::from_bytes([0u8; 33]).is_err());
        assert!(PublicKey::from_slice(&[2u8; 32]).is_err());
    }
}
