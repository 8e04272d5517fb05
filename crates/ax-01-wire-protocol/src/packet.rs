//! # Packet Frame
//!
//! Framing, signing and verification of wire packets. The signature covers
//! `version || command || payload`; the attached compressed public key
//! identifies the sender.

use crate::command::Command;
use crate::errors::WireError;
use shared_crypto::{KeyPair, PublicKey, RecoverableSignature, PUBKEY_SIZE, SIGNATURE_SIZE};
use shared_types::ADDRESS_SIZE;

/// Fixed protocol version; peers on any other version are ignored.
pub const PROTOCOL_VERSION: u32 = 78;

/// Bytes before the payload: version (4) + command (1).
pub const HEADER_SIZE: usize = 5;

/// Bytes after the payload: pubkey (33) + signature (65).
pub const TRAILER_SIZE: usize = PUBKEY_SIZE + SIGNATURE_SIZE;

/// A framed protocol packet.
///
/// Key and signature are stored as raw bytes; they are only interpreted at
/// verification time so that decode never fails on key material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    command: Command,
    body: Vec<u8>,
    pubkey: [u8; PUBKEY_SIZE],
    signature: [u8; SIGNATURE_SIZE],
}

impl Packet {
    /// Create an unsigned packet; call [`Packet::sign`] before sending.
    pub fn unsigned(command: Command, body: Vec<u8>) -> Self {
        Self {
            command,
            body,
            pubkey: [0u8; PUBKEY_SIZE],
            signature: [0u8; SIGNATURE_SIZE],
        }
    }

    /// The command byte.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The payload bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The attached sender public key bytes.
    pub fn pubkey_bytes(&self) -> &[u8; PUBKEY_SIZE] {
        &self.pubkey
    }

    /// The attached sender public key, if it parses.
    pub fn sender_pubkey(&self) -> Result<PublicKey, WireError> {
        PublicKey::from_bytes(self.pubkey).map_err(|_| WireError::BadSignature)
    }

    /// The bytes covered by the signature.
    fn sign_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_SIZE + self.body.len());
        data.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        data.push(self.command.as_byte());
        data.extend_from_slice(&self.body);
        data
    }

    /// Sign the packet, attaching the keypair's public key.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), WireError> {
        let signature = keypair
            .sign_recoverable(&self.sign_data())
            .map_err(|_| WireError::BadSignature)?;
        self.pubkey = *keypair.public_key().as_bytes();
        self.signature = *signature.as_bytes();
        Ok(())
    }

    /// Build and sign in one step.
    pub fn signed(command: Command, body: Vec<u8>, keypair: &KeyPair) -> Result<Self, WireError> {
        let mut packet = Self::unsigned(command, body);
        packet.sign(keypair)?;
        Ok(packet)
    }

    /// Verify the signature under the *attached* public key.
    ///
    /// Used on first contact, before any key has been pinned for the order.
    pub fn verify(&self) -> bool {
        let Ok(key) = PublicKey::from_bytes(self.pubkey) else {
            return false;
        };
        self.verify_with(&key)
    }

    /// Verify the signature under a specific expected key.
    ///
    /// The attached key must equal `key` and the signature must check out;
    /// this is the pinned-key path.
    pub fn verify_with(&self, key: &PublicKey) -> bool {
        if &self.pubkey != key.as_bytes() {
            return false;
        }
        let signature = RecoverableSignature::from_bytes(self.signature);
        key.verify(&self.sign_data(), &signature).is_ok()
    }

    /// Encode the full frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.sign_data();
        out.extend_from_slice(&self.pubkey);
        out.extend_from_slice(&self.signature);
        out
    }

    /// Decode a frame, checking version and length.
    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        if frame.len() < HEADER_SIZE + TRAILER_SIZE {
            return Err(WireError::Truncated(frame.len()));
        }
        let version = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        if version != PROTOCOL_VERSION {
            return Err(WireError::BadVersion(version));
        }
        let command = Command::from_byte(frame[4])?;
        let body_end = frame.len() - TRAILER_SIZE;
        let body = frame[HEADER_SIZE..body_end].to_vec();

        let mut pubkey = [0u8; PUBKEY_SIZE];
        pubkey.copy_from_slice(&frame[body_end..body_end + PUBKEY_SIZE]);
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&frame[body_end + PUBKEY_SIZE..]);

        Ok(Self {
            command,
            body,
            pubkey,
            signature,
        })
    }

    /// First 20 payload bytes, for packets routed by session address.
    pub fn session_prefix(&self) -> Option<&[u8]> {
        if self.body.len() >= ADDRESS_SIZE {
            Some(&self.body[..ADDRESS_SIZE])
        } else {
            None
        }
    }

    /// Encryption hook; currently the identity transform.
    ///
    /// The hook point is kept so encryption can be enabled without changing
    /// the frame layout.
    pub fn encrypt(&mut self) -> Result<(), WireError> {
        Ok(())
    }

    /// Decryption hook; currently the identity transform.
    pub fn decrypt(&mut self) -> Result<(), WireError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> (Packet, KeyPair) {
        let keypair = KeyPair::generate();
        let packet =
            Packet::signed(Command::TransactionFinished, vec![7u8; 32], &keypair).unwrap();
        (packet, keypair)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let (packet, _) = sample_packet();
        let decoded = Packet::decode(&packet.encode()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_decode_truncated() {
        let (packet, _) = sample_packet();
        let frame = packet.encode();
        assert!(matches!(
            Packet::decode(&frame[..HEADER_SIZE + TRAILER_SIZE - 1]),
            Err(WireError::Truncated(_))
        ));
    }

    #[test]
    fn test_decode_bad_version() {
        let (packet, _) = sample_packet();
        let mut frame = packet.encode();
        frame[0] ^= 0xFF;
        assert!(matches!(
            Packet::decode(&frame),
            Err(WireError::BadVersion(_))
        ));
    }

    #[test]
    fn test_decode_unknown_command() {
        let (packet, _) = sample_packet();
        let mut frame = packet.encode();
        frame[4] = 200;
        assert!(matches!(
            Packet::decode(&frame),
            Err(WireError::UnknownCommand(200))
        ));
    }

    #[test]
    fn test_verify_ok() {
        let (packet, keypair) = sample_packet();
        assert!(packet.verify());
        assert!(packet.verify_with(&keypair.public_key()));
    }

    #[test]
    fn test_verify_wrong_key() {
        let (packet, _) = sample_packet();
        let other = KeyPair::generate();
        assert!(!packet.verify_with(&other.public_key()));
    }

    #[test]
    fn test_verify_tampered_body() {
        let (packet, _) = sample_packet();
        let mut frame = packet.encode();
        frame[HEADER_SIZE] ^= 0x01;
        let tampered = Packet::decode(&frame).unwrap();
        assert!(!tampered.verify());
    }

    #[test]
    fn test_unsigned_does_not_verify() {
        let packet = Packet::unsigned(Command::TransactionFinished, vec![7u8; 32]);
        assert!(!packet.verify());
    }

    #[test]
    fn test_session_prefix() {
        let packet = Packet::unsigned(Command::TransactionHold, vec![9u8; 52]);
        assert_eq!(packet.session_prefix().unwrap(), &[9u8; 20][..]);
        let short = Packet::unsigned(Command::Invalid, vec![1u8; 4]);
        assert!(short.session_prefix().is_none());
    }
}
