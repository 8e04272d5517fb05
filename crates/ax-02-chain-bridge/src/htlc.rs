//! # HTLC Script Construction
//!
//! Script template shared by both deposits:
//!
//! ```text
//! OP_IF
//!     OP_HASH160 <hashed_secret20> OP_EQUALVERIFY
//!     <counterparty_pubkey33> OP_CHECKSIG
//! OP_ELSE
//!     <lock_time> OP_CHECKLOCKTIMEVERIFY OP_DROP
//!     <owner_pubkey33> OP_CHECKSIG
//! OP_ENDIF
//! ```
//!
//! The redeem path reveals the preimage of `hashed_secret`; the refund path
//! becomes valid once the chain passes `lock_time`.

use shared_crypto::{hash160, Hash160, PublicKey};

mod opcodes {
    pub const OP_IF: u8 = 0x63;
    pub const OP_ELSE: u8 = 0x67;
    pub const OP_ENDIF: u8 = 0x68;
    pub const OP_DROP: u8 = 0x75;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;
}

/// Parameters of an HTLC deposit script.
#[derive(Clone, Debug)]
pub struct HtlcScriptParams {
    /// Key allowed to refund after `lock_time`.
    pub owner: PublicKey,
    /// Key allowed to redeem with the secret.
    pub counterparty: PublicKey,
    /// HASH-160 of the swap secret.
    pub hashed_secret: Hash160,
    /// Absolute block height after which the refund path is valid.
    pub lock_time: u32,
}

/// Build the HTLC redeem script.
pub fn build_htlc_script(params: &HtlcScriptParams) -> Vec<u8> {
    use opcodes::*;

    let mut script = Vec::with_capacity(120);

    script.push(OP_IF);

    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(&params.hashed_secret);
    script.push(OP_EQUALVERIFY);
    script.push(33);
    script.extend_from_slice(params.counterparty.as_bytes());
    script.push(OP_CHECKSIG);

    script.push(OP_ELSE);

    let lock_bytes = encode_locktime(params.lock_time);
    script.push(lock_bytes.len() as u8);
    script.extend_from_slice(&lock_bytes);
    script.push(OP_CHECKLOCKTIMEVERIFY);
    script.push(OP_DROP);
    script.push(33);
    script.extend_from_slice(params.owner.as_bytes());
    script.push(OP_CHECKSIG);

    script.push(OP_ENDIF);

    script
}

/// HASH-160 of a script, the P2SH address payload.
pub fn script_hash(script: &[u8]) -> Hash160 {
    hash160(script)
}

/// Minimal script-number encoding of a locktime.
pub fn encode_locktime(lock_time: u32) -> Vec<u8> {
    if lock_time == 0 {
        return vec![];
    }

    let mut bytes = lock_time.to_le_bytes().to_vec();
    while bytes.len() > 1 && bytes.last() == Some(&0) {
        bytes.pop();
    }
    // Keep the number positive under script-number rules.
    if bytes.last().map(|b| b & 0x80 != 0).unwrap_or(false) {
        bytes.push(0x00);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::KeyPair;

    fn sample_params() -> HtlcScriptParams {
        HtlcScriptParams {
            owner: KeyPair::generate().public_key(),
            counterparty: KeyPair::generate().public_key(),
            hashed_secret: [0xAB; 20],
            lock_time: 500_000,
        }
    }

    #[test]
    fn test_script_structure() {
        let params = sample_params();
        let script = build_htlc_script(&params);

        assert_eq!(script[0], opcodes::OP_IF);
        assert_eq!(script[1], opcodes::OP_HASH160);
        assert_eq!(*script.last().unwrap(), opcodes::OP_ENDIF);
        assert!(script.windows(20).any(|w| w == params.hashed_secret));
        assert!(script
            .windows(33)
            .any(|w| w == params.counterparty.as_bytes()));
        assert!(script.windows(33).any(|w| w == params.owner.as_bytes()));
    }

    #[test]
    fn test_script_binds_all_parameters() {
        let params = sample_params();
        let base = build_htlc_script(&params);

        let mut other = params.clone();
        other.hashed_secret = [0xCD; 20];
        assert_ne!(build_htlc_script(&other), base);

        let mut other = params.clone();
        other.lock_time += 1;
        assert_ne!(build_htlc_script(&other), base);

        let mut other = params;
        other.owner = KeyPair::generate().public_key();
        assert_ne!(build_htlc_script(&other), base);
    }

    #[test]
    fn test_script_hash_is_20_bytes() {
        let script = build_htlc_script(&sample_params());
        assert_eq!(script_hash(&script).len(), 20);
    }

    #[test]
    fn test_encode_locktime_minimal() {
        assert_eq!(encode_locktime(0), Vec::<u8>::new());
        assert_eq!(encode_locktime(100), vec![100]);
        assert_eq!(encode_locktime(300), vec![0x2C, 0x01]);
        // High bit set in the top byte forces a sign byte.
        assert_eq!(encode_locktime(0x80), vec![0x80, 0x00]);
        assert_eq!(encode_locktime(0x7FFF_FFFF), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }
}
