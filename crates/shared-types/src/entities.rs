//! # Core Domain Entities
//!
//! Identifiers and value types for the swap protocol.
//!
//! ## Clusters
//!
//! - **Identity**: `OrderId`, `SessionId`, `XAddress`
//! - **Trading**: `Currency`, `Role`, `UtxoEntry`

use crate::errors::TypeError;
use serde::{Deserialize, Serialize};

/// Size in bytes of a protocol hash (order ids, txid commitments, anchors).
pub const HASH_SIZE: usize = 32;

/// Size in bytes of a trading address (HASH-160 of a key or script).
pub const ADDRESS_SIZE: usize = 20;

/// A 20-byte trading address in chain-neutral form.
///
/// The per-chain base58/bech32 rendering is a wallet concern; the protocol
/// only ever moves the raw 20 bytes.
pub type XAddress = [u8; ADDRESS_SIZE];

/// Order identifier: a 32-byte content hash over the canonical order fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub [u8; HASH_SIZE]);

impl OrderId {
    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Construct from a slice, failing on wrong length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypeError> {
        if slice.len() != HASH_SIZE {
            return Err(TypeError::BadLength {
                what: "order id",
                expected: HASH_SIZE,
                got: slice.len(),
            });
        }
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Raw bytes of the identifier.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderId({})", self.short())
    }
}

/// Session identifier: 20 random bytes generated once per session.
///
/// Doubles as the hub routing address in packets addressed to the session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub [u8; ADDRESS_SIZE]);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// The session id viewed as a routing address.
    pub fn as_address(&self) -> XAddress {
        self.0
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({})", hex::encode(&self.0[..6]))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Currency ticker, at most 8 ASCII bytes, zero-padded on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency([u8; 8]);

impl Currency {
    /// Construct from a ticker string (1..=8 ASCII characters).
    pub fn new(ticker: &str) -> Result<Self, TypeError> {
        if ticker.is_empty() || ticker.len() > 8 || !ticker.is_ascii() {
            return Err(TypeError::BadCurrency(ticker.to_string()));
        }
        let mut bytes = [0u8; 8];
        bytes[..ticker.len()].copy_from_slice(ticker.as_bytes());
        Ok(Self(bytes))
    }

    /// Construct from the zero-padded wire form.
    pub fn from_wire(bytes: [u8; 8]) -> Result<Self, TypeError> {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(8);
        let ticker = std::str::from_utf8(&bytes[..len])
            .map_err(|_| TypeError::BadCurrency(hex::encode(bytes)))?;
        Self::new(ticker)
    }

    /// Zero-padded 8-byte wire form.
    pub fn to_wire(&self) -> [u8; 8] {
        self.0
    }

    /// The ticker without padding.
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        // Constructors only accept ASCII, so this cannot fail.
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Currency({})", self.as_str())
    }
}

/// Trading role of a participant.
///
/// The Maker (role A) publishes the order and chooses the HTLC secret;
/// the Taker (role B) accepts it and locks against the Maker's hashed secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Maker / trader A.
    Maker,
    /// Taker / trader B.
    Taker,
}

impl Role {
    /// The conventional single-letter tag used in logs and locktime policy.
    pub fn as_char(&self) -> char {
        match self {
            Role::Maker => 'A',
            Role::Taker => 'B',
        }
    }

    /// The counterparty role.
    pub fn counterparty(&self) -> Self {
        match self {
            Role::Maker => Role::Taker,
            Role::Taker => Role::Maker,
        }
    }
}

/// A UTXO committed to an order.
///
/// The signature proves the committing trader controls `address`: it signs
/// the canonical `"txid:vout"` string with the wallet key behind the address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    /// Funding transaction id (hex).
    pub txid: String,
    /// Output index within the funding transaction.
    pub vout: u32,
    /// Owning address in chain-neutral 20-byte form.
    pub raw_address: XAddress,
    /// Output value, known after the chain query (zero until then).
    pub amount: crate::Amount,
    /// 65-byte recoverable signature over [`UtxoEntry::signed_message`].
    pub signature: Vec<u8>,
}

impl UtxoEntry {
    /// The canonical string the owner signs to prove control of the UTXO.
    pub fn signed_message(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }

    /// The process-wide lock key for this UTXO.
    pub fn lock_key(&self, currency: Currency) -> (Currency, String, u32) {
        (currency, self.txid.clone(), self.vout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_from_slice() {
        let id = OrderId::from_slice(&[7u8; 32]).unwrap();
        assert_eq!(id.as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn test_order_id_wrong_length_fails() {
        assert!(OrderId::from_slice(&[7u8; 31]).is_err());
    }

    #[test]
    fn test_order_id_short_display() {
        let id = OrderId::from_bytes([0xAB; 32]);
        assert_eq!(id.short(), "abababababababab");
    }

    #[test]
    fn test_session_id_is_random() {
        assert_ne!(SessionId::generate().0, SessionId::generate().0);
    }

    #[test]
    fn test_currency_roundtrip() {
        let cur = Currency::new("BLOCK").unwrap();
        assert_eq!(cur.as_str(), "BLOCK");
        assert_eq!(Currency::from_wire(cur.to_wire()).unwrap(), cur);
    }

    #[test]
    fn test_currency_padding() {
        let cur = Currency::new("LTC").unwrap();
        let wire = cur.to_wire();
        assert_eq!(&wire[..3], b"LTC");
        assert_eq!(&wire[3..], &[0u8; 5]);
    }

    #[test]
    fn test_currency_too_long_fails() {
        assert!(Currency::new("TOOLONGTICKER").is_err());
        assert!(Currency::new("").is_err());
    }

    #[test]
    fn test_role_counterparty() {
        assert_eq!(Role::Maker.counterparty(), Role::Taker);
        assert_eq!(Role::Taker.as_char(), 'B');
    }

    #[test]
    fn test_utxo_signed_message() {
        let utxo = UtxoEntry {
            txid: "aa".repeat(32),
            vout: 1,
            raw_address: [0u8; 20],
            amount: crate::Amount::from_units(0),
            signature: vec![],
        };
        assert!(utxo.signed_message().ends_with(":1"));
    }
}
