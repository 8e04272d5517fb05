//! # Protocol Invariants
//!
//! Pure checks shared by hub and trader handlers.

use shared_crypto::{Hash160, Sha256dWriter};
use shared_types::{Amount, Currency, OrderId};

/// The canonical fields hashed into an order id.
///
/// Addresses are the chain string forms so that every participant, whatever
/// wallet it runs, derives the same id.
#[derive(Clone, Debug)]
pub struct OrderIdFields<'a> {
    /// Maker source address, chain string form.
    pub src_addr: &'a str,
    /// Source currency.
    pub src_currency: Currency,
    /// Amount offered.
    pub src_amount: Amount,
    /// Maker destination address, chain string form.
    pub dst_addr: &'a str,
    /// Destination currency.
    pub dst_currency: Currency,
    /// Amount wanted.
    pub dst_amount: Amount,
    /// Creation timestamp.
    pub timestamp: u64,
    /// Source-chain tip hash at creation.
    pub anchor: &'a [u8; 32],
    /// Signature of the first committed UTXO.
    pub first_utxo_signature: &'a [u8],
}

/// Derive the canonical order id: SHA-256d over the concatenated fields.
///
/// Any packet whose claimed id disagrees with this derivation is dropped.
pub fn derive_order_id(fields: &OrderIdFields<'_>) -> OrderId {
    let mut w = Sha256dWriter::new();
    w.write(fields.src_addr.as_bytes())
        .write(fields.src_currency.as_str().as_bytes())
        .write(&fields.src_amount.to_le_bytes())
        .write(fields.dst_addr.as_bytes())
        .write(fields.dst_currency.as_str().as_bytes())
        .write(&fields.dst_amount.to_le_bytes())
        .write(&fields.timestamp.to_le_bytes())
        .write(fields.anchor)
        .write(fields.first_utxo_signature);
    OrderId::from_bytes(w.finalize())
}

/// Both deposits must lock the same hashed secret.
pub fn hashed_secrets_match(a: &Hash160, b: &Hash160) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields(timestamp: u64) -> OrderIdFields<'static> {
        OrderIdFields {
            src_addr: "BLOCK:aabb",
            src_currency: Currency::new("BLOCK").unwrap(),
            src_amount: Amount::from_coins(10),
            dst_addr: "LTC:ccdd",
            dst_currency: Currency::new("LTC").unwrap(),
            dst_amount: Amount::from_coins(1),
            timestamp,
            anchor: &[7u8; 32],
            first_utxo_signature: b"sig-bytes",
        }
    }

    #[test]
    fn test_derivation_deterministic() {
        assert_eq!(
            derive_order_id(&sample_fields(1000)),
            derive_order_id(&sample_fields(1000))
        );
    }

    #[test]
    fn test_derivation_binds_fields() {
        let base = derive_order_id(&sample_fields(1000));
        assert_ne!(base, derive_order_id(&sample_fields(1001)));

        let mut other = sample_fields(1000);
        other.src_amount = Amount::from_coins(11);
        assert_ne!(base, derive_order_id(&other));

        let mut other = sample_fields(1000);
        other.first_utxo_signature = b"other-sig";
        assert_ne!(base, derive_order_id(&other));
    }

    #[test]
    fn test_hashed_secrets() {
        assert!(hashed_secrets_match(&[1u8; 20], &[1u8; 20]));
        assert!(!hashed_secrets_match(&[1u8; 20], &[2u8; 20]));
    }
}
