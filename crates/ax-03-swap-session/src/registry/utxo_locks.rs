//! # UTXO Lock Table
//!
//! Process-wide set of `(currency, txid, vout)` entries. A UTXO referenced
//! by an in-flight order stays pinned until the order terminates; a second
//! order touching the same outpoint is treated as a double-spend attempt.
//! Fee UTXOs live in a separate pool released as soon as the fee
//! transaction is broadcast.
//!
//! The table is shared by every session in the process, so it carries its
//! own lock; critical sections are a map probe or insert.

use parking_lot::Mutex;
use shared_types::{Currency, UtxoEntry};
use std::collections::HashSet;

type LockKey = (Currency, String, u32);

#[derive(Default)]
struct Pools {
    coins: HashSet<LockKey>,
    fees: HashSet<LockKey>,
}

/// Process-wide UTXO lock table.
#[derive(Default)]
pub struct UtxoLockTable {
    pools: Mutex<Pools>,
}

impl UtxoLockTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(currency: Currency, utxo: &UtxoEntry) -> LockKey {
        (currency, utxo.txid.clone(), utxo.vout)
    }

    /// Lock all `utxos` atomically. Fails without locking anything if any
    /// entry is already pinned, returning the conflicting outpoint.
    pub fn lock_coins(
        &self,
        currency: Currency,
        utxos: &[UtxoEntry],
    ) -> Result<(), (String, u32)> {
        let mut pools = self.pools.lock();
        for utxo in utxos {
            let key = Self::key(currency, utxo);
            if pools.coins.contains(&key) || pools.fees.contains(&key) {
                return Err((utxo.txid.clone(), utxo.vout));
            }
        }
        for utxo in utxos {
            pools.coins.insert(Self::key(currency, utxo));
        }
        Ok(())
    }

    /// Release order UTXOs.
    pub fn unlock_coins(&self, currency: Currency, utxos: &[UtxoEntry]) {
        let mut pools = self.pools.lock();
        for utxo in utxos {
            pools.coins.remove(&Self::key(currency, utxo));
        }
    }

    /// Pin fee UTXOs.
    pub fn lock_fees(&self, currency: Currency, utxos: &[UtxoEntry]) -> Result<(), (String, u32)> {
        let mut pools = self.pools.lock();
        for utxo in utxos {
            let key = Self::key(currency, utxo);
            if pools.coins.contains(&key) || pools.fees.contains(&key) {
                return Err((utxo.txid.clone(), utxo.vout));
            }
        }
        for utxo in utxos {
            pools.fees.insert(Self::key(currency, utxo));
        }
        Ok(())
    }

    /// Release fee UTXOs (after the fee transaction is broadcast).
    pub fn unlock_fees(&self, currency: Currency, utxos: &[UtxoEntry]) {
        let mut pools = self.pools.lock();
        for utxo in utxos {
            pools.fees.remove(&Self::key(currency, utxo));
        }
    }

    /// True when the outpoint is pinned in either pool.
    pub fn is_locked(&self, currency: Currency, utxo: &UtxoEntry) -> bool {
        let pools = self.pools.lock();
        let key = Self::key(currency, utxo);
        pools.coins.contains(&key) || pools.fees.contains(&key)
    }

    /// Total pinned outpoints, both pools.
    pub fn len(&self) -> usize {
        let pools = self.pools.lock();
        pools.coins.len() + pools.fees.len()
    }

    /// True when nothing is pinned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Amount;

    fn utxo(seed: u8) -> UtxoEntry {
        UtxoEntry {
            txid: hex::encode([seed; 32]),
            vout: 0,
            raw_address: [seed; 20],
            amount: Amount::from_coins(1),
            signature: vec![],
        }
    }

    fn cur() -> Currency {
        Currency::new("BLOCK").unwrap()
    }

    #[test]
    fn test_lock_and_unlock() {
        let table = UtxoLockTable::new();
        let utxos = vec![utxo(1), utxo(2)];
        assert!(table.lock_coins(cur(), &utxos).is_ok());
        assert!(table.is_locked(cur(), &utxos[0]));
        table.unlock_coins(cur(), &utxos);
        assert!(table.is_empty());
    }

    #[test]
    fn test_conflict_locks_nothing() {
        let table = UtxoLockTable::new();
        table.lock_coins(cur(), &[utxo(1)]).unwrap();

        let err = table.lock_coins(cur(), &[utxo(2), utxo(1)]).unwrap_err();
        assert_eq!(err.1, 0);
        // The non-conflicting entry must not have been pinned.
        assert!(!table.is_locked(cur(), &utxo(2)));
    }

    #[test]
    fn test_same_outpoint_different_currency() {
        let table = UtxoLockTable::new();
        table.lock_coins(cur(), &[utxo(1)]).unwrap();
        assert!(table
            .lock_coins(Currency::new("LTC").unwrap(), &[utxo(1)])
            .is_ok());
    }

    #[test]
    fn test_fee_pool_is_separate_but_conflicting() {
        let table = UtxoLockTable::new();
        table.lock_fees(cur(), &[utxo(1)]).unwrap();
        // The same outpoint cannot back an order while reserved for fees.
        assert!(table.lock_coins(cur(), &[utxo(1)]).is_err());
        table.unlock_fees(cur(), &[utxo(1)]);
        assert!(table.lock_coins(cur(), &[utxo(1)]).is_ok());
    }
}
