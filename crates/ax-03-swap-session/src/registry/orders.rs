//! # Order Books
//!
//! [`OrderRegistry`] is the hub's book: pending adverts, active (accepted)
//! orders, and terminal history. At-most-one-accept is enforced here:
//! accepting moves the record from `pending` to `active`, and a second
//! accept finds nothing left to move.
//!
//! [`LocalOrderBook`] is a trader's book of its own and observed orders.
//!
//! Both books are owned by their session actor, so access is already
//! serialized; no internal locking is needed.

use crate::domain::exchange::ExchangeOrder;
use crate::domain::order::TraderOrder;
use shared_types::OrderId;
use std::collections::HashMap;

/// Hub-side order book.
#[derive(Default)]
pub struct OrderRegistry {
    pending: HashMap<OrderId, ExchangeOrder>,
    active: HashMap<OrderId, ExchangeOrder>,
    history: HashMap<OrderId, ExchangeOrder>,
}

impl OrderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated advert. Returns false when the id is taken.
    pub fn insert_pending(&mut self, order: ExchangeOrder) -> bool {
        if self.pending.contains_key(&order.id)
            || self.active.contains_key(&order.id)
            || self.history.contains_key(&order.id)
        {
            return false;
        }
        self.pending.insert(order.id, order);
        true
    }

    /// Pending advert by id.
    pub fn pending(&self, id: &OrderId) -> Option<&ExchangeOrder> {
        self.pending.get(id)
    }

    /// Mutable pending advert by id.
    pub fn pending_mut(&mut self, id: &OrderId) -> Option<&mut ExchangeOrder> {
        self.pending.get_mut(id)
    }

    /// Active order by id.
    pub fn active(&self, id: &OrderId) -> Option<&ExchangeOrder> {
        self.active.get(id)
    }

    /// Mutable active order by id.
    pub fn active_mut(&mut self, id: &OrderId) -> Option<&mut ExchangeOrder> {
        self.active.get_mut(id)
    }

    /// True once an order has been accepted (or already settled).
    pub fn is_accepted(&self, id: &OrderId) -> bool {
        self.active.contains_key(id) || self.history.contains_key(id)
    }

    /// Promote a pending advert to active. The first caller wins; any
    /// later call returns `None`.
    pub fn promote(&mut self, id: &OrderId) -> Option<&mut ExchangeOrder> {
        if self.active.contains_key(id) {
            return None;
        }
        let order = self.pending.remove(id)?;
        self.active.insert(*id, order);
        self.active.get_mut(id)
    }

    /// Remove a pending advert.
    pub fn remove_pending(&mut self, id: &OrderId) -> Option<ExchangeOrder> {
        self.pending.remove(id)
    }

    /// Move an order (pending or active) to history.
    pub fn archive(&mut self, id: &OrderId) -> Option<&ExchangeOrder> {
        let order = self
            .active
            .remove(id)
            .or_else(|| self.pending.remove(id))?;
        self.history.insert(*id, order);
        self.history.get(id)
    }

    /// Delete an order outright.
    pub fn delete(&mut self, id: &OrderId) {
        self.pending.remove(id);
        self.active.remove(id);
        self.history.remove(id);
    }

    /// Iterate pending adverts.
    pub fn pending_orders(&self) -> impl Iterator<Item = &ExchangeOrder> {
        self.pending.values()
    }

    /// Ids of pending adverts.
    pub fn pending_ids(&self) -> Vec<OrderId> {
        self.pending.keys().copied().collect()
    }

    /// Ids of active orders.
    pub fn active_ids(&self) -> Vec<OrderId> {
        self.active.keys().copied().collect()
    }

    /// Number of pending adverts.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of active orders.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Archived order by id.
    pub fn archived(&self, id: &OrderId) -> Option<&ExchangeOrder> {
        self.history.get(id)
    }
}

/// Trader-side order book.
#[derive(Default)]
pub struct LocalOrderBook {
    orders: HashMap<OrderId, TraderOrder>,
    history: HashMap<OrderId, TraderOrder>,
}

impl LocalOrderBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an order record.
    pub fn insert(&mut self, order: TraderOrder) {
        self.orders.insert(order.id, order);
    }

    /// Order by id.
    pub fn get(&self, id: &OrderId) -> Option<&TraderOrder> {
        self.orders.get(id)
    }

    /// Mutable order by id.
    pub fn get_mut(&mut self, id: &OrderId) -> Option<&mut TraderOrder> {
        self.orders.get_mut(id)
    }

    /// True when the id is known (live or archived).
    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.contains_key(id) || self.history.contains_key(id)
    }

    /// Move an order to history.
    pub fn archive(&mut self, id: &OrderId) -> Option<&TraderOrder> {
        let order = self.orders.remove(id)?;
        self.history.insert(*id, order);
        self.history.get(id)
    }

    /// Archived order by id.
    pub fn archived(&self, id: &OrderId) -> Option<&TraderOrder> {
        self.history.get(id)
    }

    /// Ids of live orders.
    pub fn live_ids(&self) -> Vec<OrderId> {
        self.orders.keys().copied().collect()
    }

    /// Number of live orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// True when no live orders exist.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exchange::SideState;
    use shared_crypto::KeyPair;
    use shared_types::{Amount, Currency};

    fn sample_order(seed: u8) -> ExchangeOrder {
        ExchangeOrder::new(
            OrderId::from_bytes([seed; 32]),
            SideState::new(
                [seed; 20],
                [seed + 1; 20],
                Currency::new("BLOCK").unwrap(),
                Amount::from_coins(10),
                KeyPair::generate().public_key(),
                vec![],
            ),
            Currency::new("LTC").unwrap(),
            Amount::from_coins(1),
            [0; 32],
            1000,
        )
    }

    #[test]
    fn test_insert_pending_rejects_duplicates() {
        let mut reg = OrderRegistry::new();
        assert!(reg.insert_pending(sample_order(1)));
        assert!(!reg.insert_pending(sample_order(1)));
    }

    #[test]
    fn test_promote_once() {
        let mut reg = OrderRegistry::new();
        let id = OrderId::from_bytes([1; 32]);
        reg.insert_pending(sample_order(1));

        assert!(reg.promote(&id).is_some());
        assert!(reg.is_accepted(&id));
        // The second accept finds nothing to promote.
        assert!(reg.promote(&id).is_none());
    }

    #[test]
    fn test_archive_moves_to_history() {
        let mut reg = OrderRegistry::new();
        let id = OrderId::from_bytes([1; 32]);
        reg.insert_pending(sample_order(1));
        reg.promote(&id);
        assert!(reg.archive(&id).is_some());
        assert!(reg.active(&id).is_none());
        assert!(reg.archived(&id).is_some());
        // Still counts as accepted; the id can never be re-joined.
        assert!(reg.is_accepted(&id));
    }

    #[test]
    fn test_pending_ids() {
        let mut reg = OrderRegistry::new();
        reg.insert_pending(sample_order(1));
        reg.insert_pending(sample_order(2));
        assert_eq!(reg.pending_len(), 2);
        assert_eq!(reg.pending_ids().len(), 2);
    }
}
