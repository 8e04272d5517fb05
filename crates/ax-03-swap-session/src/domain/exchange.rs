//! # Hub-Side Order Pairs
//!
//! The hub's view of one order: both parties' addresses, keys, UTXO
//! commitments, locktimes and transaction ids. The hub advances the pair
//! only when *both* sides have answered the current phase, implemented as
//! "record the response for side X, then check whether both are in".

use crate::domain::order::now_secs;
use crate::domain::states::HubState;
use shared_crypto::PublicKey;
use shared_types::{Amount, Currency, OrderId, Role, UtxoEntry, XAddress};

/// One party's slot in an order pair.
#[derive(Clone, Debug)]
pub struct SideState {
    /// Trading address (source of funds).
    pub address: XAddress,
    /// Destination address on the other chain.
    pub destination: XAddress,
    /// Currency this side pays.
    pub currency: Currency,
    /// Amount this side pays.
    pub amount: Amount,
    /// Per-order public key, pinned when the side entered the order.
    pub pubkey: PublicKey,
    /// Committed UTXOs.
    pub utxos: Vec<UtxoEntry>,
    /// Deposit locktime reported by this side.
    pub lock_time: u32,
    /// Deposit transaction id.
    pub bin_txid: Option<String>,
    /// Pre-signed refund transaction id.
    pub ref_txid: Option<String>,
    /// Pre-signed raw refund transaction.
    pub ref_tx: Option<String>,
    /// Redeem transaction id.
    pub pay_txid: Option<String>,
    /// Hold acknowledged.
    pub hold_applied: bool,
    /// Init acknowledged.
    pub initialized: bool,
    /// Deposit reported.
    pub created: bool,
    /// Redeem reported.
    pub confirmed: bool,
}

impl SideState {
    /// Fresh slot for a party entering the order.
    pub fn new(
        address: XAddress,
        destination: XAddress,
        currency: Currency,
        amount: Amount,
        pubkey: PublicKey,
        utxos: Vec<UtxoEntry>,
    ) -> Self {
        Self {
            address,
            destination,
            currency,
            amount,
            pubkey,
            utxos,
            lock_time: 0,
            bin_txid: None,
            ref_txid: None,
            ref_tx: None,
            pay_txid: None,
            hold_applied: false,
            initialized: false,
            created: false,
            confirmed: false,
        }
    }
}

/// The hub's record of one order.
#[derive(Clone, Debug)]
pub struct ExchangeOrder {
    /// Order id.
    pub id: OrderId,
    /// Hub-side state.
    pub state: HubState,
    /// Maker slot.
    pub a: SideState,
    /// Taker slot, present once joined.
    pub b: Option<SideState>,
    /// Currency the maker asked for (the taker side of the trade).
    pub dst_currency: Currency,
    /// Amount the maker asked for.
    pub dst_amount: Amount,
    /// Anti-replay anchor from the advert.
    pub block_hash: [u8; 32],
    /// Creation timestamp claimed by the Maker.
    pub timestamp: u64,
    /// Record creation time.
    pub created_at: u64,
    /// Last mutation time.
    pub updated_at: u64,
}

impl ExchangeOrder {
    /// Create a pending order from a validated Maker advert.
    pub fn new(
        id: OrderId,
        a: SideState,
        dst_currency: Currency,
        dst_amount: Amount,
        block_hash: [u8; 32],
        timestamp: u64,
    ) -> Self {
        let now = now_secs();
        Self {
            id,
            state: HubState::New,
            a,
            b: None,
            dst_currency,
            dst_amount,
            block_hash,
            timestamp,
            created_at: now,
            updated_at: now,
        }
    }

    /// Join the first valid Taker. Fails once a taker is already in.
    pub fn join(&mut self, b: SideState) -> bool {
        if self.b.is_some() || self.state != HubState::New {
            return false;
        }
        self.b = Some(b);
        self.state = HubState::Joined;
        self.touch();
        true
    }

    /// Which side an address belongs to, if any.
    pub fn side_of(&self, address: &XAddress) -> Option<Role> {
        if self.a.address == *address || self.a.destination == *address {
            return Some(Role::Maker);
        }
        if let Some(b) = &self.b {
            if b.address == *address || b.destination == *address {
                return Some(Role::Taker);
            }
        }
        None
    }

    /// Slot for a role.
    pub fn side(&self, role: Role) -> Option<&SideState> {
        match role {
            Role::Maker => Some(&self.a),
            Role::Taker => self.b.as_ref(),
        }
    }

    fn side_mut(&mut self, role: Role) -> Option<&mut SideState> {
        match role {
            Role::Maker => Some(&mut self.a),
            Role::Taker => self.b.as_mut(),
        }
    }

    fn both(&self, f: impl Fn(&SideState) -> bool) -> bool {
        f(&self.a) && self.b.as_ref().map(&f).unwrap_or(false)
    }

    /// Record a hold acknowledgement; advance to `Hold` once both are in.
    pub fn apply_hold_ack(&mut self, role: Role) -> bool {
        if self.state != HubState::Joined {
            return false;
        }
        if let Some(side) = self.side_mut(role) {
            side.hold_applied = true;
        }
        self.touch();
        if self.both(|s| s.hold_applied) {
            self.state = HubState::Hold;
            return true;
        }
        false
    }

    /// Record an init acknowledgement; advance once both are in.
    pub fn apply_initialized(&mut self, role: Role) -> bool {
        if self.state != HubState::Hold {
            return false;
        }
        if let Some(side) = self.side_mut(role) {
            side.initialized = true;
        }
        self.touch();
        if self.both(|s| s.initialized) {
            self.state = HubState::Initialized;
            return true;
        }
        false
    }

    /// Record a deposit report; advance once both are in.
    pub fn apply_created(&mut self, role: Role, bin_txid: String) -> bool {
        if self.state != HubState::Initialized {
            return false;
        }
        if let Some(side) = self.side_mut(role) {
            side.created = true;
            side.bin_txid = Some(bin_txid);
        }
        self.touch();
        if self.both(|s| s.created) {
            self.state = HubState::Created;
            return true;
        }
        false
    }

    /// Record a redeem report; advance to `Finished` once both are in.
    pub fn apply_confirmed(&mut self, role: Role, pay_txid: String) -> bool {
        if self.state != HubState::Created {
            return false;
        }
        if let Some(side) = self.side_mut(role) {
            side.confirmed = true;
            side.pay_txid = Some(pay_txid);
        }
        self.touch();
        if self.both(|s| s.confirmed) {
            self.state = HubState::Finished;
            return true;
        }
        false
    }

    /// Refresh the mutation timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_secs();
    }

    /// Seconds since the last mutation.
    pub fn idle_secs(&self) -> u64 {
        now_secs().saturating_sub(self.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::KeyPair;

    fn side(seed: u8) -> SideState {
        SideState::new(
            [seed; 20],
            [seed + 100; 20],
            Currency::new("BLOCK").unwrap(),
            Amount::from_coins(10),
            KeyPair::generate().public_key(),
            vec![],
        )
    }

    fn joined_order() -> ExchangeOrder {
        let mut order = ExchangeOrder::new(
            OrderId::from_bytes([1; 32]),
            side(1),
            Currency::new("LTC").unwrap(),
            Amount::from_coins(1),
            [0; 32],
            1000,
        );
        assert!(order.join(side(2)));
        order
    }

    #[test]
    fn test_join_once_only() {
        let mut order = joined_order();
        assert_eq!(order.state, HubState::Joined);
        assert!(!order.join(side(3)));
    }

    #[test]
    fn test_side_of() {
        let order = joined_order();
        assert_eq!(order.side_of(&[1; 20]), Some(Role::Maker));
        assert_eq!(order.side_of(&[101; 20]), Some(Role::Maker));
        assert_eq!(order.side_of(&[2; 20]), Some(Role::Taker));
        assert_eq!(order.side_of(&[55; 20]), None);
    }

    #[test]
    fn test_hold_requires_both() {
        let mut order = joined_order();
        assert!(!order.apply_hold_ack(Role::Maker));
        assert_eq!(order.state, HubState::Joined);
        assert!(order.apply_hold_ack(Role::Taker));
        assert_eq!(order.state, HubState::Hold);
    }

    #[test]
    fn test_full_progression() {
        let mut order = joined_order();
        order.apply_hold_ack(Role::Maker);
        order.apply_hold_ack(Role::Taker);
        order.apply_initialized(Role::Maker);
        order.apply_initialized(Role::Taker);
        assert_eq!(order.state, HubState::Initialized);
        order.apply_created(Role::Maker, "a-deposit".to_string());
        order.apply_created(Role::Taker, "b-deposit".to_string());
        assert_eq!(order.state, HubState::Created);
        order.apply_confirmed(Role::Maker, "a-pay".to_string());
        assert!(order.apply_confirmed(Role::Taker, "b-pay".to_string()));
        assert_eq!(order.state, HubState::Finished);
        assert_eq!(order.a.pay_txid.as_deref(), Some("a-pay"));
    }

    #[test]
    fn test_out_of_phase_updates_rejected() {
        let mut order = joined_order();
        // Created before Hold/Init phases must not advance anything.
        assert!(!order.apply_created(Role::Maker, "early".to_string()));
        assert_eq!(order.state, HubState::Joined);
        assert!(!order.a.created);
    }
}
