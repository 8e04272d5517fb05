//! # Trader-Side Orders
//!
//! A trader's complete view of one swap: trade terms, per-order keys, HTLC
//! material, transaction ids and watcher bookkeeping. Orders observed from
//! `PendingTransaction` broadcasts carry no keys; only locally originated
//! orders (published or accepted here) do.

use crate::domain::states::TradeState;
use shared_crypto::{Hash160, KeyPair, PublicKey, SwapSecret};
use shared_types::{Amount, Currency, OrderId, Role, TxCancelReason, UtxoEntry, XAddress};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Parameters for publishing a new order as Maker.
#[derive(Debug)]
pub struct MakerOrderParams {
    /// Currency offered.
    pub from_currency: Currency,
    /// Amount offered.
    pub from_amount: Amount,
    /// Currency wanted.
    pub to_currency: Currency,
    /// Amount wanted.
    pub to_amount: Amount,
    /// Source address on the offered chain.
    pub from: XAddress,
    /// Destination address on the wanted chain.
    pub to: XAddress,
    /// Wallet UTXOs committed to the order.
    pub utxos: Vec<UtxoEntry>,
    /// Source-chain tip hash (anti-replay anchor).
    pub anchor: [u8; 32],
    /// Optional fixed refund address; a fresh one is requested otherwise.
    pub refund_address: Option<String>,
}

/// Parameters for accepting an advertised order as Taker.
#[derive(Debug)]
pub struct TakerAcceptParams {
    /// Source address on the chain the Taker pays from.
    pub from: XAddress,
    /// Destination address on the chain the Taker receives on.
    pub to: XAddress,
    /// Wallet UTXOs committed to the acceptance.
    pub utxos: Vec<UtxoEntry>,
    /// UTXOs reserved for the service fee.
    pub fee_utxos: Vec<UtxoEntry>,
    /// Pre-built raw service-fee transaction.
    pub raw_fee_tx: String,
    /// Optional fixed refund address.
    pub refund_address: Option<String>,
}

/// A trader's view of one order.
#[derive(Debug)]
pub struct TraderOrder {
    /// Order id.
    pub id: OrderId,
    /// Our role, when the order is local.
    pub role: Role,
    /// Current state.
    pub state: TradeState,

    /// Currency we pay.
    pub from_currency: Currency,
    /// Amount we pay.
    pub from_amount: Amount,
    /// Currency we receive.
    pub to_currency: Currency,
    /// Amount we receive.
    pub to_amount: Amount,
    /// Our source address.
    pub from: XAddress,
    /// Our destination address.
    pub to: XAddress,

    /// Hub routing address, learned from the first hub packet.
    pub hub_address: Option<XAddress>,
    /// Per-order keypair; `None` for orders merely observed on the network.
    pub keypair: Option<KeyPair>,
    /// Counterparty per-order public key.
    pub counterparty_pubkey: Option<PublicKey>,
    /// Hub public key pinned at first sight.
    pub hub_pubkey: Option<PublicKey>,

    /// The swap secret; chosen by the Maker, learned late by the Taker.
    pub secret: Option<SwapSecret>,
    /// Hashed secret locked by the counterparty's deposit (Taker view).
    pub counterparty_hashed_secret: Option<Hash160>,

    /// Our deposit locktime (absolute block height).
    pub lock_time: u32,
    /// Counterparty deposit locktime.
    pub opponent_lock_time: u32,

    /// Our HTLC redeem script.
    pub lock_script: Vec<u8>,
    /// P2SH address of our HTLC.
    pub lock_p2sh: String,
    /// Our deposit transaction id.
    pub bin_txid: Option<String>,
    /// HTLC output index in our deposit.
    pub bin_tx_vout: u32,
    /// Our raw deposit transaction.
    pub bin_tx: Option<String>,
    /// Wallet UTXOs funding the deposit.
    pub used_coins: Vec<UtxoEntry>,
    /// UTXOs reserved for the service fee (Taker).
    pub fee_utxos: Vec<UtxoEntry>,
    /// Pre-built raw service-fee transaction (Taker).
    pub raw_fee_tx: Option<String>,
    /// Refund destination.
    pub refund_address: Option<String>,
    /// Pre-signed refund transaction id.
    pub ref_txid: Option<String>,
    /// Pre-signed raw refund transaction.
    pub ref_tx: Option<String>,

    /// Counterparty deposit transaction id.
    pub o_bin_txid: Option<String>,
    /// Counterparty deposit HTLC output index.
    pub o_bin_tx_vout: u32,
    /// Counterparty HTLC redeem script.
    pub unlock_script: Vec<u8>,
    /// P2SH address of the counterparty HTLC.
    pub unlock_p2sh: String,
    /// Amount the counterparty locked beyond the agreed amount.
    pub o_overpayment: Amount,

    /// Our redeem transaction id.
    pub pay_txid: Option<String>,
    /// Our raw redeem transaction.
    pub pay_tx: Option<String>,

    /// Block height when our deposit was broadcast (watcher start).
    pub watch_block: u32,
    /// Counterparty redeem hint received via `TransactionConfirmB`.
    pub other_pay_txid: Option<String>,
    /// Times the hint has been tried before falling back to a chain scan.
    pub other_pay_tx_tries: u32,
    /// Watcher latch: set once the secret is extracted.
    pub done_watching: bool,

    /// Our deposit was handed to the network.
    pub sent_deposit: bool,
    /// Our redeem of the counterparty deposit was accepted.
    pub redeemed_counterparty_deposit: bool,

    /// Anti-replay anchor from the order advert.
    pub anchor: [u8; 32],
    /// Order creation timestamp claimed by the Maker.
    pub timestamp: u64,
    /// Terminal reason, when cancelled or rolled back.
    pub reason: Option<TxCancelReason>,
    /// Record creation time.
    pub created_at: u64,
    /// Last mutation time.
    pub updated_at: u64,
}

impl TraderOrder {
    fn base(
        id: OrderId,
        role: Role,
        state: TradeState,
        from_currency: Currency,
        from_amount: Amount,
        to_currency: Currency,
        to_amount: Amount,
    ) -> Self {
        let now = now_secs();
        Self {
            id,
            role,
            state,
            from_currency,
            from_amount,
            to_currency,
            to_amount,
            from: [0u8; 20],
            to: [0u8; 20],
            hub_address: None,
            keypair: None,
            counterparty_pubkey: None,
            hub_pubkey: None,
            secret: None,
            counterparty_hashed_secret: None,
            lock_time: 0,
            opponent_lock_time: 0,
            lock_script: Vec::new(),
            lock_p2sh: String::new(),
            bin_txid: None,
            bin_tx_vout: 0,
            bin_tx: None,
            used_coins: Vec::new(),
            fee_utxos: Vec::new(),
            raw_fee_tx: None,
            refund_address: None,
            ref_txid: None,
            ref_tx: None,
            o_bin_txid: None,
            o_bin_tx_vout: 0,
            unlock_script: Vec::new(),
            unlock_p2sh: String::new(),
            o_overpayment: Amount::ZERO,
            pay_txid: None,
            pay_tx: None,
            watch_block: 0,
            other_pay_txid: None,
            other_pay_tx_tries: 0,
            done_watching: false,
            sent_deposit: false,
            redeemed_counterparty_deposit: false,
            anchor: [0u8; 32],
            timestamp: now,
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a locally originated Maker order; chooses keys and the secret.
    pub fn new_maker(id: OrderId, params: MakerOrderParams, timestamp: u64) -> Self {
        let mut order = Self::base(
            id,
            Role::Maker,
            TradeState::New,
            params.from_currency,
            params.from_amount,
            params.to_currency,
            params.to_amount,
        );
        order.from = params.from;
        order.to = params.to;
        order.used_coins = params.utxos;
        order.anchor = params.anchor;
        order.timestamp = timestamp;
        order.refund_address = params.refund_address;
        order.keypair = Some(KeyPair::generate());
        order.secret = Some(SwapSecret::generate());
        order
    }

    /// Build a locally originated Taker order from an observed advert.
    ///
    /// The Taker pays what the Maker wants and receives what the Maker
    /// offers, so the trade terms flip.
    pub fn new_taker(advert: &TraderOrder, params: TakerAcceptParams) -> Self {
        let mut order = Self::base(
            advert.id,
            Role::Taker,
            TradeState::Accepting,
            advert.to_currency,
            advert.to_amount,
            advert.from_currency,
            advert.from_amount,
        );
        order.from = params.from;
        order.to = params.to;
        order.used_coins = params.utxos;
        order.fee_utxos = params.fee_utxos;
        order.raw_fee_tx = Some(params.raw_fee_tx);
        order.refund_address = params.refund_address;
        order.hub_address = advert.hub_address;
        order.hub_pubkey = advert.hub_pubkey;
        order.anchor = advert.anchor;
        order.timestamp = advert.timestamp;
        order.keypair = Some(KeyPair::generate());
        order
    }

    /// Build a record for an order observed from a hub broadcast.
    pub fn new_observed(
        id: OrderId,
        from_currency: Currency,
        from_amount: Amount,
        to_currency: Currency,
        to_amount: Amount,
        hub_address: XAddress,
        hub_pubkey: PublicKey,
        anchor: [u8; 32],
        timestamp: u64,
    ) -> Self {
        let mut order = Self::base(
            id,
            Role::Maker,
            TradeState::Pending,
            from_currency,
            from_amount,
            to_currency,
            to_amount,
        );
        order.hub_address = Some(hub_address);
        order.hub_pubkey = Some(hub_pubkey);
        order.anchor = anchor;
        order.timestamp = timestamp;
        order
    }

    /// True when this node owns the order (has its keys).
    pub fn is_local(&self) -> bool {
        self.keypair.is_some()
    }

    /// Our per-order public key.
    pub fn public_key(&self) -> Option<PublicKey> {
        self.keypair.as_ref().map(|k| k.public_key())
    }

    /// The hashed secret this order's HTLCs lock.
    ///
    /// The Maker derives it from its own secret; the Taker uses the value
    /// pinned from the Maker's deposit script.
    pub fn hashed_secret(&self) -> Option<Hash160> {
        match self.role {
            Role::Maker => self.secret.as_ref().map(|s| s.hashed()),
            Role::Taker => self.counterparty_hashed_secret,
        }
    }

    /// Move to a later state; refresh the mutation timestamp.
    pub fn advance(&mut self, state: TradeState) {
        self.state = state;
        self.touch();
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

    fn maker_params() -> MakerOrderParams {
        MakerOrderParams {
            from_currency: Currency::new("BLOCK").unwrap(),
            from_amount: Amount::from_coins(10),
            to_currency: Currency::new("LTC").unwrap(),
            to_amount: Amount::from_coins(1),
            from: [1u8; 20],
            to: [2u8; 20],
            utxos: vec![],
            anchor: [3u8; 32],
            refund_address: None,
        }
    }

    #[test]
    fn test_maker_order_has_keys_and_secret() {
        let order = TraderOrder::new_maker(OrderId::from_bytes([9; 32]), maker_params(), 1000);
        assert!(order.is_local());
        assert!(order.secret.is_some());
        assert!(order.hashed_secret().is_some());
        assert_eq!(order.state, TradeState::New);
        assert_eq!(order.role, Role::Maker);
    }

    #[test]
    fn test_observed_order_is_not_local() {
        let hub_key = KeyPair::generate().public_key();
        let order = TraderOrder::new_observed(
            OrderId::from_bytes([9; 32]),
            Currency::new("BLOCK").unwrap(),
            Amount::from_coins(10),
            Currency::new("LTC").unwrap(),
            Amount::from_coins(1),
            [4u8; 20],
            hub_key,
            [3u8; 32],
            1000,
        );
        assert!(!order.is_local());
        assert!(order.hashed_secret().is_none());
        assert_eq!(order.state, TradeState::Pending);
    }

    #[test]
    fn test_taker_order_flips_terms() {
        let hub_key = KeyPair::generate().public_key();
        let advert = TraderOrder::new_observed(
            OrderId::from_bytes([9; 32]),
            Currency::new("BLOCK").unwrap(),
            Amount::from_coins(10),
            Currency::new("LTC").unwrap(),
            Amount::from_coins(1),
            [4u8; 20],
            hub_key,
            [3u8; 32],
            1000,
        );
        let taker = TraderOrder::new_taker(
            &advert,
            TakerAcceptParams {
                from: [5u8; 20],
                to: [6u8; 20],
                utxos: vec![],
                fee_utxos: vec![],
                raw_fee_tx: "raw".to_string(),
                refund_address: None,
            },
        );
        assert_eq!(taker.role, Role::Taker);
        assert_eq!(taker.from_currency, Currency::new("LTC").unwrap());
        assert_eq!(taker.to_currency, Currency::new("BLOCK").unwrap());
        assert_eq!(taker.from_amount, Amount::from_coins(1));
        assert_eq!(taker.to_amount, Amount::from_coins(10));
        assert!(taker.is_local());
        assert!(taker.secret.is_none());
    }

    #[test]
    fn test_advance_touches_timestamp() {
        let mut order = TraderOrder::new_maker(OrderId::from_bytes([9; 32]), maker_params(), 1000);
        let before = order.updated_at;
        order.advance(TradeState::Pending);
        assert_eq!(order.state, TradeState::Pending);
        assert!(order.updated_at >= before);
    }
}
