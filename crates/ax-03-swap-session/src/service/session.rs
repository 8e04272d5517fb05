//! # Session Actor
//!
//! A session is one protocol participant: a hub (service node) or a trader.
//! It owns its order book outright and processes one command at a time from
//! its mailbox, which serializes dispatch without any working-flag guard.
//!
//! Dispatch returns a structured result: handled, retry-later (the packet
//! is parked on the per-order retry queue for the watchdog), or fatal for
//! the order.

use crate::domain::errors::SessionError;
use crate::domain::order::{MakerOrderParams, TakerAcceptParams, TraderOrder};
use crate::domain::states::TradeState;
use crate::domain::invariants::{derive_order_id, OrderIdFields};
use crate::ports::outbound::{PacketSender, UiNotifier};
use crate::registry::{LocalOrderBook, OrderRegistry, UtxoLockTable};
use crate::service::watchdog::RetryQueue;
use crate::txlog::TxLog;
use ax_01_wire_protocol::{Command, Message, Packet, TransactionBody};
use ax_02_chain_bridge::ChainBridge;
use shared_crypto::KeyPair;
use shared_types::{Currency, OrderId, SessionId, TxCancelReason, XAddress};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Which handler table the session runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Service node: validates orders, pairs traders, relays progress.
    Hub,
    /// Maker/Taker: owns funds and drives on-chain transactions.
    Trader,
}

/// Session tuning.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Serve the hub handler table instead of the trader table.
    pub exchange_enabled: bool,
    /// Currency of the hub's service-fee chain.
    pub fee_currency: Currency,
    /// Deposit-probe retries before cancelling with a bad-deposit reason.
    pub max_deposit_check_retries: u32,
    /// Times the counterparty redeem hint is tried before scanning.
    pub max_other_pay_tx_tries: u32,
    /// Active order stall timeout before the hub cancels with `crTimeout`.
    pub order_stall_timeout: Duration,
    /// Pending advert lifetime on the hub.
    pub pending_order_ttl: Duration,
    /// Watchdog tick interval.
    pub watchdog_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchange_enabled: false,
            fee_currency: Currency::new("BLOCK").unwrap_or_else(|_| unreachable!()),
            max_deposit_check_retries: 30,
            max_other_pay_tx_tries: 5,
            order_stall_timeout: Duration::from_secs(30 * 60),
            pending_order_ttl: Duration::from_secs(60 * 60),
            watchdog_interval: Duration::from_secs(15),
        }
    }
}

/// Why a packet was parked for a later attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryReason {
    /// Counterparty deposit not visible on-chain yet.
    DepositNotVisible,
    /// Counterparty redeem (secret source) not visible yet.
    RedeemNotVisible,
    /// Refund locktime has not expired.
    LocktimeNotExpired,
    /// Service-fee transaction not accepted yet.
    FeeTxPending,
    /// Wallet driver unreachable.
    WalletUnavailable,
}

/// Why a packet will never be retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatalReason {
    /// Wire-level garbage; dropped silently.
    Malformed,
    /// The handler cancelled the order while processing.
    OrderCancelled(TxCancelReason),
}

/// Structured dispatch result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Handled (including silent drops).
    Ok,
    /// Park the packet; the watchdog re-drives it.
    RetryLater(RetryReason),
    /// Done with this packet for good.
    Fatal(FatalReason),
}

/// Commands accepted by a session's mailbox.
#[derive(Debug)]
pub enum SessionCommand {
    /// An inbound network packet.
    Packet(Packet),
    /// Watchdog tick.
    Tick,
    /// Publish a new order (trader sessions).
    SubmitOrder(MakerOrderParams),
    /// Accept an advertised order (trader sessions).
    AcceptOrder {
        /// Order to accept.
        id: OrderId,
        /// Funding and fee parameters.
        params: TakerAcceptParams,
    },
    /// Cancel an order on the user's behalf.
    Cancel {
        /// Order to cancel.
        id: OrderId,
        /// Reason carried in the cancel packet.
        reason: TxCancelReason,
    },
}

/// A hub-side reminder to submit a trader's refund once its locktime
/// passes and the order still has not finished.
#[derive(Clone, Debug)]
pub(crate) struct DepositWatch {
    pub order_id: OrderId,
    pub currency: Currency,
    pub lock_time: u32,
    pub ref_tx: String,
}

/// One protocol participant.
pub struct Session {
    pub(crate) session_id: SessionId,
    pub(crate) side: Side,
    pub(crate) config: SessionConfig,
    pub(crate) hub_keypair: Option<KeyPair>,
    pub(crate) bridges: HashMap<Currency, Arc<dyn ChainBridge>>,
    pub(crate) sender: Arc<dyn PacketSender>,
    pub(crate) notifier: Arc<dyn UiNotifier>,
    pub(crate) registry: OrderRegistry,
    pub(crate) book: LocalOrderBook,
    pub(crate) utxo_locks: Arc<UtxoLockTable>,
    pub(crate) retries: RetryQueue,
    pub(crate) deposit_watches: Vec<DepositWatch>,
    pub(crate) txlog: Option<TxLog>,
}

impl Session {
    /// Build a hub (service node) session.
    pub fn new_hub(
        config: SessionConfig,
        keypair: KeyPair,
        bridges: HashMap<Currency, Arc<dyn ChainBridge>>,
        sender: Arc<dyn PacketSender>,
        notifier: Arc<dyn UiNotifier>,
        utxo_locks: Arc<UtxoLockTable>,
        txlog: Option<TxLog>,
    ) -> Self {
        Self {
            session_id: SessionId::generate(),
            side: Side::Hub,
            config,
            hub_keypair: Some(keypair),
            bridges,
            sender,
            notifier,
            registry: OrderRegistry::new(),
            book: LocalOrderBook::new(),
            utxo_locks,
            retries: RetryQueue::new(),
            deposit_watches: Vec::new(),
            txlog,
        }
    }

    /// Build a trader session.
    pub fn new_trader(
        config: SessionConfig,
        bridges: HashMap<Currency, Arc<dyn ChainBridge>>,
        sender: Arc<dyn PacketSender>,
        notifier: Arc<dyn UiNotifier>,
        utxo_locks: Arc<UtxoLockTable>,
        txlog: Option<TxLog>,
    ) -> Self {
        Self {
            session_id: SessionId::generate(),
            side: Side::Trader,
            config,
            hub_keypair: None,
            bridges,
            sender,
            notifier,
            registry: OrderRegistry::new(),
            book: LocalOrderBook::new(),
            utxo_locks,
            retries: RetryQueue::new(),
            deposit_watches: Vec::new(),
            txlog,
        }
    }

    /// This session's routing address.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Which handler table this session runs.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Read access to the trader order book.
    pub fn book(&self) -> &LocalOrderBook {
        &self.book
    }

    /// Read access to the hub order registry.
    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    pub(crate) fn bridge(&self, currency: Currency) -> Option<Arc<dyn ChainBridge>> {
        self.bridges.get(&currency).cloned()
    }

    pub(crate) fn is_for_me(&self, addr: &XAddress) -> bool {
        self.session_id.as_address() == *addr
    }

    pub(crate) fn txlog_append(&self, kind: &str, order: &OrderId, detail: &str, raw: &str) {
        if let Some(txlog) = &self.txlog {
            txlog.append(kind, order, detail, raw);
        }
    }

    pub(crate) async fn send_signed(
        &self,
        to: &XAddress,
        command: Command,
        body: Vec<u8>,
        keypair: &KeyPair,
    ) {
        match Packet::signed(command, body, keypair) {
            Ok(packet) => {
                if let Err(err) = self.sender.send_to(to, packet).await {
                    warn!(%err, %command, "packet send failed");
                }
            }
            Err(err) => warn!(%err, %command, "packet signing failed"),
        }
    }

    pub(crate) async fn broadcast_signed(&self, command: Command, body: Vec<u8>, keypair: &KeyPair) {
        match Packet::signed(command, body, keypair) {
            Ok(packet) => {
                if let Err(err) = self.sender.broadcast(packet).await {
                    warn!(%err, %command, "packet broadcast failed");
                }
            }
            Err(err) => warn!(%err, %command, "packet signing failed"),
        }
    }

    /// Decode and dispatch one packet through this side's handler table.
    pub async fn process_packet(&mut self, mut packet: Packet) -> Dispatch {
        if packet.decrypt().is_err() {
            warn!("packet decoding error");
            return Dispatch::Fatal(FatalReason::Malformed);
        }

        let message = match Message::decode(&packet) {
            Ok(message) => message,
            Err(err) => {
                debug!(%err, command = %packet.command(), "dropping malformed packet");
                return Dispatch::Fatal(FatalReason::Malformed);
            }
        };

        trace!(command = %packet.command(), "received packet");

        match (self.side, message) {
            // No-op commands on either side.
            (_, Message::Invalid)
            | (_, Message::Announce)
            | (_, Message::XChatMessage)
            | (_, Message::ServicesPing) => Dispatch::Ok,

            // Hub table.
            (Side::Hub, Message::Transaction(body)) => {
                self.hub_process_transaction(body, &packet).await
            }
            (Side::Hub, Message::TransactionAccepting(body)) => {
                self.hub_process_accepting(body, &packet).await
            }
            (Side::Hub, Message::TransactionHoldApply(body)) => {
                self.hub_process_hold_apply(body, &packet).await
            }
            (Side::Hub, Message::TransactionInitialized(body)) => {
                self.hub_process_initialized(body, &packet).await
            }
            (Side::Hub, Message::TransactionCreatedA(body)) => {
                self.hub_process_created_a(body, &packet).await
            }
            (Side::Hub, Message::TransactionCreatedB(body)) => {
                self.hub_process_created_b(body, &packet).await
            }
            (Side::Hub, Message::TransactionConfirmedA(body)) => {
                self.hub_process_confirmed_a(body, &packet).await
            }
            (Side::Hub, Message::TransactionConfirmedB(body)) => {
                self.hub_process_confirmed_b(body, &packet).await
            }
            (Side::Hub, Message::TransactionCancel(body)) => {
                self.hub_process_cancel(body, &packet).await
            }
            (Side::Hub, Message::TransactionFinished(_)) => Dispatch::Ok,

            // Trader table.
            (Side::Trader, Message::PendingTransaction(body)) => {
                self.trader_process_pending(body, &packet).await
            }
            (Side::Trader, Message::TransactionHold(body)) => {
                self.trader_process_hold(body, &packet).await
            }
            (Side::Trader, Message::TransactionInit(body)) => {
                self.trader_process_init(body, &packet).await
            }
            (Side::Trader, Message::TransactionCreateA(body)) => {
                self.trader_process_create_a(body, &packet).await
            }
            (Side::Trader, Message::TransactionCreateB(body)) => {
                self.trader_process_create_b(body, &packet).await
            }
            (Side::Trader, Message::TransactionConfirmA(body)) => {
                self.trader_process_confirm_a(body, &packet).await
            }
            (Side::Trader, Message::TransactionConfirmB(body)) => {
                self.trader_process_confirm_b(body, &packet).await
            }
            (Side::Trader, Message::TransactionCancel(body)) => {
                self.trader_process_cancel(body, &packet).await
            }
            (Side::Trader, Message::TransactionFinished(body)) => {
                self.trader_process_finished(body, &packet).await
            }

            // Commands for the other side of the protocol: not ours.
            _ => Dispatch::Ok,
        }
    }

    /// Handle one mailbox command, parking retry-later packets.
    pub async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Packet(packet) => {
                let dispatch = self.process_packet(packet.clone()).await;
                if let Dispatch::RetryLater(reason) = dispatch {
                    if let Some(id) = Self::packet_order_id(&packet) {
                        debug!(order = %id.short(), ?reason, "parking packet for retry");
                        self.retries.park(id, packet);
                    }
                }
            }
            SessionCommand::Tick => self.on_tick().await,
            SessionCommand::SubmitOrder(params) => {
                if let Err(err) = self.submit_order(params).await {
                    warn!(%err, "order submission failed");
                }
            }
            SessionCommand::AcceptOrder { id, params } => {
                if let Err(err) = self.accept_order(id, params).await {
                    warn!(%err, order = %id.short(), "order acceptance failed");
                }
            }
            SessionCommand::Cancel { id, reason } => {
                if let Err(err) = self.user_cancel(id, reason).await {
                    warn!(%err, order = %id.short(), "user cancel failed");
                }
            }
        }
    }

    /// Order id a packet concerns, used as the retry-queue key.
    pub(crate) fn packet_order_id(packet: &Packet) -> Option<OrderId> {
        Message::decode(packet).ok().and_then(|m| m.order_id())
    }

    // =========================================================================
    // Trader order origination
    // =========================================================================

    /// Publish a new order as Maker: derive the canonical id, lock the
    /// committed UTXOs, and broadcast the advert to the network.
    pub async fn submit_order(&mut self, params: MakerOrderParams) -> Result<OrderId, SessionError> {
        let from_bridge = self
            .bridge(params.from_currency)
            .ok_or(SessionError::NoBridge(params.from_currency))?;
        let to_bridge = self
            .bridge(params.to_currency)
            .ok_or(SessionError::NoBridge(params.to_currency))?;

        let first_signature = params
            .utxos
            .first()
            .map(|u| u.signature.clone())
            .unwrap_or_default();
        let timestamp = crate::domain::order::now_secs();

        let src_addr = from_bridge.coin_address(&params.from);
        let dst_addr = to_bridge.coin_address(&params.to);
        let id = derive_order_id(&OrderIdFields {
            src_addr: &src_addr,
            src_currency: params.from_currency,
            src_amount: params.from_amount,
            dst_addr: &dst_addr,
            dst_currency: params.to_currency,
            dst_amount: params.to_amount,
            timestamp,
            anchor: &params.anchor,
            first_utxo_signature: &first_signature,
        });

        self.utxo_locks
            .lock_coins(params.from_currency, &params.utxos)
            .map_err(|(txid, vout)| SessionError::UtxoLocked { txid, vout })?;

        let order = TraderOrder::new_maker(id, params, timestamp);
        let body = TransactionBody {
            id,
            src_addr: order.from,
            src_currency: order.from_currency,
            src_amount: order.from_amount,
            dst_addr: order.to,
            dst_currency: order.to_currency,
            dst_amount: order.to_amount,
            timestamp,
            anchor: order.anchor,
            utxos: order.used_coins.clone(),
        };
        let keypair = order
            .keypair
            .as_ref()
            .cloned()
            .ok_or(SessionError::NotLocal(id))?;

        info!(order = %id.short(), "publishing order");
        self.book.insert(order);
        self.notifier.order_received(&id);

        self.broadcast_signed(Command::Transaction, body.encode()?, &keypair)
            .await;
        Ok(id)
    }

    /// Accept an advertised order as Taker: lock funding and fee UTXOs and
    /// send the acceptance to the advertising hub.
    pub async fn accept_order(
        &mut self,
        id: OrderId,
        params: TakerAcceptParams,
    ) -> Result<(), SessionError> {
        let advert = self.book.get(&id).ok_or(SessionError::UnknownOrder(id))?;
        if advert.is_local() || advert.state != TradeState::Pending {
            return Err(SessionError::UnknownOrder(id));
        }
        let hub_address = advert.hub_address.ok_or(SessionError::UnknownOrder(id))?;

        let order = TraderOrder::new_taker(advert, params);
        let from_currency = order.from_currency;

        self.utxo_locks
            .lock_coins(from_currency, &order.used_coins)
            .map_err(|(txid, vout)| SessionError::UtxoLocked { txid, vout })?;
        if let Err((txid, vout)) = self
            .utxo_locks
            .lock_fees(self.config.fee_currency, &order.fee_utxos)
        {
            self.utxo_locks.unlock_coins(from_currency, &order.used_coins);
            return Err(SessionError::UtxoLocked { txid, vout });
        }

        let body = ax_01_wire_protocol::AcceptingBody {
            hub_address,
            id,
            src_addr: order.from,
            src_currency: order.from_currency,
            src_amount: order.from_amount,
            dst_addr: order.to,
            dst_currency: order.to_currency,
            dst_amount: order.to_amount,
            utxos: order.used_coins.clone(),
        };
        let keypair = order
            .keypair
            .as_ref()
            .cloned()
            .ok_or(SessionError::NotLocal(id))?;

        info!(order = %id.short(), "accepting order");
        self.book.insert(order);
        self.notifier.order_changed(&id);

        self.send_signed(&hub_address, Command::TransactionAccepting, body.encode()?, &keypair)
            .await;
        Ok(())
    }
}

/// Cheap cloneable handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    session_id: SessionId,
}

impl SessionHandle {
    /// The session's routing address.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Enqueue a command; fails once the actor has stopped.
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SessionError::Transport("session mailbox closed".to_string()))
    }

    /// Deliver an inbound packet.
    pub async fn deliver(&self, packet: Packet) -> Result<(), SessionError> {
        self.send(SessionCommand::Packet(packet)).await
    }
}

/// Spawn a session actor, returning its handle and join handle.
pub fn spawn_session(mut session: Session) -> (SessionHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<SessionCommand>(256);
    let session_id = session.session_id();
    let join = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            session.handle_command(command).await;
        }
        debug!(session = %session_id, "session actor stopped");
    });
    (SessionHandle { tx, session_id }, join)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(!config.exchange_enabled);
        assert_eq!(config.max_deposit_check_retries, 30);
        assert_eq!(config.fee_currency.as_str(), "BLOCK");
    }

    #[test]
    fn test_dispatch_variants() {
        assert_eq!(Dispatch::Ok, Dispatch::Ok);
        assert_ne!(
            Dispatch::RetryLater(RetryReason::DepositNotVisible),
            Dispatch::Fatal(FatalReason::Malformed)
        );
    }
}
