//! # Watchdog
//!
//! Periodic sweep over a session's state:
//!
//! - re-drives parked packets whose prerequisites were not met yet,
//! - drives refunds for orders in rollback,
//! - watches the taker's deposit for the counterparty's spend so the
//!   secret can be learned even if the hub's hint never arrives,
//! - times out stalled hub orders and re-announces pending adverts.
//!
//! The watchdog itself is just a timer: every tick is delivered through
//! the session mailbox, so sweep work is serialized with packet handling.

use crate::domain::states::TradeState;
use crate::service::session::{
    Dispatch, Session, SessionCommand, SessionHandle, Side,
};
use crate::service::trader::{CounterpartyRedeem, OwnRedeem};
use ax_01_wire_protocol::{Command, ConfirmedBBody, Packet};
use shared_types::{OrderId, Role, TxCancelReason};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A packet waiting for its prerequisites.
#[derive(Clone, Debug)]
pub struct Parked {
    /// The packet to re-dispatch.
    pub packet: Packet,
    /// Attempts so far.
    pub attempts: u32,
}

/// Per-order FIFO of parked packets.
#[derive(Default)]
pub struct RetryQueue {
    by_order: HashMap<OrderId, VecDeque<Parked>>,
}

impl RetryQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a packet at the tail of its order's queue.
    pub fn park(&mut self, id: OrderId, packet: Packet) {
        self.by_order
            .entry(id)
            .or_default()
            .push_back(Parked { packet, attempts: 0 });
    }

    /// Re-park a packet that failed another attempt.
    pub fn park_again(&mut self, id: OrderId, parked: Parked) {
        self.by_order.entry(id).or_default().push_back(parked);
    }

    /// Drop everything parked for an order.
    pub fn remove(&mut self, id: &OrderId) {
        self.by_order.remove(id);
    }

    /// Take all parked packets, preserving per-order FIFO order.
    pub fn drain(&mut self) -> Vec<(OrderId, Parked)> {
        let mut out = Vec::new();
        for (id, mut queue) in std::mem::take(&mut self.by_order) {
            while let Some(parked) = queue.pop_front() {
                out.push((id, parked));
            }
        }
        out
    }

    /// Parked packets across all orders.
    pub fn len(&self) -> usize {
        self.by_order.values().map(VecDeque::len).sum()
    }

    /// True when nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.by_order.is_empty()
    }
}

impl Session {
    /// One watchdog sweep.
    pub async fn on_tick(&mut self) {
        self.retry_parked_packets().await;
        match self.side() {
            Side::Trader => self.trader_tick().await,
            Side::Hub => self.hub_tick().await,
        }
    }

    /// Re-dispatch every parked packet; keep the still-blocked ones, drop
    /// the handled and the fatal ones, and give up on deposits that never
    /// appeared within the retry limit.
    async fn retry_parked_packets(&mut self) {
        let parked = self.retries.drain();
        for (id, mut entry) in parked {
            let dispatch = self.process_packet(entry.packet.clone()).await;
            match dispatch {
                Dispatch::RetryLater(_) => {
                    entry.attempts += 1;
                    let exhausted = entry.attempts >= self.config.max_deposit_check_retries;
                    if exhausted && entry.packet.command() == Command::TransactionCreateB {
                        warn!(
                            order = %id.short(),
                            attempts = entry.attempts,
                            "counterparty deposit never appeared, cancelling order"
                        );
                        self.trader_send_cancel(id, TxCancelReason::BadADepositTx).await;
                        continue;
                    }
                    self.retries.park_again(id, entry);
                }
                Dispatch::Ok | Dispatch::Fatal(_) => {}
            }
        }
    }

    /// Trader-side sweep: rollbacks and the deposit-spend watcher.
    async fn trader_tick(&mut self) {
        for id in self.book.live_ids() {
            let Some(order) = self.book.get(&id) else {
                continue;
            };
            match order.state {
                TradeState::Rollback | TradeState::RollbackFailed => {
                    match self.redeem_own_deposit(id).await {
                        OwnRedeem::Done => {
                            debug!(order = %id.short(), "rollback complete");
                        }
                        OwnRedeem::NotYet | OwnRedeem::Failed => {}
                    }
                }
                state if state >= TradeState::Created && state < TradeState::Finished => {
                    if order.role == Role::Taker
                        && order.sent_deposit
                        && !order.redeemed_counterparty_deposit
                    {
                        self.watch_counterparty_spend(id).await;
                    }
                }
                _ => {}
            }
        }
    }

    /// Watch our deposit outpoint for the counterparty's spend; once it
    /// appears, extract the secret and redeem on the other chain, even if
    /// the hub's `TransactionConfirmB` never reached us.
    async fn watch_counterparty_spend(&mut self, id: OrderId) {
        let scan_needed = {
            let Some(order) = self.book.get(&id) else {
                return;
            };
            if order.done_watching {
                false
            } else {
                order.other_pay_txid.is_none()
                    || order.other_pay_tx_tries >= self.config.max_other_pay_tx_tries
            }
        };

        if scan_needed {
            let Some((currency, bin_txid, vout, watch_block)) =
                self.book.get(&id).and_then(|order| {
                    order
                        .bin_txid
                        .clone()
                        .map(|txid| (order.from_currency, txid, order.bin_tx_vout, order.watch_block))
                })
            else {
                return;
            };
            let Some(bridge) = self.bridge(currency) else {
                return;
            };
            match bridge.find_spend_of(&bin_txid, vout, watch_block).await {
                Ok(Some(spender)) => {
                    debug!(order = %id.short(), spend = %spender, "found spend of our deposit");
                    if let Some(order) = self.book.get_mut(&id) {
                        order.other_pay_txid = Some(spender);
                    }
                }
                Ok(None) => return,
                Err(_) => return,
            }
        }

        match self.redeem_counterparty_deposit(id).await {
            CounterpartyRedeem::Redeemed { pay_txid } => {
                let reply = {
                    let Some(order) = self.book.get_mut(&id) else {
                        return;
                    };
                    if order.state < TradeState::Committed {
                        order.advance(TradeState::Committed);
                    }
                    order.hub_address.map(|hub| {
                        (
                            hub,
                            order.keypair.clone(),
                            ConfirmedBBody {
                                hub_address: hub,
                                id,
                                pay_txid,
                            },
                        )
                    })
                };
                info!(order = %id.short(), "watcher redeemed counterparty deposit");
                self.notifier.order_changed(&id);
                if let Some((hub, Some(keypair), body)) = reply {
                    self.send_signed(
                        &hub,
                        Command::TransactionConfirmedB,
                        body.encode(),
                        &keypair,
                    )
                    .await;
                }
            }
            CounterpartyRedeem::WaitingSecret
            | CounterpartyRedeem::WaitingBroadcast
            | CounterpartyRedeem::Unavailable => {}
        }
    }

    /// Hub-side sweep: advert lifecycle, stalled orders, trader refunds.
    async fn hub_tick(&mut self) {
        // Expire or re-announce pending adverts.
        for id in self.registry.pending_ids() {
            let expired = self
                .registry
                .pending(&id)
                .map(|order| order.idle_secs() >= self.config.pending_order_ttl.as_secs())
                .unwrap_or(false);
            if expired {
                info!(order = %id.short(), "pending order expired");
                self.release_order_locks(&id);
                self.registry.remove_pending(&id);
                self.notifier.order_changed(&id);
            } else {
                self.hub_broadcast_pending(id).await;
            }
        }

        // Archive settled orders, time out stalled ones.
        for id in self.registry.active_ids() {
            let Some(order) = self.registry.active(&id) else {
                continue;
            };
            let state = order.state;
            let idle = order.idle_secs();
            if state.is_terminal() {
                debug!(order = %id.short(), %state, "archiving settled order");
                self.registry.archive(&id);
            } else if idle >= self.config.order_stall_timeout.as_secs() {
                info!(order = %id.short(), %state, idle, "order stalled, timing out");
                self.hub_cancel_order(id, TxCancelReason::Timeout).await;
            }
        }

        // Submit trader refunds whose locktime has passed on orders that
        // never finished.
        let watches = std::mem::take(&mut self.deposit_watches);
        let mut keep = Vec::with_capacity(watches.len());
        for watch in watches {
            let finished = self
                .registry
                .archived(&watch.order_id)
                .map(|order| order.state == crate::domain::HubState::Finished)
                .unwrap_or(false);
            if finished {
                continue;
            }
            let Some(bridge) = self.bridge(watch.currency) else {
                keep.push(watch);
                continue;
            };
            let height = match bridge.get_info().await {
                Ok(info) => info.blocks,
                Err(_) => {
                    keep.push(watch);
                    continue;
                }
            };
            if height < watch.lock_time {
                keep.push(watch);
                continue;
            }
            match bridge.send_raw_transaction(&watch.ref_tx).await {
                Ok(txid) => {
                    info!(
                        order = %watch.order_id.short(),
                        refund = %txid,
                        "submitted trader refund after locktime"
                    );
                }
                Err(err) if err.is_already_in_chain() => {}
                Err(err) => {
                    debug!(order = %watch.order_id.short(), %err, "trader refund not accepted yet");
                    keep.push(watch);
                }
            }
        }
        self.deposit_watches = keep;
    }
}

/// Spawn the periodic ticker feeding a session's mailbox.
pub fn spawn_watchdog(handle: SessionHandle, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if handle.send(SessionCommand::Tick).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax_01_wire_protocol::Command;

    fn packet() -> Packet {
        Packet::unsigned(Command::TransactionFinished, vec![0u8; 32])
    }

    #[test]
    fn test_park_and_drain_fifo() {
        let mut queue = RetryQueue::new();
        let id = OrderId::from_bytes([1; 32]);
        queue.park(id, packet());
        queue.park(id, packet());
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
        assert_eq!(drained[0].1.attempts, 0);
    }

    #[test]
    fn test_remove_drops_order_queue() {
        let mut queue = RetryQueue::new();
        let id = OrderId::from_bytes([1; 32]);
        let other = OrderId::from_bytes([2; 32]);
        queue.park(id, packet());
        queue.park(other, packet());
        queue.remove(&id);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain()[0].0, other);
    }

    #[test]
    fn test_park_again_keeps_attempts() {
        let mut queue = RetryQueue::new();
        let id = OrderId::from_bytes([1; 32]);
        queue.park_again(
            id,
            Parked {
                packet: packet(),
                attempts: 7,
            },
        );
        assert_eq!(queue.drain()[0].1.attempts, 7);
    }
}
