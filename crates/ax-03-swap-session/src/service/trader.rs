//! # Trader Handlers
//!
//! The Maker/Taker half of the protocol: reacting to hub instructions,
//! building and broadcasting deposits, refunds and redeems, and rolling
//! back on cancellation.
//!
//! Every handler runs the same three checks before touching business
//! logic: the order exists locally, the packet verifies under the pinned
//! hub key or the expected trader key, and the monotone state guard
//! holds. A packet that would regress state is dropped, which makes
//! duplicate delivery harmless.

use crate::domain::order::TraderOrder;
use crate::domain::states::TradeState;
use crate::service::session::{Dispatch, FatalReason, RetryReason, Session};
use ax_01_wire_protocol::{
    CancelBody, Command, ConfirmABody, ConfirmBBody, ConfirmedABody, ConfirmedBBody, CreateABody,
    CreateBBody, CreatedABody, CreatedBBody, FinishedBody, HoldApplyBody, HoldBody, InitBody,
    InitializedBody, Packet, PendingTransactionBody,
};
use ax_02_chain_bridge::{
    BridgeError, ChainBridge, SecretProbe, TxInput, TxOutput,
};
use shared_crypto::KeyPair;
use shared_types::{Amount, OrderId, Role, TxCancelReason, UtxoEntry};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of reclaiming our own deposit through the refund path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OwnRedeem {
    /// Nothing left to do (refunded, or no deposit ever left).
    Done,
    /// Locktime has not expired yet; try again later.
    NotYet,
    /// Broadcast failed; try again later.
    Failed,
}

/// Outcome of redeeming the counterparty's deposit.
#[derive(Clone, Debug)]
pub(crate) enum CounterpartyRedeem {
    /// Redeem accepted by the network.
    Redeemed {
        /// Our redeem transaction id.
        pay_txid: String,
    },
    /// The secret has not shown up on-chain yet.
    WaitingSecret,
    /// The redeem could not be broadcast yet.
    WaitingBroadcast,
    /// Wallet unreachable.
    Unavailable,
}

/// Fee-aware input selection: consume UTXOs in order until they cover
/// `amount + fee1(n) + fee2`.
fn select_inputs(
    bridge: &Arc<dyn ChainBridge>,
    coins: &[UtxoEntry],
    amount: Amount,
    fee2: Amount,
) -> Option<(Vec<UtxoEntry>, Amount, Amount)> {
    let mut selected = Vec::new();
    let mut total = Amount::ZERO;
    let mut fee1 = Amount::ZERO;
    for utxo in coins {
        selected.push(utxo.clone());
        total = total.checked_add(utxo.amount)?;
        fee1 = bridge.min_tx_fee1(selected.len(), 3);
        debug!(txid = %utxo.txid, vout = utxo.vout, amount = %utxo.amount, "using utxo item");
        let required = amount.checked_add(fee1)?.checked_add(fee2)?;
        if total >= required {
            return Some((selected, total, fee1));
        }
    }
    None
}

impl Session {
    /// `PendingTransaction`: hub broadcast of a (possibly refreshed) order.
    pub(crate) async fn trader_process_pending(
        &mut self,
        body: PendingTransactionBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;

        if let Some(order) = self.book.get_mut(&id) {
            // Pinned-key check: only the service node first seen with this
            // order may update it. Our own fresh orders pin here, on
            // the hub's first confirmation.
            match order.hub_pubkey {
                Some(pin) => {
                    if !packet.verify_with(&pin) {
                        warn!(order = %id.short(), "wrong service node for order, ignoring");
                        return Dispatch::Ok;
                    }
                }
                None => {
                    if !packet.verify() {
                        warn!(order = %id.short(), "invalid advert signature");
                        return Dispatch::Ok;
                    }
                    match packet.sender_pubkey() {
                        Ok(hub_pubkey) => order.hub_pubkey = Some(hub_pubkey),
                        Err(_) => return Dispatch::Ok,
                    }
                }
            }
            if order.state == TradeState::Cancelled {
                debug!(order = %id.short(), "order already cancelled, ignoring advert");
                return Dispatch::Ok;
            }
            if order.state > TradeState::Pending {
                debug!(order = %id.short(), state = %order.state, "order already in progress");
                return Dispatch::Ok;
            }
            if order.state == TradeState::New {
                debug!(order = %id.short(), "order confirmed by service node");
                order.state = TradeState::Pending;
            }
            order.hub_address = Some(body.hub_address);
            order.touch();
            self.notifier.order_changed(&id);
            return Dispatch::Ok;
        }

        // First sight of a foreign order: pin the service node key.
        if !packet.verify() {
            warn!(order = %id.short(), "invalid advert signature");
            return Dispatch::Ok;
        }
        let Ok(hub_pubkey) = packet.sender_pubkey() else {
            return Dispatch::Ok;
        };
        if self.bridge(body.src_currency).is_none() || self.bridge(body.dst_currency).is_none() {
            debug!(order = %id.short(), "advert for unsupported currency pair");
            return Dispatch::Ok;
        }

        let order = TraderOrder::new_observed(
            id,
            body.src_currency,
            body.src_amount,
            body.dst_currency,
            body.dst_amount,
            body.hub_address,
            hub_pubkey,
            body.anchor,
            body.timestamp,
        );
        info!(order = %id.short(), "received order");
        self.book.insert(order);
        self.notifier.order_received(&id);
        Dispatch::Ok
    }

    /// `TransactionHold`: the hub froze the order for setup.
    pub(crate) async fn trader_process_hold(
        &mut self,
        body: HoldBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;
        let Some(order) = self.book.get(&id) else {
            debug!(order = %id.short(), "hold for unknown order");
            return Dispatch::Ok;
        };
        let Some(pin) = order.hub_pubkey else {
            return Dispatch::Ok;
        };
        if !packet.verify_with(&pin) {
            warn!(order = %id.short(), "wrong service node on hold, ignoring");
            return Dispatch::Ok;
        }
        if order.state >= TradeState::Hold {
            warn!(order = %id.short(), state = %order.state, "hold in wrong state");
            return Dispatch::Ok;
        }

        if !order.is_local() {
            // Someone else's order got taken; archive the observation.
            if let Some(order) = self.book.get_mut(&id) {
                order.advance(TradeState::Finished);
            }
            self.book.archive(&id);
            self.notifier.order_changed(&id);
            return Dispatch::Ok;
        }

        let (from, keypair) = {
            let Some(order) = self.book.get_mut(&id) else {
                return Dispatch::Ok;
            };
            let Some(keypair) = order.keypair.clone() else {
                return Dispatch::Ok;
            };
            order.hub_address = Some(body.hub_address);
            order.advance(TradeState::Hold);
            (order.from, keypair)
        };
        info!(order = %id.short(), "holding order");
        self.notifier.order_changed(&id);

        let reply = HoldApplyBody {
            hub_address: body.hub_address,
            from,
            id,
        };
        self.send_signed(
            &body.hub_address,
            Command::TransactionHoldApply,
            reply.encode(),
            &keypair,
        )
        .await;
        Dispatch::Ok
    }

    /// `TransactionInit`: the hub sent the swap parameters.
    pub(crate) async fn trader_process_init(
        &mut self,
        body: InitBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;
        let Some(order) = self.book.get(&id) else {
            debug!(order = %id.short(), "init for unknown order");
            return Dispatch::Ok;
        };
        if !order.is_local() {
            error!(order = %id.short(), "init for a non-local order");
            return Dispatch::Ok;
        }
        let Some(pin) = order.hub_pubkey else {
            return Dispatch::Ok;
        };
        if !packet.verify_with(&pin) {
            warn!(order = %id.short(), "wrong service node on init, ignoring");
            return Dispatch::Ok;
        }
        if order.state >= TradeState::Initialized {
            warn!(order = %id.short(), state = %order.state, "init in wrong state");
            return Dispatch::Ok;
        }
        if body.from != order.from
            || body.from_currency != order.from_currency
            || body.from_amount != order.from_amount
            || body.to_currency != order.to_currency
            || body.to_amount != order.to_amount
        {
            warn!(order = %id.short(), "init parameters do not match the order");
            return Dispatch::Ok;
        }

        let role = order.role;
        let from = order.from;
        let Some(keypair) = order.keypair.clone() else {
            return Dispatch::Ok;
        };
        let fee_utxos = order.fee_utxos.clone();
        let raw_fee_tx = order.raw_fee_tx.clone();

        // The taker pays the service fee before acknowledging.
        let mut fee_txid = [0u8; 32];
        if role == Role::Taker {
            let Some(raw) = raw_fee_tx else {
                warn!(order = %id.short(), "no fee transaction prepared, cancelling");
                self.trader_send_cancel(id, TxCancelReason::BlocknetError).await;
                return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BlocknetError));
            };
            let Some(fee_bridge) = self.bridge(self.config.fee_currency) else {
                warn!(order = %id.short(), "no fee chain connector");
                return Dispatch::Ok;
            };
            match fee_bridge.send_raw_transaction(&raw).await {
                Ok(txid) => {
                    if let Ok(bytes) = hex::decode(&txid) {
                        if bytes.len() == 32 {
                            fee_txid.copy_from_slice(&bytes);
                        }
                    }
                    // Fee paid: its inputs come off the fee pool.
                    self.utxo_locks.unlock_fees(self.config.fee_currency, &fee_utxos);
                }
                Err(err) if err.is_already_in_chain() => {
                    self.utxo_locks.unlock_fees(self.config.fee_currency, &fee_utxos);
                }
                Err(BridgeError::Unavailable(_)) => {
                    debug!(order = %id.short(), "fee chain unavailable, retrying later");
                    return Dispatch::RetryLater(RetryReason::FeeTxPending);
                }
                Err(err) => {
                    warn!(order = %id.short(), %err, "fee transaction rejected, cancelling");
                    self.trader_send_cancel(id, TxCancelReason::BlocknetError).await;
                    return Dispatch::Fatal(FatalReason::OrderCancelled(
                        TxCancelReason::BlocknetError,
                    ));
                }
            }
        }

        if let Some(order) = self.book.get_mut(&id) {
            order.advance(TradeState::Initialized);
        }
        self.notifier.order_changed(&id);

        let reply = InitializedBody {
            hub_address: body.hub_address,
            from,
            id,
            fee_txid,
        };
        self.send_signed(
            &body.hub_address,
            Command::TransactionInitialized,
            reply.encode(),
            &keypair,
        )
        .await;
        Dispatch::Ok
    }

    /// `TransactionCreateA`: build and broadcast the Maker deposit.
    pub(crate) async fn trader_process_create_a(
        &mut self,
        body: CreateABody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;

        // Guards, then a snapshot of everything the chain work needs.
        let (keypair, from_currency, to_currency, from_amount, coins, refund_address, hashed) = {
            let Some(order) = self.book.get(&id) else {
                debug!(order = %id.short(), "create A for unknown order");
                return Dispatch::Ok;
            };
            if !order.is_local() {
                error!(order = %id.short(), "create A for a non-local order");
                return Dispatch::Ok;
            }
            let Some(pin) = order.hub_pubkey else {
                return Dispatch::Ok;
            };
            if !packet.verify_with(&pin) {
                warn!(order = %id.short(), "wrong service node on create A, ignoring");
                return Dispatch::Ok;
            }
            if order.role != Role::Maker {
                error!(order = %id.short(), "create A sent to the wrong role");
                return Dispatch::Ok;
            }
            if order.state >= TradeState::Created {
                warn!(order = %id.short(), state = %order.state, "create A in wrong state");
                return Dispatch::Ok;
            }
            let Some(keypair) = order.keypair.clone() else {
                return Dispatch::Ok;
            };
            let Some(hashed) = order.hashed_secret() else {
                return Dispatch::Ok;
            };
            (
                keypair,
                order.from_currency,
                order.to_currency,
                order.from_amount,
                order.used_coins.clone(),
                order.refund_address.clone(),
                hashed,
            )
        };

        let (Some(from_bridge), Some(to_bridge)) =
            (self.bridge(from_currency), self.bridge(to_currency))
        else {
            warn!(order = %id.short(), "no connector, cancelling");
            self.trader_send_cancel(id, TxCancelReason::RpcError).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::RpcError));
        };

        let fee2 = from_bridge.min_tx_fee2(1, 1);
        let Some((inputs, in_amount, fee1)) =
            select_inputs(&from_bridge, &coins, from_amount, fee2)
        else {
            info!(order = %id.short(), "insufficient funds, cancelling order");
            self.trader_send_cancel(id, TxCancelReason::NoMoney).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::NoMoney));
        };

        let (lock_time, opponent_lock_time) = match (
            from_bridge.lock_time(Role::Maker).await,
            to_bridge.lock_time(Role::Taker).await,
        ) {
            (Ok(a), Ok(b)) if a > 0 && b > 0 => (a, b),
            _ => {
                warn!(order = %id.short(), "locktime error, cancelling order");
                self.trader_send_cancel(id, TxCancelReason::RpcError).await;
                return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::RpcError));
            }
        };

        let my_pubkey = keypair.public_key();
        let lock_script = from_bridge.create_deposit_unlock_script(
            &my_pubkey,
            &body.counterparty_pubkey,
            &hashed,
            lock_time,
        );
        let lock_p2sh = from_bridge.script_p2sh_address(&lock_script);

        match self
            .build_and_send_deposit(
                id,
                &from_bridge,
                &keypair,
                &inputs,
                in_amount,
                from_amount,
                fee1,
                fee2,
                &lock_script,
                &lock_p2sh,
                lock_time,
                refund_address,
            )
            .await
        {
            Ok(deposit) => {
                let reply = {
                    let Some(order) = self.book.get_mut(&id) else {
                        return Dispatch::Ok;
                    };
                    order.counterparty_pubkey = Some(body.counterparty_pubkey);
                    order.lock_time = lock_time;
                    order.opponent_lock_time = opponent_lock_time;
                    order.lock_script = lock_script;
                    order.lock_p2sh = lock_p2sh;
                    order.bin_txid = Some(deposit.bin_txid.clone());
                    order.bin_tx_vout = deposit.bin_vout;
                    order.bin_tx = Some(deposit.bin_tx);
                    order.refund_address = Some(deposit.refund_address);
                    order.ref_txid = Some(deposit.ref_txid.clone());
                    order.ref_tx = Some(deposit.ref_tx.clone());
                    order.sent_deposit = true;
                    order.advance(TradeState::Created);
                    CreatedABody {
                        hub_address: body.hub_address,
                        id,
                        bin_txid: deposit.bin_txid,
                        hashed_secret: hashed,
                        locktime_a: lock_time,
                        ref_txid: deposit.ref_txid,
                        ref_tx: deposit.ref_tx,
                    }
                };
                info!(order = %id.short(), deposit = %reply.bin_txid, "deposited in p2sh");
                self.notifier.order_changed(&id);
                self.send_signed(
                    &body.hub_address,
                    Command::TransactionCreatedA,
                    reply.encode(),
                    &keypair,
                )
                .await;
                Dispatch::Ok
            }
            Err(reason) => {
                self.trader_send_cancel(id, reason).await;
                Dispatch::Fatal(FatalReason::OrderCancelled(reason))
            }
        }
    }

    /// `TransactionCreateB`: verify the Maker deposit, then build our own.
    pub(crate) async fn trader_process_create_b(
        &mut self,
        body: CreateBBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;

        let (keypair, from_currency, to_currency, from_amount, to_amount, coins, refund_address) = {
            let Some(order) = self.book.get(&id) else {
                debug!(order = %id.short(), "create B for unknown order");
                return Dispatch::Ok;
            };
            if !order.is_local() {
                error!(order = %id.short(), "create B for a non-local order");
                return Dispatch::Ok;
            }
            let Some(pin) = order.hub_pubkey else {
                return Dispatch::Ok;
            };
            if !packet.verify_with(&pin) {
                warn!(order = %id.short(), "wrong service node on create B, ignoring");
                return Dispatch::Ok;
            }
            if order.state >= TradeState::Created {
                warn!(order = %id.short(), state = %order.state, "create B in wrong state");
                return Dispatch::Ok;
            }
            if body.a_bin_txid.is_empty() {
                warn!(order = %id.short(), "empty counterparty deposit id, cancelling");
                self.trader_send_cancel(id, TxCancelReason::BadADepositTx).await;
                return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BadADepositTx));
            }
            if order.role != Role::Taker {
                error!(order = %id.short(), "create B sent to the wrong role");
                return Dispatch::Ok;
            }
            if order.secret.is_some() {
                error!(order = %id.short(), "taker order already holds a secret");
                return Dispatch::Ok;
            }
            let Some(keypair) = order.keypair.clone() else {
                return Dispatch::Ok;
            };
            (
                keypair,
                order.from_currency,
                order.to_currency,
                order.from_amount,
                order.to_amount,
                order.used_coins.clone(),
                order.refund_address.clone(),
            )
        };

        let (Some(from_bridge), Some(to_bridge)) =
            (self.bridge(from_currency), self.bridge(to_currency))
        else {
            warn!(order = %id.short(), "no connector, cancelling");
            self.trader_send_cancel(id, TxCancelReason::RpcError).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::RpcError));
        };

        // The Maker's locktime must match the counterparty chain's policy
        // within the accepted drift.
        match to_bridge
            .acceptable_lock_time_drift(Role::Maker, body.locktime_a)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    order = %id.short(),
                    locktime = body.locktime_a,
                    "incorrect locktime from counterparty, cancelling"
                );
                self.trader_send_cancel(id, TxCancelReason::BadADepositTx).await;
                return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BadADepositTx));
            }
            Err(_) => return Dispatch::RetryLater(RetryReason::WalletUnavailable),
        }

        // Counterparty HTLC script: the Maker owns the refund path, we own
        // the redeem path, and the hashed secret is the Maker's.
        let my_pubkey = keypair.public_key();
        let counterparty_script = to_bridge.create_deposit_unlock_script(
            &body.counterparty_pubkey,
            &my_pubkey,
            &body.hashed_secret,
            body.locktime_a,
        );
        let counterparty_p2sh = to_bridge.script_p2sh_address(&counterparty_script);

        let check = match to_bridge
            .check_deposit_transaction(&body.a_bin_txid, to_amount, &counterparty_p2sh)
            .await
        {
            Ok(Some(check)) => check,
            Ok(None) => {
                debug!(order = %id.short(), "counterparty deposit not visible yet");
                return Dispatch::RetryLater(RetryReason::DepositNotVisible);
            }
            Err(_) => return Dispatch::RetryLater(RetryReason::WalletUnavailable),
        };
        if !check.is_good {
            warn!(order = %id.short(), "bad counterparty deposit, cancelling order");
            self.trader_send_cancel(id, TxCancelReason::BadADepositTx).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BadADepositTx));
        }
        info!(order = %id.short(), "counterparty deposit confirmed");

        let fee2 = from_bridge.min_tx_fee2(1, 1);
        let Some((inputs, in_amount, fee1)) =
            select_inputs(&from_bridge, &coins, from_amount, fee2)
        else {
            info!(order = %id.short(), "insufficient funds, cancelling order");
            self.trader_send_cancel(id, TxCancelReason::NoMoney).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::NoMoney));
        };

        let lock_time = match from_bridge.lock_time(Role::Taker).await {
            Ok(lock_time) if lock_time > 0 => lock_time,
            _ => {
                warn!(order = %id.short(), "locktime error, cancelling order");
                self.trader_send_cancel(id, TxCancelReason::RpcError).await;
                return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::RpcError));
            }
        };

        // Our deposit locks the same hashed secret the Maker's does.
        let lock_script = from_bridge.create_deposit_unlock_script(
            &my_pubkey,
            &body.counterparty_pubkey,
            &body.hashed_secret,
            lock_time,
        );
        let lock_p2sh = from_bridge.script_p2sh_address(&lock_script);

        let watch_block = match from_bridge.get_info().await {
            Ok(info) => info.blocks,
            Err(_) => {
                warn!(order = %id.short(), "failed to obtain block count, cancelling");
                self.trader_send_cancel(id, TxCancelReason::RpcError).await;
                return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::RpcError));
            }
        };

        match self
            .build_and_send_deposit(
                id,
                &from_bridge,
                &keypair,
                &inputs,
                in_amount,
                from_amount,
                fee1,
                fee2,
                &lock_script,
                &lock_p2sh,
                lock_time,
                refund_address,
            )
            .await
        {
            Ok(deposit) => {
                let reply = {
                    let Some(order) = self.book.get_mut(&id) else {
                        return Dispatch::Ok;
                    };
                    order.counterparty_pubkey = Some(body.counterparty_pubkey);
                    order.counterparty_hashed_secret = Some(body.hashed_secret);
                    order.lock_time = lock_time;
                    order.opponent_lock_time = body.locktime_a;
                    order.o_bin_txid = Some(body.a_bin_txid.clone());
                    order.o_bin_tx_vout = check.vout;
                    order.o_overpayment = check.overpayment;
                    order.unlock_script = counterparty_script;
                    order.unlock_p2sh = counterparty_p2sh;
                    order.lock_script = lock_script;
                    order.lock_p2sh = lock_p2sh;
                    order.bin_txid = Some(deposit.bin_txid.clone());
                    order.bin_tx_vout = deposit.bin_vout;
                    order.bin_tx = Some(deposit.bin_tx);
                    order.refund_address = Some(deposit.refund_address);
                    order.ref_txid = Some(deposit.ref_txid.clone());
                    order.ref_tx = Some(deposit.ref_tx.clone());
                    order.watch_block = watch_block;
                    order.sent_deposit = true;
                    order.advance(TradeState::Created);
                    CreatedBBody {
                        hub_address: body.hub_address,
                        id,
                        bin_txid: deposit.bin_txid,
                        locktime_b: lock_time,
                        ref_txid: deposit.ref_txid,
                        ref_tx: deposit.ref_tx,
                    }
                };
                info!(order = %id.short(), deposit = %reply.bin_txid, "deposited in p2sh");
                self.notifier.order_changed(&id);
                self.send_signed(
                    &body.hub_address,
                    Command::TransactionCreatedB,
                    reply.encode(),
                    &keypair,
                )
                .await;
                Dispatch::Ok
            }
            Err(reason) => {
                self.trader_send_cancel(id, reason).await;
                Dispatch::Fatal(FatalReason::OrderCancelled(reason))
            }
        }
    }

    /// `TransactionConfirmA`: verify the Taker deposit and redeem it,
    /// revealing the secret on chain B.
    pub(crate) async fn trader_process_confirm_a(
        &mut self,
        body: ConfirmABody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;

        let (keypair, to_currency, to_amount, hashed, counterparty_pubkey) = {
            let Some(order) = self.book.get(&id) else {
                debug!(order = %id.short(), "confirm A for unknown order");
                return Dispatch::Ok;
            };
            if !order.is_local() {
                error!(order = %id.short(), "confirm A for a non-local order");
                return Dispatch::Ok;
            }
            let Some(pin) = order.hub_pubkey else {
                return Dispatch::Ok;
            };
            if !packet.verify_with(&pin) {
                warn!(order = %id.short(), "wrong service node on confirm A, ignoring");
                return Dispatch::Ok;
            }
            if order.state >= TradeState::Committed {
                warn!(order = %id.short(), state = %order.state, "confirm A in wrong state");
                return Dispatch::Ok;
            }
            if order.role != Role::Maker {
                error!(order = %id.short(), "confirm A sent to the wrong role");
                return Dispatch::Ok;
            }
            let Some(keypair) = order.keypair.clone() else {
                return Dispatch::Ok;
            };
            let Some(hashed) = order.hashed_secret() else {
                return Dispatch::Ok;
            };
            let Some(counterparty_pubkey) = order.counterparty_pubkey else {
                return Dispatch::Ok;
            };
            (
                keypair,
                order.to_currency,
                order.to_amount,
                hashed,
                counterparty_pubkey,
            )
        };

        let Some(to_bridge) = self.bridge(to_currency) else {
            warn!(order = %id.short(), "no connector, cancelling");
            self.trader_send_cancel(id, TxCancelReason::RpcError).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::RpcError));
        };

        match to_bridge
            .acceptable_lock_time_drift(Role::Taker, body.locktime_b)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    order = %id.short(),
                    locktime = body.locktime_b,
                    "incorrect locktime from counterparty, cancelling"
                );
                self.trader_send_cancel(id, TxCancelReason::BadBDepositTx).await;
                return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BadBDepositTx));
            }
            Err(_) => return Dispatch::RetryLater(RetryReason::WalletUnavailable),
        }

        // The Taker's HTLC: they own the refund path, we redeem with the
        // secret we chose.
        let my_pubkey = keypair.public_key();
        let counterparty_script = to_bridge.create_deposit_unlock_script(
            &counterparty_pubkey,
            &my_pubkey,
            &hashed,
            body.locktime_b,
        );
        let counterparty_p2sh = to_bridge.script_p2sh_address(&counterparty_script);

        let check = match to_bridge
            .check_deposit_transaction(&body.b_bin_txid, to_amount, &counterparty_p2sh)
            .await
        {
            Ok(Some(check)) => check,
            Ok(None) => {
                debug!(order = %id.short(), "counterparty deposit not visible yet");
                return Dispatch::RetryLater(RetryReason::DepositNotVisible);
            }
            Err(_) => return Dispatch::RetryLater(RetryReason::WalletUnavailable),
        };
        if !check.is_good {
            warn!(order = %id.short(), "bad counterparty deposit, cancelling order");
            self.trader_send_cancel(id, TxCancelReason::BadBDepositTx).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BadBDepositTx));
        }
        info!(order = %id.short(), "counterparty deposit confirmed");

        {
            let Some(order) = self.book.get_mut(&id) else {
                return Dispatch::Ok;
            };
            order.opponent_lock_time = body.locktime_b;
            order.o_bin_txid = Some(body.b_bin_txid.clone());
            order.o_bin_tx_vout = check.vout;
            order.o_overpayment = check.overpayment;
            order.unlock_script = counterparty_script;
            order.unlock_p2sh = counterparty_p2sh;
        }

        match self.redeem_counterparty_deposit(id).await {
            CounterpartyRedeem::Redeemed { pay_txid } => {
                if let Some(order) = self.book.get_mut(&id) {
                    order.advance(TradeState::Committed);
                }
                self.notifier.order_changed(&id);
                let reply = ConfirmedABody {
                    hub_address: body.hub_address,
                    id,
                    pay_txid,
                };
                self.send_signed(
                    &body.hub_address,
                    Command::TransactionConfirmedA,
                    reply.encode(),
                    &keypair,
                )
                .await;
                Dispatch::Ok
            }
            CounterpartyRedeem::WaitingBroadcast => {
                debug!(order = %id.short(), "trying to redeem again");
                Dispatch::RetryLater(RetryReason::DepositNotVisible)
            }
            CounterpartyRedeem::WaitingSecret | CounterpartyRedeem::Unavailable => {
                Dispatch::RetryLater(RetryReason::WalletUnavailable)
            }
        }
    }

    /// `TransactionConfirmB`: learn the secret from the Maker's redeem and
    /// claim the Maker's deposit on chain A.
    pub(crate) async fn trader_process_confirm_b(
        &mut self,
        body: ConfirmBBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;

        let keypair = {
            let Some(order) = self.book.get_mut(&id) else {
                debug!(order = %id.short(), "confirm B for unknown order");
                return Dispatch::Ok;
            };
            if !order.is_local() {
                error!(order = %id.short(), "confirm B for a non-local order");
                return Dispatch::Ok;
            }
            let Some(pin) = order.hub_pubkey else {
                return Dispatch::Ok;
            };
            if !packet.verify_with(&pin) {
                warn!(order = %id.short(), "wrong service node on confirm B, ignoring");
                return Dispatch::Ok;
            }
            if order.state >= TradeState::Committed {
                warn!(order = %id.short(), state = %order.state, "confirm B in wrong state");
                return Dispatch::Ok;
            }
            if order.role != Role::Taker {
                error!(order = %id.short(), "confirm B sent to the wrong role");
                return Dispatch::Ok;
            }
            let Some(keypair) = order.keypair.clone() else {
                return Dispatch::Ok;
            };

            // Trust the counterparty's redeem hint only so many times, then
            // fall back to scanning our deposit outpoint for any spend.
            if order.other_pay_tx_tries < self.config.max_other_pay_tx_tries
                && !order.done_watching
            {
                order.other_pay_txid = Some(body.a_pay_txid.clone());
                order.other_pay_tx_tries += 1;
            }
            keypair
        };

        match self.redeem_counterparty_deposit(id).await {
            CounterpartyRedeem::Redeemed { pay_txid } => {
                if let Some(order) = self.book.get_mut(&id) {
                    order.advance(TradeState::Committed);
                }
                self.notifier.order_changed(&id);
                let reply = ConfirmedBBody {
                    hub_address: body.hub_address,
                    id,
                    pay_txid,
                };
                self.send_signed(
                    &body.hub_address,
                    Command::TransactionConfirmedB,
                    reply.encode(),
                    &keypair,
                )
                .await;
                Dispatch::Ok
            }
            CounterpartyRedeem::WaitingSecret => {
                debug!(order = %id.short(), "counterparty redeem not mined yet");
                Dispatch::RetryLater(RetryReason::RedeemNotVisible)
            }
            CounterpartyRedeem::WaitingBroadcast => {
                debug!(order = %id.short(), "redeem broadcast pending, retrying");
                Dispatch::RetryLater(RetryReason::RedeemNotVisible)
            }
            CounterpartyRedeem::Unavailable => {
                Dispatch::RetryLater(RetryReason::WalletUnavailable)
            }
        }
    }

    /// `TransactionFinished`: the hub announced completion.
    pub(crate) async fn trader_process_finished(
        &mut self,
        body: FinishedBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;
        let Some(order) = self.book.get(&id) else {
            debug!(order = %id.short(), "finished for unknown order");
            return Dispatch::Ok;
        };
        if let Some(pin) = order.hub_pubkey {
            if !packet.verify_with(&pin) {
                warn!(order = %id.short(), "wrong service node on finished, ignoring");
                return Dispatch::Ok;
            }
        }

        let (currency, coins) = (order.from_currency, order.used_coins.clone());
        if let Some(order) = self.book.get_mut(&id) {
            order.advance(TradeState::Finished);
        }
        // Spent by the swap; the pins are no longer needed.
        self.utxo_locks.unlock_coins(currency, &coins);
        self.retries.remove(&id);
        info!(order = %id.short(), "order moved to history");
        self.book.archive(&id);
        self.notifier.order_changed(&id);
        Dispatch::Ok
    }

    /// `TransactionCancel` from the counterparty, the hub, or ourselves.
    pub(crate) async fn trader_process_cancel(
        &mut self,
        body: CancelBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;
        let Some(order) = self.book.get(&id) else {
            return Dispatch::Ok;
        };

        // Only the Maker, Taker or pinned service node may cancel.
        let allowed = order
            .hub_pubkey
            .map(|pin| packet.verify_with(&pin))
            .unwrap_or(false)
            || order
                .counterparty_pubkey
                .map(|pk| packet.verify_with(&pk))
                .unwrap_or(false)
            || order
                .public_key()
                .map(|pk| packet.verify_with(&pk))
                .unwrap_or(false);
        if !allowed {
            debug!(order = %id.short(), "bad cancel signature, not cancelling");
            return Dispatch::Ok;
        }

        self.apply_cancel(id, body.reason).await
    }

    /// Cancel an order on the user's behalf: apply locally first, then
    /// broadcast so the counterparty and hub converge.
    pub async fn user_cancel(
        &mut self,
        id: OrderId,
        reason: TxCancelReason,
    ) -> Result<(), crate::domain::SessionError> {
        self.trader_send_cancel(id, reason).await;
        Ok(())
    }

    /// Apply the cancel branch table (see the rollback rules) and then
    /// broadcast the cancel packet under the order key.
    pub(crate) async fn trader_send_cancel(&mut self, id: OrderId, reason: TxCancelReason) {
        let Some(keypair) = self
            .book
            .get(&id)
            .and_then(|order| order.keypair.clone())
        else {
            return;
        };
        info!(order = %id.short(), %reason, "cancelling order");
        self.apply_cancel(id, reason).await;
        let body = CancelBody { id, reason };
        self.broadcast_signed(Command::TransactionCancel, body.encode(), &keypair)
            .await;
    }

    /// The cancel/rollback branch table. Idempotent: cancelling a settled
    /// or already-cancelled order changes nothing.
    pub(crate) async fn apply_cancel(&mut self, id: OrderId, reason: TxCancelReason) -> Dispatch {
        let Some(order) = self.book.get(&id) else {
            return Dispatch::Ok;
        };
        let state = order.state;
        let sent_deposit = order.sent_deposit;
        let redeemed = order.redeemed_counterparty_deposit;
        let has_refund = order.ref_tx.is_some();
        let currency = order.from_currency;
        let coins = order.used_coins.clone();
        let fee_utxos = order.fee_utxos.clone();

        if state == TradeState::Cancelled {
            return Dispatch::Ok;
        }
        if redeemed {
            // The trade has effectively settled; nothing to unwind.
            return Dispatch::Ok;
        }

        let release = |session: &mut Session| {
            session.retries.remove(&id);
            session.utxo_locks.unlock_coins(currency, &coins);
            if state < TradeState::Initialized {
                session
                    .utxo_locks
                    .unlock_fees(session.config.fee_currency, &fee_utxos);
            }
        };

        if state < TradeState::Created || !sent_deposit {
            release(self);
            if let Some(order) = self.book.get_mut(&id) {
                order.state = TradeState::Cancelled;
                order.reason = Some(reason);
                order.touch();
            }
            self.book.archive(&id);
            self.notifier.order_changed(&id);
            return Dispatch::Ok;
        }

        if !has_refund {
            // Deposit is on-chain and we hold no refund: the funds are not
            // reachable from here. Flag loudly and give up.
            error!(
                order = %id.short(),
                "no refund transaction on file for deposited order; manual recovery required"
            );
            release(self);
            if let Some(order) = self.book.get_mut(&id) {
                order.state = TradeState::Cancelled;
                order.reason = Some(reason);
                order.touch();
            }
            self.notifier.order_changed(&id);
            return Dispatch::Ok;
        }

        // Deposit on-chain, refund pre-signed: roll back through it.
        self.retries.remove(&id);
        if let Some(order) = self.book.get_mut(&id) {
            order.state = TradeState::Rollback;
            order.reason = Some(reason);
            order.touch();
        }
        self.notifier.order_changed(&id);

        match self.redeem_own_deposit(id).await {
            OwnRedeem::Done => Dispatch::Ok,
            OwnRedeem::NotYet | OwnRedeem::Failed => {
                Dispatch::RetryLater(RetryReason::LocktimeNotExpired)
            }
        }
    }

    /// Reclaim our deposit via the pre-signed refund once its locktime has
    /// expired. Driven by the watchdog while in rollback states.
    pub(crate) async fn redeem_own_deposit(&mut self, id: OrderId) -> OwnRedeem {
        let Some(order) = self.book.get(&id) else {
            return OwnRedeem::Done;
        };
        if order.state < TradeState::Created && !order.sent_deposit {
            return OwnRedeem::Done;
        }
        let Some(ref_tx) = order.ref_tx.clone() else {
            if order.bin_tx.is_some() {
                error!(
                    order = %id.short(),
                    "unable to roll back: no refund transaction on file"
                );
            }
            return OwnRedeem::Done;
        };
        let currency = order.from_currency;
        let lock_time = order.lock_time;
        let coins = order.used_coins.clone();
        let deposit = order.bin_txid.clone().unwrap_or_default();

        let Some(bridge) = self.bridge(currency) else {
            warn!(order = %id.short(), "rollback attempt failed, wallet not running");
            return OwnRedeem::Failed;
        };
        let info = match bridge.get_info().await {
            Ok(info) => info,
            Err(_) => return OwnRedeem::Failed,
        };
        if info.blocks < lock_time {
            debug!(
                order = %id.short(),
                at_block = lock_time,
                deposit = %deposit,
                "will redeem cancelled order when locktime expires"
            );
            return OwnRedeem::NotYet;
        }

        match bridge.send_raw_transaction(&ref_tx).await {
            Ok(txid) => {
                info!(order = %id.short(), refund = %txid, "deposit refunded");
            }
            Err(err) if err.is_already_in_chain() => {
                info!(order = %id.short(), "refund already in chain, proceeding");
            }
            Err(err) => {
                warn!(order = %id.short(), %err, "failed to roll back locked deposit, trying again later");
                if let Some(order) = self.book.get_mut(&id) {
                    order.state = TradeState::RollbackFailed;
                    order.touch();
                }
                self.notifier.order_changed(&id);
                return OwnRedeem::Failed;
            }
        }

        self.utxo_locks.unlock_coins(currency, &coins);
        if let Some(order) = self.book.get_mut(&id) {
            order.state = TradeState::Cancelled;
            order.touch();
        }
        self.book.archive(&id);
        self.notifier.order_changed(&id);
        OwnRedeem::Done
    }

    /// Redeem the counterparty's deposit. For the Maker this reveals the
    /// secret; for the Taker it first extracts the secret from the Maker's
    /// redeem of our own deposit.
    pub(crate) async fn redeem_counterparty_deposit(&mut self, id: OrderId) -> CounterpartyRedeem {
        // Extract the secret first when we don't have it (Taker path).
        let needs_secret = self
            .book
            .get(&id)
            .map(|order| order.secret.is_none())
            .unwrap_or(true);
        if needs_secret {
            match self.extract_secret(id).await {
                Ok(true) => {}
                Ok(false) => return CounterpartyRedeem::WaitingSecret,
                Err(_) => return CounterpartyRedeem::Unavailable,
            }
        }

        let Some(order) = self.book.get(&id) else {
            return CounterpartyRedeem::WaitingSecret;
        };
        let (Some(keypair), Some(secret)) = (order.keypair.clone(), order.secret.clone()) else {
            return CounterpartyRedeem::WaitingSecret;
        };
        let Some(o_bin_txid) = order.o_bin_txid.clone() else {
            return CounterpartyRedeem::WaitingSecret;
        };
        let to_currency = order.to_currency;
        let to_amount = order.to_amount;
        let o_vout = order.o_bin_tx_vout;
        let overpayment = order.o_overpayment;
        let unlock_script = order.unlock_script.clone();
        let to_addr = order.to;
        let from_currency = order.from_currency;
        let from_amount = order.from_amount;

        let Some(to_bridge) = self.bridge(to_currency) else {
            return CounterpartyRedeem::Unavailable;
        };

        let inputs = vec![TxInput {
            txid: o_bin_txid,
            vout: o_vout,
            amount: to_amount,
        }];
        let payout = to_amount.checked_add(overpayment).unwrap_or(to_amount);
        let outputs = vec![TxOutput {
            address: to_bridge.coin_address(&to_addr),
            amount: payout,
        }];

        let payment = match to_bridge
            .create_payment_transaction(&inputs, &outputs, &keypair, &secret, &unlock_script)
            .await
        {
            Ok(payment) => payment,
            Err(err) => {
                warn!(order = %id.short(), %err, "failed to create redeem transaction, retrying");
                return CounterpartyRedeem::WaitingBroadcast;
            }
        };
        self.txlog_append(
            "redeem counterparty deposit",
            &id,
            &format!("{from_currency}({from_amount}) / {to_currency}({to_amount})"),
            &payment.raw_tx,
        );

        match to_bridge.send_raw_transaction(&payment.raw_tx).await {
            Ok(_) => {}
            Err(err) if err.is_already_in_chain() => {
                debug!(order = %id.short(), "redeem already found in chain, proceeding");
            }
            Err(err) if err.is_missing_inputs() => {
                debug!(order = %id.short(), "redeem inputs missing, waiting for deposit");
                return CounterpartyRedeem::WaitingBroadcast;
            }
            Err(err) => {
                warn!(order = %id.short(), %err, "failed to redeem counterparty deposit");
                return CounterpartyRedeem::WaitingBroadcast;
            }
        }

        info!(
            order = %id.short(),
            pay = %payment.txid,
            chain = %to_currency,
            "redeeming counterparty deposit"
        );
        if let Some(order) = self.book.get_mut(&id) {
            order.pay_txid = Some(payment.txid.clone());
            order.pay_tx = Some(payment.raw_tx.clone());
            order.redeemed_counterparty_deposit = true;
            order.touch();
        }
        CounterpartyRedeem::Redeemed {
            pay_txid: payment.txid,
        }
    }

    /// Try to learn the secret from the counterparty's spend of our
    /// deposit. `Ok(true)` when the secret is now on the order.
    async fn extract_secret(&mut self, id: OrderId) -> Result<bool, BridgeError> {
        let Some(order) = self.book.get(&id) else {
            return Ok(false);
        };
        let Some(hashed) = order.counterparty_hashed_secret else {
            return Ok(false);
        };
        let Some(bin_txid) = order.bin_txid.clone() else {
            return Ok(false);
        };
        let Some(hint) = order.other_pay_txid.clone() else {
            return Ok(false);
        };
        let vout = order.bin_tx_vout;
        let from_currency = order.from_currency;

        let Some(from_bridge) = self.bridge(from_currency) else {
            return Err(BridgeError::Unavailable("no connector".to_string()));
        };
        match from_bridge
            .get_secret_from_payment_transaction(&hint, &bin_txid, vout, &hashed)
            .await?
        {
            SecretProbe::Found(secret) => {
                if let Some(order) = self.book.get_mut(&id) {
                    order.secret = Some(secret);
                    order.done_watching = true;
                    order.touch();
                }
                info!(order = %id.short(), "secret extracted from counterparty redeem");
                Ok(true)
            }
            SecretProbe::Mismatch => {
                error!(
                    order = %id.short(),
                    pay = %hint,
                    "secret not found in counterparty redeem; counterparty could be misbehaving"
                );
                Ok(false)
            }
            SecretProbe::NotFound => Ok(false),
        }
    }

    /// Build the deposit + pre-signed refund pair, journal both, and
    /// broadcast the deposit. Common to both roles.
    #[allow(clippy::too_many_arguments)]
    async fn build_and_send_deposit(
        &mut self,
        id: OrderId,
        bridge: &Arc<dyn ChainBridge>,
        keypair: &KeyPair,
        inputs: &[UtxoEntry],
        in_amount: Amount,
        out_amount: Amount,
        fee1: Amount,
        fee2: Amount,
        lock_script: &[u8],
        lock_p2sh: &str,
        lock_time: u32,
        refund_address: Option<String>,
    ) -> Result<BuiltDeposit, TxCancelReason> {
        debug!(
            order = %id.short(),
            %fee1,
            %fee2,
            available = %in_amount,
            required = %out_amount,
            "building deposit"
        );

        let mut tx_inputs = Vec::with_capacity(inputs.len());
        let mut largest = &inputs[0];
        for utxo in inputs {
            if utxo.amount > largest.amount {
                largest = utxo;
            }
            tx_inputs.push(TxInput {
                txid: utxo.txid.clone(),
                vout: utxo.vout,
                amount: utxo.amount,
            });
        }

        let deposit_value = out_amount
            .checked_add(fee2)
            .ok_or(TxCancelReason::NoMoney)?;
        let mut outputs = vec![TxOutput {
            address: lock_p2sh.to_string(),
            amount: deposit_value,
        }];
        let spent = deposit_value
            .checked_add(fee1)
            .ok_or(TxCancelReason::NoMoney)?;
        let change = in_amount.saturating_sub(spent);
        if !change.is_zero() && !bridge.is_dust(change) {
            // Change goes back to the largest input used in the order.
            outputs.push(TxOutput {
                address: bridge.coin_address(&largest.raw_address),
                amount: change,
            });
        }

        let detail = format!(
            "{}({}) using locktime {}",
            bridge.currency(),
            out_amount,
            lock_time
        );

        let deposit = match bridge.create_deposit_transaction(&tx_inputs, &outputs).await {
            Ok(deposit) => deposit,
            Err(err) => {
                warn!(order = %id.short(), %err, "failed to create deposit transaction, cancelling");
                return Err(TxCancelReason::RpcError);
            }
        };
        self.txlog_append("deposit transaction", &id, &detail, &deposit.raw_tx);

        let refund_address = match refund_address {
            Some(addr) => addr,
            None => match bridge.get_new_address().await {
                Ok(addr) => addr,
                Err(err) => {
                    warn!(order = %id.short(), %err, "failed to get refund address, cancelling");
                    return Err(TxCancelReason::RpcError);
                }
            },
        };

        let refund_inputs = vec![TxInput {
            txid: deposit.txid.clone(),
            vout: deposit.vout,
            amount: deposit_value,
        }];
        let refund_outputs = vec![TxOutput {
            address: refund_address.clone(),
            amount: out_amount,
        }];
        let refund = match bridge
            .create_refund_transaction(
                &refund_inputs,
                &refund_outputs,
                keypair,
                lock_script,
                lock_time,
            )
            .await
        {
            Ok(refund) => refund,
            Err(err) => {
                warn!(order = %id.short(), %err, "failed to create refund transaction, cancelling");
                return Err(TxCancelReason::RpcError);
            }
        };
        self.txlog_append("refund transaction", &id, &detail, &refund.raw_tx);

        if let Err(err) = bridge.send_raw_transaction(&deposit.raw_tx).await {
            if !err.is_already_in_chain() {
                warn!(order = %id.short(), %err, "error sending deposit, cancelling order");
                return Err(TxCancelReason::RpcError);
            }
        }

        Ok(BuiltDeposit {
            bin_txid: deposit.txid,
            bin_vout: deposit.vout,
            bin_tx: deposit.raw_tx,
            ref_txid: refund.txid,
            ref_tx: refund.raw_tx,
            refund_address,
        })
    }
}

/// Result of [`Session::build_and_send_deposit`].
pub(crate) struct BuiltDeposit {
    pub bin_txid: String,
    pub bin_vout: u32,
    pub bin_tx: String,
    pub ref_txid: String,
    pub ref_tx: String,
    pub refund_address: String,
}
