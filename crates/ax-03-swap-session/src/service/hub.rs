//! # Hub Handlers
//!
//! The service-node half of the protocol. The hub validates orders, pairs
//! the first valid taker with the maker, and relays each phase onward only
//! once both sides have answered the current one. It signs routing packets
//! with its own key but never holds keys to funds.

use crate::domain::exchange::{ExchangeOrder, SideState};
use crate::domain::invariants::{derive_order_id, OrderIdFields};
use crate::service::session::{
    DepositWatch, Dispatch, FatalReason, Session,
};
use ax_01_wire_protocol::{
    AcceptingBody, CancelBody, Command, ConfirmABody, ConfirmBBody, ConfirmedABody,
    ConfirmedBBody, CreateABody, CreateBBody, CreatedABody, CreatedBBody, FinishedBody,
    HoldApplyBody, HoldBody, InitBody, InitializedBody, Packet, PendingTransactionBody,
    TransactionBody,
};
use ax_02_chain_bridge::ChainBridge;
use shared_types::{Amount, OrderId, Role, TxCancelReason, UtxoEntry};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Session {
    /// Validate a set of committed UTXOs against the chain: the output must
    /// exist unspent and the wallet signature must prove address control.
    /// Invalid entries are skipped, mirroring a lenient orderbook policy;
    /// the amount checks below decide whether what's left is enough.
    async fn validate_utxos(
        &self,
        bridge: &Arc<dyn ChainBridge>,
        utxos: &[UtxoEntry],
    ) -> (Vec<UtxoEntry>, Amount) {
        let mut valid = Vec::with_capacity(utxos.len());
        let mut total = Amount::ZERO;
        for utxo in utxos {
            let info = match bridge.get_tx_out(utxo).await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    debug!(txid = %utxo.txid, vout = utxo.vout, "utxo not found, skipping");
                    continue;
                }
                Err(err) => {
                    debug!(%err, txid = %utxo.txid, "utxo query failed, skipping");
                    continue;
                }
            };
            match bridge.verify_utxo_signature(utxo).await {
                Ok(true) => {}
                _ => {
                    debug!(txid = %utxo.txid, vout = utxo.vout, "bad utxo signature, skipping");
                    continue;
                }
            }
            let mut utxo = utxo.clone();
            utxo.amount = info.amount;
            total = total.checked_add(info.amount).unwrap_or(total);
            valid.push(utxo);
        }
        (valid, total)
    }

    /// `Transaction`: a maker advertising a new order.
    pub(crate) async fn hub_process_transaction(
        &mut self,
        body: TransactionBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;

        // A repeated advert for a live order refreshes it instead.
        if self.registry.pending(&id).is_some() {
            return self.hub_refresh_pending(id).await;
        }
        if self.registry.is_accepted(&id) {
            debug!(order = %id.short(), "advert for accepted order, ignoring");
            return Dispatch::Ok;
        }

        let Ok(maker_pubkey) = packet.sender_pubkey() else {
            warn!(order = %id.short(), "advert carries an invalid public key");
            return Dispatch::Ok;
        };
        if !packet.verify() {
            warn!(order = %id.short(), "invalid advert signature");
            return Dispatch::Ok;
        }

        let (Some(src_bridge), Some(dst_bridge)) =
            (self.bridge(body.src_currency), self.bridge(body.dst_currency))
        else {
            warn!(order = %id.short(), "no connector for advertised currency pair");
            return Dispatch::Ok;
        };

        let (utxos, total) = self.validate_utxos(&src_bridge, &body.utxos).await;
        if utxos.is_empty() {
            debug!(order = %id.short(), "order rejected, no valid utxos");
            return Dispatch::Ok;
        }
        if total < body.src_amount {
            debug!(
                order = %id.short(),
                total = %total,
                required = %body.src_amount,
                "order rejected, utxo total below amount"
            );
            return Dispatch::Ok;
        }
        let change = total.saturating_sub(body.src_amount);
        if src_bridge.is_dust(body.src_amount)
            || dst_bridge.is_dust(body.dst_amount)
            || (!change.is_zero() && src_bridge.is_dust(change))
        {
            debug!(order = %id.short(), "order rejected, dust amount");
            return Dispatch::Ok;
        }

        // The id must be the hash of the canonical fields.
        let src_addr = src_bridge.coin_address(&body.src_addr);
        let dst_addr = dst_bridge.coin_address(&body.dst_addr);
        let check_id = derive_order_id(&OrderIdFields {
            src_addr: &src_addr,
            src_currency: body.src_currency,
            src_amount: body.src_amount,
            dst_addr: &dst_addr,
            dst_currency: body.dst_currency,
            dst_amount: body.dst_amount,
            timestamp: body.timestamp,
            anchor: &body.anchor,
            first_utxo_signature: &utxos[0].signature,
        });
        if check_id != id {
            warn!(
                order = %id.short(),
                derived = %check_id.short(),
                "order id differs from body hash, dropping"
            );
            return Dispatch::Ok;
        }

        if let Err((txid, vout)) = self.utxo_locks.lock_coins(body.src_currency, &utxos) {
            debug!(order = %id.short(), %txid, vout, "utxo already committed elsewhere");
            return Dispatch::Ok;
        }

        info!(
            order = %id.short(),
            from = %body.src_currency,
            from_amount = %body.src_amount,
            to = %body.dst_currency,
            to_amount = %body.dst_amount,
            "received order"
        );

        let side_a = SideState::new(
            body.src_addr,
            body.dst_addr,
            body.src_currency,
            body.src_amount,
            maker_pubkey,
            utxos,
        );
        let order = ExchangeOrder::new(
            id,
            side_a,
            body.dst_currency,
            body.dst_amount,
            body.anchor,
            body.timestamp,
        );
        if !self.registry.insert_pending(order) {
            return Dispatch::Ok;
        }
        self.notifier.order_received(&id);

        self.hub_broadcast_pending(id).await;
        Dispatch::Ok
    }

    /// Re-validate and re-broadcast a known pending advert.
    async fn hub_refresh_pending(&mut self, id: OrderId) -> Dispatch {
        let Some((currency, utxos)) = self
            .registry
            .pending(&id)
            .map(|order| (order.a.currency, order.a.utxos.clone()))
        else {
            return Dispatch::Ok;
        };
        let Some(bridge) = self.bridge(currency) else {
            return Dispatch::Ok;
        };
        for utxo in &utxos {
            match bridge.get_tx_out(utxo).await {
                Ok(Some(_)) => {}
                _ => {
                    warn!(order = %id.short(), txid = %utxo.txid, "maker utxo gone, cancelling");
                    self.hub_cancel_order(id, TxCancelReason::BadUtxo).await;
                    return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BadUtxo));
                }
            }
        }
        if let Some(order) = self.registry.pending_mut(&id) {
            order.touch();
        }
        debug!(order = %id.short(), "order already received, refreshing and relaying");
        self.hub_broadcast_pending(id).await;
        Dispatch::Ok
    }

    /// Broadcast a pending advert under the hub signature.
    pub(crate) async fn hub_broadcast_pending(&self, id: OrderId) {
        let Some(keypair) = self.hub_keypair.clone() else {
            return;
        };
        let Some(order) = self.registry.pending(&id) else {
            return;
        };
        let body = PendingTransactionBody {
            id,
            src_currency: order.a.currency,
            src_amount: order.a.amount,
            dst_currency: order.dst_currency,
            dst_amount: order.dst_amount,
            hub_address: self.session_id.as_address(),
            timestamp: order.timestamp,
            anchor: order.block_hash,
        };
        self.broadcast_signed(Command::PendingTransaction, body.encode(), &keypair)
            .await;
    }

    /// `TransactionAccepting`: a taker asking to join an order.
    pub(crate) async fn hub_process_accepting(
        &mut self,
        body: AcceptingBody,
        packet: &Packet,
    ) -> Dispatch {
        if !self.is_for_me(&body.hub_address) {
            return Dispatch::Ok;
        }
        let id = body.id;

        // The first valid taker wins; everyone else is dropped here.
        if self.registry.is_accepted(&id) {
            warn!(order = %id.short(), "order already accepted, dropping acceptance");
            return Dispatch::Ok;
        }

        let Ok(taker_pubkey) = packet.sender_pubkey() else {
            warn!(order = %id.short(), "acceptance carries an invalid public key");
            return Dispatch::Ok;
        };
        if !packet.verify() {
            warn!(order = %id.short(), "invalid acceptance signature");
            return Dispatch::Ok;
        }

        let Some(pending) = self.registry.pending(&id) else {
            warn!(order = %id.short(), "acceptance for unknown order");
            return Dispatch::Ok;
        };
        let maker_currency = pending.a.currency;
        let maker_utxos = pending.a.utxos.clone();
        let expected_currency = pending.dst_currency;
        let expected_amount = pending.dst_amount;

        if body.src_currency != expected_currency || body.src_amount != expected_amount {
            warn!(order = %id.short(), "acceptance terms do not match the advert");
            return Dispatch::Ok;
        }

        // The maker's committed funds must still be unspent.
        let Some(maker_bridge) = self.bridge(maker_currency) else {
            warn!(order = %id.short(), "no maker connector");
            return Dispatch::Ok;
        };
        for utxo in &maker_utxos {
            match maker_bridge.get_tx_out(utxo).await {
                Ok(Some(_)) => {}
                _ => {
                    warn!(order = %id.short(), txid = %utxo.txid, "bad maker utxo, cancelling order");
                    self.hub_cancel_order(id, TxCancelReason::BadUtxo).await;
                    return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::BadUtxo));
                }
            }
        }

        let Some(taker_bridge) = self.bridge(body.src_currency) else {
            warn!(order = %id.short(), "no taker connector");
            return Dispatch::Ok;
        };
        let (utxos, total) = self.validate_utxos(&taker_bridge, &body.utxos).await;
        if utxos.is_empty() || total < body.src_amount {
            debug!(order = %id.short(), "acceptance rejected, utxos insufficient");
            return Dispatch::Ok;
        }
        let change = total.saturating_sub(body.src_amount);
        if taker_bridge.is_dust(body.src_amount) || (!change.is_zero() && taker_bridge.is_dust(change))
        {
            debug!(order = %id.short(), "acceptance rejected, dust amount");
            return Dispatch::Ok;
        }

        if let Err((txid, vout)) = self.utxo_locks.lock_coins(body.src_currency, &utxos) {
            debug!(order = %id.short(), %txid, vout, "taker utxo already committed elsewhere");
            return Dispatch::Ok;
        }

        let side_b = SideState::new(
            body.src_addr,
            body.dst_addr,
            body.src_currency,
            body.src_amount,
            taker_pubkey,
            utxos,
        );
        let unlock_on_failure = side_b.utxos.clone();
        let joined = match self.registry.promote(&id) {
            Some(order) => order.join(side_b),
            None => false,
        };
        if !joined {
            // Lost the race to another acceptance.
            self.utxo_locks
                .unlock_coins(body.src_currency, &unlock_on_failure);
            warn!(order = %id.short(), "order already accepted, dropping acceptance");
            return Dispatch::Ok;
        }

        info!(order = %id.short(), "taker joined, holding order");

        let keypair = match self.hub_keypair.clone() {
            Some(kp) => kp,
            None => return Dispatch::Ok,
        };
        let hold = HoldBody {
            hub_address: self.session_id.as_address(),
            id,
        };
        self.broadcast_signed(Command::TransactionHold, hold.encode(), &keypair)
            .await;
        Dispatch::Ok
    }

    /// `TransactionHoldApply`: a trader acknowledged the hold.
    pub(crate) async fn hub_process_hold_apply(
        &mut self,
        body: HoldApplyBody,
        packet: &Packet,
    ) -> Dispatch {
        if !self.is_for_me(&body.hub_address) {
            return Dispatch::Ok;
        }
        let id = body.id;
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };

        if !Self::verify_either_trader(packet, order) {
            warn!(order = %id.short(), "bad trader signature on hold apply");
            return Dispatch::Ok;
        }
        if order.state != crate::domain::HubState::Joined {
            warn!(order = %id.short(), state = %order.state, "hold apply in wrong state");
            return Dispatch::Ok;
        }
        let Some(role) = order.side_of(&body.from) else {
            warn!(order = %id.short(), "hold apply from an address outside the order");
            self.hub_cancel_order(id, TxCancelReason::InvalidAddress).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::InvalidAddress));
        };

        let advanced = self
            .registry
            .active_mut(&id)
            .map(|order| order.apply_hold_ack(role))
            .unwrap_or(false);
        if !advanced {
            return Dispatch::Ok;
        }

        // Both sides held: hand each trader its swap parameters.
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };
        let Some(b) = order.b.clone() else {
            return Dispatch::Ok;
        };
        let a = order.a.clone();
        let keypair = match self.hub_keypair.clone() {
            Some(kp) => kp,
            None => return Dispatch::Ok,
        };
        let hub_address = self.session_id.as_address();

        let maker_init = InitBody {
            dest: a.destination,
            hub_address,
            id,
            from: a.address,
            from_currency: a.currency,
            from_amount: a.amount,
            to: a.destination,
            to_currency: b.currency,
            to_amount: b.amount,
        };
        self.send_signed(&a.destination, Command::TransactionInit, maker_init.encode(), &keypair)
            .await;

        let taker_init = InitBody {
            dest: b.destination,
            hub_address,
            id,
            from: b.address,
            from_currency: b.currency,
            from_amount: b.amount,
            to: b.destination,
            to_currency: a.currency,
            to_amount: a.amount,
        };
        self.send_signed(&b.destination, Command::TransactionInit, taker_init.encode(), &keypair)
            .await;

        Dispatch::Ok
    }

    /// `TransactionInitialized`: a trader confirmed init (taker fee paid).
    pub(crate) async fn hub_process_initialized(
        &mut self,
        body: InitializedBody,
        packet: &Packet,
    ) -> Dispatch {
        if !self.is_for_me(&body.hub_address) {
            return Dispatch::Ok;
        }
        let id = body.id;
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };
        if !Self::verify_either_trader(packet, order) {
            warn!(order = %id.short(), "bad trader signature on initialized");
            return Dispatch::Ok;
        }
        if order.state != crate::domain::HubState::Hold {
            warn!(order = %id.short(), state = %order.state, "initialized in wrong state");
            return Dispatch::Ok;
        }
        let Some(role) = order.side_of(&body.from) else {
            warn!(order = %id.short(), "initialized from an address outside the order");
            self.hub_cancel_order(id, TxCancelReason::InvalidAddress).await;
            return Dispatch::Fatal(FatalReason::OrderCancelled(TxCancelReason::InvalidAddress));
        };

        let advanced = self
            .registry
            .active_mut(&id)
            .map(|order| order.apply_initialized(role))
            .unwrap_or(false);
        if !advanced {
            return Dispatch::Ok;
        }

        // Both initialized: the maker goes first.
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };
        let Some(b) = order.b.as_ref() else {
            return Dispatch::Ok;
        };
        let create = CreateABody {
            hub_address: self.session_id.as_address(),
            id,
            counterparty_pubkey: b.pubkey,
        };
        let maker_addr = order.a.address;
        let keypair = match self.hub_keypair.clone() {
            Some(kp) => kp,
            None => return Dispatch::Ok,
        };
        self.send_signed(&maker_addr, Command::TransactionCreateA, create.encode(), &keypair)
            .await;
        Dispatch::Ok
    }

    /// `TransactionCreatedA`: the maker reported its deposit.
    pub(crate) async fn hub_process_created_a(
        &mut self,
        body: CreatedABody,
        packet: &Packet,
    ) -> Dispatch {
        if !self.is_for_me(&body.hub_address) {
            return Dispatch::Ok;
        }
        let id = body.id;
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };
        if !packet.verify_with(&order.a.pubkey) {
            warn!(order = %id.short(), "bad maker signature on created A");
            return Dispatch::Ok;
        }
        if order.state != crate::domain::HubState::Initialized {
            warn!(order = %id.short(), state = %order.state, "created A in wrong state");
            return Dispatch::Ok;
        }

        let (maker_currency, taker_addr, maker_pubkey) = {
            let Some(order) = self.registry.active_mut(&id) else {
                return Dispatch::Ok;
            };
            order.a.lock_time = body.locktime_a;
            order.a.ref_txid = Some(body.ref_txid.clone());
            order.a.ref_tx = Some(body.ref_tx.clone());
            order.apply_created(Role::Maker, body.bin_txid.clone());
            let Some(b) = order.b.as_ref() else {
                return Dispatch::Ok;
            };
            (order.a.currency, b.address, order.a.pubkey)
        };

        // Keep the maker's refund on file in case the order stalls.
        self.deposit_watches.push(DepositWatch {
            order_id: id,
            currency: maker_currency,
            lock_time: body.locktime_a,
            ref_tx: body.ref_tx.clone(),
        });

        let create = CreateBBody {
            hub_address: self.session_id.as_address(),
            id,
            counterparty_pubkey: maker_pubkey,
            a_bin_txid: body.bin_txid.clone(),
            hashed_secret: body.hashed_secret,
            locktime_a: body.locktime_a,
        };
        let keypair = match self.hub_keypair.clone() {
            Some(kp) => kp,
            None => return Dispatch::Ok,
        };
        info!(order = %id.short(), deposit = %body.bin_txid, "maker deposit recorded");
        self.send_signed(&taker_addr, Command::TransactionCreateB, create.encode(), &keypair)
            .await;
        Dispatch::Ok
    }

    /// `TransactionCreatedB`: the taker reported its deposit.
    pub(crate) async fn hub_process_created_b(
        &mut self,
        body: CreatedBBody,
        packet: &Packet,
    ) -> Dispatch {
        if !self.is_for_me(&body.hub_address) {
            return Dispatch::Ok;
        }
        let id = body.id;
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };
        let Some(b) = order.b.as_ref() else {
            return Dispatch::Ok;
        };
        if !packet.verify_with(&b.pubkey) {
            warn!(order = %id.short(), "bad taker signature on created B");
            return Dispatch::Ok;
        }
        if order.state != crate::domain::HubState::Initialized {
            warn!(order = %id.short(), state = %order.state, "created B in wrong state");
            return Dispatch::Ok;
        }

        let (advanced, maker_dest, taker_currency) = {
            let Some(order) = self.registry.active_mut(&id) else {
                return Dispatch::Ok;
            };
            if let Some(b) = order.b.as_mut() {
                b.lock_time = body.locktime_b;
                b.ref_txid = Some(body.ref_txid.clone());
                b.ref_tx = Some(body.ref_tx.clone());
            }
            let advanced = order.apply_created(Role::Taker, body.bin_txid.clone());
            let taker_currency = order.b.as_ref().map(|b| b.currency);
            (advanced, order.a.destination, taker_currency)
        };

        if let Some(currency) = taker_currency {
            self.deposit_watches.push(DepositWatch {
                order_id: id,
                currency,
                lock_time: body.locktime_b,
                ref_tx: body.ref_tx.clone(),
            });
        }

        if !advanced {
            return Dispatch::Ok;
        }

        // Both deposits are in: tell the maker to redeem (reveals secret).
        let confirm = ConfirmABody {
            hub_address: self.session_id.as_address(),
            id,
            b_bin_txid: body.bin_txid.clone(),
            locktime_b: body.locktime_b,
        };
        let keypair = match self.hub_keypair.clone() {
            Some(kp) => kp,
            None => return Dispatch::Ok,
        };
        info!(order = %id.short(), deposit = %body.bin_txid, "taker deposit recorded");
        self.send_signed(&maker_dest, Command::TransactionConfirmA, confirm.encode(), &keypair)
            .await;
        Dispatch::Ok
    }

    /// `TransactionConfirmedA`: the maker redeemed the taker's deposit.
    pub(crate) async fn hub_process_confirmed_a(
        &mut self,
        body: ConfirmedABody,
        packet: &Packet,
    ) -> Dispatch {
        if !self.is_for_me(&body.hub_address) {
            return Dispatch::Ok;
        }
        let id = body.id;
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };
        if !packet.verify_with(&order.a.pubkey) {
            warn!(order = %id.short(), "bad maker signature on confirmed A");
            return Dispatch::Ok;
        }
        if order.state != crate::domain::HubState::Created {
            warn!(order = %id.short(), state = %order.state, "confirmed A in wrong state");
            return Dispatch::Ok;
        }

        let taker_dest = {
            let Some(order) = self.registry.active_mut(&id) else {
                return Dispatch::Ok;
            };
            order.apply_confirmed(Role::Maker, body.pay_txid.clone());
            match order.b.as_ref() {
                Some(b) => b.destination,
                // The maker has already spent the taker's deposit; nothing
                // can be cancelled from here.
                None => return Dispatch::Ok,
            }
        };

        let confirm = ConfirmBBody {
            hub_address: self.session_id.as_address(),
            id,
            a_pay_txid: body.pay_txid.clone(),
        };
        let keypair = match self.hub_keypair.clone() {
            Some(kp) => kp,
            None => return Dispatch::Ok,
        };
        info!(order = %id.short(), pay = %body.pay_txid, "maker redeem recorded");
        self.send_signed(&taker_dest, Command::TransactionConfirmB, confirm.encode(), &keypair)
            .await;
        Dispatch::Ok
    }

    /// `TransactionConfirmedB`: the taker redeemed the maker's deposit.
    pub(crate) async fn hub_process_confirmed_b(
        &mut self,
        body: ConfirmedBBody,
        packet: &Packet,
    ) -> Dispatch {
        if !self.is_for_me(&body.hub_address) {
            return Dispatch::Ok;
        }
        let id = body.id;
        let Some(order) = self.registry.active(&id) else {
            return Dispatch::Ok;
        };
        let Some(b) = order.b.as_ref() else {
            return Dispatch::Ok;
        };
        if !packet.verify_with(&b.pubkey) {
            warn!(order = %id.short(), "bad taker signature on confirmed B");
            return Dispatch::Ok;
        }
        if order.state != crate::domain::HubState::Created {
            warn!(order = %id.short(), state = %order.state, "confirmed B in wrong state");
            return Dispatch::Ok;
        }

        let finished = self
            .registry
            .active_mut(&id)
            .map(|order| order.apply_confirmed(Role::Taker, body.pay_txid.clone()))
            .unwrap_or(false);
        if !finished {
            return Dispatch::Ok;
        }

        // Swap settled on both chains.
        self.deposit_watches.retain(|w| w.order_id != id);
        self.release_order_locks(&id);
        let keypair = match self.hub_keypair.clone() {
            Some(kp) => kp,
            None => return Dispatch::Ok,
        };
        info!(order = %id.short(), "order finished");
        let finished_body = FinishedBody { id };
        self.broadcast_signed(Command::TransactionFinished, finished_body.encode(), &keypair)
            .await;
        self.registry.archive(&id);
        self.notifier.order_changed(&id);
        Dispatch::Ok
    }

    /// `TransactionCancel` seen by the hub: drop the record and re-announce
    /// the cancel under the hub signature so every participant converges.
    pub(crate) async fn hub_process_cancel(
        &mut self,
        body: CancelBody,
        packet: &Packet,
    ) -> Dispatch {
        let id = body.id;
        let known = self
            .registry
            .pending(&id)
            .or_else(|| self.registry.active(&id));
        let Some(order) = known else {
            return Dispatch::Ok;
        };
        if !Self::verify_either_trader(packet, order) {
            warn!(order = %id.short(), "invalid cancel signature");
            return Dispatch::Ok;
        }
        info!(order = %id.short(), reason = %body.reason, "cancelling order");
        self.hub_cancel_order(id, body.reason).await;
        Dispatch::Ok
    }

    /// Cancel an order hub-side: free its UTXO locks, archive the record
    /// and broadcast the cancel.
    pub(crate) async fn hub_cancel_order(&mut self, id: OrderId, reason: TxCancelReason) {
        self.release_order_locks(&id);
        self.registry.remove_pending(&id);
        if let Some(order) = self.registry.active_mut(&id) {
            order.state = crate::domain::HubState::Cancelled;
            order.touch();
        }
        self.registry.archive(&id);
        self.deposit_watches.retain(|w| w.order_id != id);
        self.notifier.order_changed(&id);

        let Some(keypair) = self.hub_keypair.clone() else {
            return;
        };
        let body = CancelBody { id, reason };
        self.broadcast_signed(Command::TransactionCancel, body.encode(), &keypair)
            .await;
    }

    /// Free both sides' UTXO locks for an order.
    pub(crate) fn release_order_locks(&self, id: &OrderId) {
        let order = self
            .registry
            .pending(id)
            .or_else(|| self.registry.active(id));
        if let Some(order) = order {
            self.utxo_locks
                .unlock_coins(order.a.currency, &order.a.utxos);
            if let Some(b) = &order.b {
                self.utxo_locks.unlock_coins(b.currency, &b.utxos);
            }
        }
    }

    fn verify_either_trader(packet: &Packet, order: &ExchangeOrder) -> bool {
        if packet.verify_with(&order.a.pubkey) {
            return true;
        }
        order
            .b
            .as_ref()
            .map(|b| packet.verify_with(&b.pubkey))
            .unwrap_or(false)
    }
}
