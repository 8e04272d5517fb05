//! End-to-end swap scenarios against the in-memory network and chains.

use crate::swap_net::{block, ltc, SwapNet, Wire};
use ax_01_wire_protocol::{
    Command, CreateBBody, HoldBody, InitBody, Message, Packet, PendingTransactionBody,
    TransactionBody,
};
use ax_02_chain_bridge::{ChainBridge, TxInput, TxOutput};
use ax_03_swap_session::{
    MakerOrderParams, NullNotifier, Session, SessionCommand, SessionConfig, TakerAcceptParams,
    TradeState, UtxoLockTable,
};
use shared_crypto::KeyPair;
use shared_types::{Amount, OrderId, TxCancelReason, XAddress};
use std::sync::Arc;
use std::time::Duration;

const MAKER_FROM: XAddress = [1u8; 20];
const MAKER_TO: XAddress = [2u8; 20];
const TAKER_FROM: XAddress = [3u8; 20];
const TAKER_TO: XAddress = [4u8; 20];

fn maker_addrs() -> Vec<XAddress> {
    vec![MAKER_FROM, MAKER_TO]
}

fn taker_addrs() -> Vec<XAddress> {
    vec![TAKER_FROM, TAKER_TO]
}

/// Fund the maker and publish the standard 10 BLOCK -> 1 LTC order.
async fn publish_order(net: &mut SwapNet) -> OrderId {
    let utxo = net.chains.block.fund(&MAKER_FROM, Amount::from_coins(11));
    let params = MakerOrderParams {
        from_currency: block(),
        from_amount: Amount::from_coins(10),
        to_currency: ltc(),
        to_amount: Amount::from_coins(1),
        from: MAKER_FROM,
        to: MAKER_TO,
        utxos: vec![utxo],
        anchor: [9u8; 32],
        refund_address: None,
    };
    let id = net
        .trader_mut(0)
        .submit_order(params)
        .await
        .expect("maker can publish");
    net.pump().await;
    id
}

/// Fund a taker and accept the order from trader `index`.
async fn accept_order(net: &mut SwapNet, index: usize, id: OrderId, from: XAddress, to: XAddress) {
    let utxo = net.chains.ltc.fund(&from, Amount::from_coins(2));
    let fee_utxo = net.chains.block.fund(&from, Amount::from_coins(1));
    let raw_fee_tx = net.chains.block.make_fee_tx(&from, Amount::from_units(100_000));
    let params = TakerAcceptParams {
        from,
        to,
        utxos: vec![utxo],
        fee_utxos: vec![fee_utxo],
        raw_fee_tx,
        refund_address: None,
    };
    net.trader_mut(index)
        .accept_order(id, params)
        .await
        .expect("taker can accept");
    net.pump().await;
}

fn archived_state(session: &Session, id: &OrderId) -> Option<TradeState> {
    session.book().archived(id).map(|order| order.state)
}

async fn deliver(session: &mut Session, packet: Packet) {
    session.handle_command(SessionCommand::Packet(packet)).await;
}

#[tokio::test]
async fn test_happy_path_full_swap() {
    let mut net = SwapNet::new(&[maker_addrs(), taker_addrs()]);
    let id = publish_order(&mut net).await;

    // The taker learned about the order from the hub broadcast.
    assert_eq!(
        net.trader(1).book().get(&id).map(|o| o.state),
        Some(TradeState::Pending)
    );

    accept_order(&mut net, 1, id, TAKER_FROM, TAKER_TO).await;

    // Both traders settled and the hub archived the pair as finished.
    assert_eq!(archived_state(net.trader(0), &id), Some(TradeState::Finished));
    assert_eq!(archived_state(net.trader(1), &id), Some(TradeState::Finished));
    let hub_order = net.hub.registry().archived(&id).expect("hub archived");
    assert_eq!(
        hub_order.state,
        ax_03_swap_session::HubState::Finished
    );

    // Both HTLCs locked the same hashed secret, and the taker extracted
    // the matching preimage.
    let maker = net.trader(0).book().archived(&id).unwrap();
    let taker = net.trader(1).book().archived(&id).unwrap();
    let hashed = maker.hashed_secret().expect("maker hash");
    assert_eq!(taker.counterparty_hashed_secret, Some(hashed));
    assert!(taker.secret.as_ref().expect("taker learned secret").matches(&hashed));

    // Maker redeemed on LTC, taker on BLOCK.
    assert!(net.chains.ltc.is_confirmed(maker.pay_txid.as_ref().unwrap()));
    assert!(net.chains.block.is_confirmed(taker.pay_txid.as_ref().unwrap()));

    // The locktime ordering held: maker outlives taker by the margin.
    assert!(maker.lock_time > taker.lock_time);
}

#[tokio::test]
async fn test_taker_stall_times_out_and_maker_rolls_back() {
    let mut net = SwapNet::new_with_hub_config(
        &[maker_addrs(), taker_addrs()],
        SessionConfig {
            order_stall_timeout: Duration::ZERO,
            ..Default::default()
        },
    );
    // The taker never receives its create instruction.
    net.drop_commands = vec![Command::TransactionCreateB];

    let id = publish_order(&mut net).await;
    accept_order(&mut net, 1, id, TAKER_FROM, TAKER_TO).await;

    // The maker deposited and is waiting; the taker never did.
    assert_eq!(
        net.trader(0).book().get(&id).map(|o| o.state),
        Some(TradeState::Created)
    );

    // The watchdog times the stalled order out.
    net.drop_commands.clear();
    net.tick_all().await;

    let maker_state = net.trader(0).book().get(&id).map(|o| o.state);
    assert_eq!(maker_state, Some(TradeState::Rollback));

    // Locktime expires; the refund goes through.
    net.chains.block.advance_blocks(250);
    net.tick_all().await;

    let maker = net.trader(0).book().archived(&id).expect("maker archived");
    assert_eq!(maker.state, TradeState::Cancelled);
    assert_eq!(maker.reason, Some(TxCancelReason::Timeout));
    assert!(net.chains.block.is_confirmed(maker.ref_txid.as_ref().unwrap()));
}

#[tokio::test]
async fn test_watcher_recovers_secret_without_confirm_b() {
    let mut net = SwapNet::new(&[maker_addrs(), taker_addrs()]);
    // The hub's redeem hint never reaches the taker.
    net.drop_commands = vec![Command::TransactionConfirmB];

    let id = publish_order(&mut net).await;
    accept_order(&mut net, 1, id, TAKER_FROM, TAKER_TO).await;

    // The maker has revealed the secret on chain B, but the taker is
    // still waiting at created.
    assert_eq!(
        net.trader(0).book().get(&id).map(|o| o.state),
        Some(TradeState::Committed)
    );
    assert_eq!(
        net.trader(1).book().get(&id).map(|o| o.state),
        Some(TradeState::Created)
    );

    // The watcher scans the deposit outpoint, extracts the secret from
    // the maker's spend, and redeems on chain A.
    net.drop_commands.clear();
    net.tick_all().await;
    net.tick_all().await;

    assert_eq!(archived_state(net.trader(0), &id), Some(TradeState::Finished));
    assert_eq!(archived_state(net.trader(1), &id), Some(TradeState::Finished));
    let taker = net.trader(1).book().archived(&id).unwrap();
    assert!(net.chains.block.is_confirmed(taker.pay_txid.as_ref().unwrap()));
}

#[tokio::test]
async fn test_double_accept_first_wins() {
    let taker2_from: XAddress = [5u8; 20];
    let taker2_to: XAddress = [6u8; 20];
    let mut net = SwapNet::new(&[
        maker_addrs(),
        taker_addrs(),
        vec![taker2_from, taker2_to],
    ]);

    let id = publish_order(&mut net).await;

    // Queue both acceptances before the hub sees either.
    let utxo1 = net.chains.ltc.fund(&TAKER_FROM, Amount::from_coins(2));
    let fee1 = net.chains.block.fund(&TAKER_FROM, Amount::from_coins(1));
    let raw1 = net.chains.block.make_fee_tx(&TAKER_FROM, Amount::from_units(100_000));
    net.trader_mut(1)
        .accept_order(
            id,
            TakerAcceptParams {
                from: TAKER_FROM,
                to: TAKER_TO,
                utxos: vec![utxo1],
                fee_utxos: vec![fee1],
                raw_fee_tx: raw1,
                refund_address: None,
            },
        )
        .await
        .unwrap();

    let utxo2 = net.chains.ltc.fund(&taker2_from, Amount::from_coins(2));
    let fee2 = net.chains.block.fund(&taker2_from, Amount::from_coins(1));
    let raw2 = net.chains.block.make_fee_tx(&taker2_from, Amount::from_units(100_000));
    net.trader_mut(2)
        .accept_order(
            id,
            TakerAcceptParams {
                from: taker2_from,
                to: taker2_to,
                utxos: vec![utxo2],
                fee_utxos: vec![fee2],
                raw_fee_tx: raw2,
                refund_address: None,
            },
        )
        .await
        .unwrap();

    net.pump().await;

    // Exactly one taker joined, and it is the first one.
    let finished = net.hub.registry().archived(&id).expect("swap completed");
    assert_eq!(finished.state, ax_03_swap_session::HubState::Finished);
    assert_eq!(finished.b.as_ref().unwrap().address, TAKER_FROM);

    // The winning pair settled. The loser saw the finish announcement and
    // archived its own record without ever depositing.
    assert_eq!(archived_state(net.trader(1), &id), Some(TradeState::Finished));
    let loser = net.trader(2).book().archived(&id).expect("loser archived");
    assert!(loser.bin_txid.is_none());
    assert!(loser.secret.is_none());
}

#[tokio::test]
async fn test_bad_maker_deposit_script_cancels() {
    // Scripted hub: this test plays the hub against a single real taker.
    let wire = Wire::new();
    let chains = crate::swap_net::Chains::new();
    let hub_keypair = KeyPair::generate();
    let hub_address: XAddress = [0xEE; 20];
    let maker_keypair = KeyPair::generate();
    let id = OrderId::from_bytes([0xAB; 32]);

    let mut bridges: std::collections::HashMap<_, Arc<dyn ChainBridge>> =
        std::collections::HashMap::new();
    let block_bridge: Arc<dyn ChainBridge> = chains.block.clone();
    let ltc_bridge: Arc<dyn ChainBridge> = chains.ltc.clone();
    bridges.insert(block(), block_bridge);
    bridges.insert(ltc(), ltc_bridge);

    let mut taker = Session::new_trader(
        SessionConfig::default(),
        bridges,
        wire.clone(),
        Arc::new(NullNotifier),
        Arc::new(UtxoLockTable::new()),
        None,
    );

    // Advert.
    let advert = PendingTransactionBody {
        id,
        src_currency: block(),
        src_amount: Amount::from_coins(10),
        dst_currency: ltc(),
        dst_amount: Amount::from_coins(1),
        hub_address,
        timestamp: 1_700_000_000,
        anchor: [9u8; 32],
    };
    deliver(
        &mut taker,
        Packet::signed(Command::PendingTransaction, advert.encode(), &hub_keypair).unwrap(),
    )
    .await;

    // Accept.
    let utxo = chains.ltc.fund(&TAKER_FROM, Amount::from_coins(2));
    let fee_utxo = chains.block.fund(&TAKER_FROM, Amount::from_coins(1));
    let raw_fee_tx = chains.block.make_fee_tx(&TAKER_FROM, Amount::from_units(100_000));
    taker
        .accept_order(
            id,
            TakerAcceptParams {
                from: TAKER_FROM,
                to: TAKER_TO,
                utxos: vec![utxo],
                fee_utxos: vec![fee_utxo],
                raw_fee_tx,
                refund_address: None,
            },
        )
        .await
        .unwrap();

    // Hold and init.
    let hold = HoldBody { hub_address, id };
    deliver(
        &mut taker,
        Packet::signed(Command::TransactionHold, hold.encode(), &hub_keypair).unwrap(),
    )
    .await;
    let init = InitBody {
        dest: TAKER_TO,
        hub_address,
        id,
        from: TAKER_FROM,
        from_currency: ltc(),
        from_amount: Amount::from_coins(1),
        to: TAKER_TO,
        to_currency: block(),
        to_amount: Amount::from_coins(10),
    };
    deliver(
        &mut taker,
        Packet::signed(Command::TransactionInit, init.encode(), &hub_keypair).unwrap(),
    )
    .await;
    assert_eq!(
        taker.book().get(&id).map(|o| o.state),
        Some(TradeState::Initialized)
    );

    // A deposit exists on chain A, but it pays some unrelated script.
    let maker_coin = chains.block.fund(&MAKER_FROM, Amount::from_coins(11));
    let rogue_deposit = chains
        .block
        .create_deposit_transaction(
            &[TxInput {
                txid: maker_coin.txid.clone(),
                vout: maker_coin.vout,
                amount: maker_coin.amount,
            }],
            &[TxOutput {
                address: "BLOCK:p2sh:0000000000000000000000000000000000000000".to_string(),
                amount: Amount::from_coins(10),
            }],
        )
        .await
        .unwrap();
    chains
        .block
        .send_raw_transaction(&rogue_deposit.raw_tx)
        .await
        .unwrap();

    // CreateB claims a hashed secret the deposit never locked.
    let locktime_a = chains.block.height() + 200;
    let create_b = CreateBBody {
        hub_address,
        id,
        counterparty_pubkey: maker_keypair.public_key(),
        a_bin_txid: rogue_deposit.txid.clone(),
        hashed_secret: [7u8; 20],
        locktime_a,
    };
    deliver(
        &mut taker,
        Packet::signed(Command::TransactionCreateB, create_b.encode(), &hub_keypair).unwrap(),
    )
    .await;

    // The taker refused to deposit and cancelled with the deposit reason.
    let order = taker.book().archived(&id).expect("order archived");
    assert_eq!(order.state, TradeState::Cancelled);
    assert_eq!(order.reason, Some(TxCancelReason::BadADepositTx));
    assert!(order.bin_txid.is_none());

    // The cancel went out to the network with the same reason.
    let mut cancel_seen = false;
    while let Some((_, packet)) = wire.pop() {
        if packet.command() == Command::TransactionCancel {
            if let Ok(Message::TransactionCancel(body)) = Message::decode(&packet) {
                assert_eq!(body.id, id);
                assert_eq!(body.reason, TxCancelReason::BadADepositTx);
                cancel_seen = true;
            }
        }
    }
    assert!(cancel_seen);
}

#[tokio::test]
async fn test_mid_flight_cancel_rolls_back_both() {
    let mut net = SwapNet::new(&[maker_addrs(), taker_addrs()]);
    // Freeze the flow right after both deposits.
    net.drop_commands = vec![Command::TransactionConfirmA];

    let id = publish_order(&mut net).await;
    accept_order(&mut net, 1, id, TAKER_FROM, TAKER_TO).await;

    assert_eq!(
        net.trader(0).book().get(&id).map(|o| o.state),
        Some(TradeState::Created)
    );
    assert_eq!(
        net.trader(1).book().get(&id).map(|o| o.state),
        Some(TradeState::Created)
    );

    // The maker walks away mid-flight.
    net.drop_commands.clear();
    net.trader_mut(0)
        .user_cancel(id, TxCancelReason::UserRequest)
        .await
        .unwrap();
    net.pump().await;

    assert_eq!(
        net.trader(0).book().get(&id).map(|o| o.state),
        Some(TradeState::Rollback)
    );
    assert_eq!(
        net.trader(1).book().get(&id).map(|o| o.state),
        Some(TradeState::Rollback)
    );

    // Locktimes expire on both chains; both refunds land.
    net.chains.block.advance_blocks(250);
    net.chains.ltc.advance_blocks(250);
    net.tick_all().await;

    let maker = net.trader(0).book().archived(&id).expect("maker archived");
    let taker = net.trader(1).book().archived(&id).expect("taker archived");
    assert_eq!(maker.state, TradeState::Cancelled);
    assert_eq!(taker.state, TradeState::Cancelled);
    assert_eq!(maker.reason, Some(TxCancelReason::UserRequest));
    assert!(net.chains.block.is_confirmed(maker.ref_txid.as_ref().unwrap()));
    assert!(net.chains.ltc.is_confirmed(taker.ref_txid.as_ref().unwrap()));
}

#[tokio::test]
async fn test_maker_utxo_spent_causes_bad_utxo_cancel() {
    let mut net = SwapNet::new(&[maker_addrs(), taker_addrs()]);

    let utxo = net.chains.block.fund(&MAKER_FROM, Amount::from_coins(11));
    let params = MakerOrderParams {
        from_currency: block(),
        from_amount: Amount::from_coins(10),
        to_currency: ltc(),
        to_amount: Amount::from_coins(1),
        from: MAKER_FROM,
        to: MAKER_TO,
        utxos: vec![utxo.clone()],
        anchor: [9u8; 32],
        refund_address: None,
    };
    let id = net.trader_mut(0).submit_order(params).await.unwrap();
    net.pump().await;

    // The maker double-spends its commitment before anyone accepts.
    net.chains.block.spend_elsewhere(&utxo);

    accept_order(&mut net, 1, id, TAKER_FROM, TAKER_TO).await;

    let maker = net.trader(0).book().archived(&id).expect("maker archived");
    assert_eq!(maker.state, TradeState::Cancelled);
    assert_eq!(maker.reason, Some(TxCancelReason::BadUtxo));
    let taker = net.trader(1).book().archived(&id).expect("taker archived");
    assert_eq!(taker.state, TradeState::Cancelled);

    // The hub never promoted the order.
    assert!(net.hub.registry().active(&id).is_none());
}

#[tokio::test]
async fn test_order_id_mismatch_dropped() {
    let mut net = SwapNet::new(&[maker_addrs()]);
    let utxo = net.chains.block.fund(&MAKER_FROM, Amount::from_coins(11));

    // A well-formed, well-funded advert whose id is not the hash of its
    // own fields.
    let body = TransactionBody {
        id: OrderId::from_bytes([0xFF; 32]),
        src_addr: MAKER_FROM,
        src_currency: block(),
        src_amount: Amount::from_coins(10),
        dst_addr: MAKER_TO,
        dst_currency: ltc(),
        dst_amount: Amount::from_coins(1),
        timestamp: 1_700_000_000,
        anchor: [9u8; 32],
        utxos: vec![utxo],
    };
    let keypair = KeyPair::generate();
    let packet =
        Packet::signed(Command::Transaction, body.encode().unwrap(), &keypair).unwrap();
    deliver(&mut net.hub, packet).await;

    assert_eq!(net.hub.registry().pending_len(), 0);
    assert!(net.wire.is_empty());
}

#[tokio::test]
async fn test_forged_hold_is_rejected_by_pinned_key() {
    let mut net = SwapNet::new(&[maker_addrs(), taker_addrs()]);
    let id = publish_order(&mut net).await;

    // A hold signed by anyone but the pinned service node must not move
    // the order.
    let hold = HoldBody {
        hub_address: net.hub.session_id().as_address(),
        id,
    };
    let forged = Packet::signed(
        Command::TransactionHold,
        hold.encode(),
        &KeyPair::generate(),
    )
    .unwrap();
    deliver(net.trader_mut(0), forged).await;
    assert_eq!(
        net.trader(0).book().get(&id).map(|o| o.state),
        Some(TradeState::Pending)
    );

    // The real flow is unaffected.
    accept_order(&mut net, 1, id, TAKER_FROM, TAKER_TO).await;
    assert_eq!(archived_state(net.trader(0), &id), Some(TradeState::Finished));
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let mut net = SwapNet::new(&[maker_addrs(), taker_addrs()]);
    let id = publish_order(&mut net).await;

    net.trader_mut(0)
        .user_cancel(id, TxCancelReason::UserRequest)
        .await
        .unwrap();
    net.pump().await;
    let first = archived_state(net.trader(0), &id);
    assert_eq!(first, Some(TradeState::Cancelled));

    // A second cancel changes nothing.
    net.trader_mut(0)
        .user_cancel(id, TxCancelReason::BadUtxo)
        .await
        .unwrap();
    net.pump().await;
    let maker = net.trader(0).book().archived(&id).unwrap();
    assert_eq!(maker.state, TradeState::Cancelled);
    assert_eq!(maker.reason, Some(TxCancelReason::UserRequest));
}
