//! # Simulated Swap Network
//!
//! Deterministic in-memory harness: sessions share a routed packet queue
//! and per-currency mock chains. `pump` drains the queue until quiet,
//! delivering each packet to the owning session, so a whole swap runs as
//! one synchronous, repeatable sequence.

use async_trait::async_trait;
use ax_01_wire_protocol::{Command, Packet};
use ax_02_chain_bridge::{ChainBridge, MockChainBridge};
use ax_03_swap_session::{
    NullNotifier, PacketSender, Session, SessionCommand, SessionConfig, SessionError,
    UtxoLockTable,
};
use parking_lot::Mutex;
use shared_crypto::KeyPair;
use shared_types::{Currency, XAddress};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One queued delivery: `None` destination means broadcast.
type Delivery = (Option<XAddress>, Packet);

/// Shared routed queue standing in for the p2p relay substrate.
#[derive(Default)]
pub struct Wire {
    queue: Mutex<VecDeque<Delivery>>,
}

impl Wire {
    /// Empty wire.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pop the next delivery.
    pub fn pop(&self) -> Option<Delivery> {
        self.queue.lock().pop_front()
    }

    /// Queued deliveries.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[async_trait]
impl PacketSender for Wire {
    async fn send_to(&self, addr: &XAddress, packet: Packet) -> Result<(), SessionError> {
        self.queue.lock().push_back((Some(*addr), packet));
        Ok(())
    }

    async fn broadcast(&self, packet: Packet) -> Result<(), SessionError> {
        self.queue.lock().push_back((None, packet));
        Ok(())
    }
}

/// The standard two-chain fixture: BLOCK (maker side) and LTC (taker side).
pub struct Chains {
    /// Chain A, also the service-fee chain.
    pub block: Arc<MockChainBridge>,
    /// Chain B.
    pub ltc: Arc<MockChainBridge>,
}

impl Chains {
    /// Fresh chains at the default starting height.
    pub fn new() -> Self {
        Self {
            block: Arc::new(MockChainBridge::new(block())),
            ltc: Arc::new(MockChainBridge::new(ltc())),
        }
    }

    fn bridge_map(&self) -> HashMap<Currency, Arc<dyn ChainBridge>> {
        let mut map: HashMap<Currency, Arc<dyn ChainBridge>> = HashMap::new();
        map.insert(block(), self.block.clone());
        map.insert(ltc(), self.ltc.clone());
        map
    }
}

impl Default for Chains {
    fn default() -> Self {
        Self::new()
    }
}

/// Ticker helpers.
pub fn block() -> Currency {
    Currency::new("BLOCK").expect("valid ticker")
}

/// Ticker helpers.
pub fn ltc() -> Currency {
    Currency::new("LTC").expect("valid ticker")
}

/// A full simulated deployment: one hub and any number of traders.
pub struct SwapNet {
    /// Shared packet queue.
    pub wire: Arc<Wire>,
    /// Shared chains.
    pub chains: Chains,
    /// The hub session.
    pub hub: Session,
    /// Trader sessions with their owned routing addresses.
    pub traders: Vec<(Vec<XAddress>, Session)>,
    /// Commands dropped in transit (simulated packet loss).
    pub drop_commands: Vec<Command>,
}

impl SwapNet {
    /// Build a hub plus `trader_addrs.len()` traders. Each trader owns the
    /// listed addresses (its source and destination addresses).
    pub fn new(trader_addrs: &[Vec<XAddress>]) -> Self {
        Self::new_with_hub_config(
            trader_addrs,
            SessionConfig {
                exchange_enabled: true,
                ..Default::default()
            },
        )
    }

    /// Build with explicit hub tuning (timeouts etc.).
    pub fn new_with_hub_config(trader_addrs: &[Vec<XAddress>], mut hub_config: SessionConfig) -> Self {
        hub_config.exchange_enabled = true;
        let wire = Wire::new();
        let chains = Chains::new();

        let hub = Session::new_hub(
            hub_config,
            KeyPair::generate(),
            chains.bridge_map(),
            wire.clone(),
            Arc::new(NullNotifier),
            Arc::new(UtxoLockTable::new()),
            None,
        );

        let traders = trader_addrs
            .iter()
            .map(|addrs| {
                let session = Session::new_trader(
                    SessionConfig::default(),
                    chains.bridge_map(),
                    wire.clone(),
                    Arc::new(NullNotifier),
                    // Each trader is its own process in this simulation, so
                    // each carries its own lock table.
                    Arc::new(UtxoLockTable::new()),
                    None,
                );
                (addrs.clone(), session)
            })
            .collect();

        Self {
            wire,
            chains,
            hub,
            traders,
            drop_commands: Vec::new(),
        }
    }

    async fn deliver(&mut self, delivery: Delivery) {
        let (dest, packet) = delivery;
        if self.drop_commands.contains(&packet.command()) {
            return;
        }
        match dest {
            Some(addr) => {
                if self.hub.session_id().as_address() == addr {
                    self.hub
                        .handle_command(SessionCommand::Packet(packet))
                        .await;
                    return;
                }
                for (addrs, trader) in &mut self.traders {
                    if addrs.contains(&addr) {
                        trader.handle_command(SessionCommand::Packet(packet)).await;
                        return;
                    }
                }
            }
            None => {
                self.hub
                    .handle_command(SessionCommand::Packet(packet.clone()))
                    .await;
                for (_, trader) in &mut self.traders {
                    trader
                        .handle_command(SessionCommand::Packet(packet.clone()))
                        .await;
                }
            }
        }
    }

    /// Drain the wire until quiet.
    pub async fn pump(&mut self) {
        for _ in 0..10_000 {
            let Some(delivery) = self.wire.pop() else {
                return;
            };
            self.deliver(delivery).await;
        }
        panic!("network did not quiesce");
    }

    /// Run one watchdog sweep on every session, then drain the wire.
    pub async fn tick_all(&mut self) {
        self.hub.handle_command(SessionCommand::Tick).await;
        for (_, trader) in &mut self.traders {
            trader.handle_command(SessionCommand::Tick).await;
        }
        self.pump().await;
    }

    /// Trader session by index.
    pub fn trader(&self, index: usize) -> &Session {
        &self.traders[index].1
    }

    /// Mutable trader session by index.
    pub fn trader_mut(&mut self, index: usize) -> &mut Session {
        &mut self.traders[index].1
    }
}
