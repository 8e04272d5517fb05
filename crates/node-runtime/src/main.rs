//! # Atomix Node
//!
//! Entry point for a swap node: a trader by default, a hub when
//! `AX_EXCHANGE_ENABLED` is set. The node owns one session actor and its
//! watchdog; the p2p transport drains the outbound relay channel and feeds
//! inbound packets into the session mailbox.

pub mod config;
pub mod relay;
pub mod wiring;

use anyhow::Result;
use atomix_telemetry::TelemetryConfig;
use tracing::info;

use crate::config::NodeConfig;
use crate::relay::OutboundPacket;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let _guard = atomix_telemetry::init_telemetry(&telemetry)?;

    let config = NodeConfig::from_env();
    info!(
        exchange = config.exchange_enabled,
        currencies = config.currencies.len(),
        "starting atomix node"
    );

    let wiring::Node {
        session,
        mut outbound,
        tasks,
    } = wiring::build_node(&config)?;

    // Until a p2p transport is attached, loop outbound traffic back into
    // the session: broadcasts a hub emits are also packets it may consume.
    let loopback = tokio::spawn(async move {
        while let Some(packet) = outbound.recv().await {
            let packet = match packet {
                OutboundPacket::Direct { packet, .. } => packet,
                OutboundPacket::Broadcast { packet } => packet,
            };
            if session.deliver(packet).await.is_err() {
                break;
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    loopback.abort();
    for task in tasks {
        task.abort();
    }
    Ok(())
}
