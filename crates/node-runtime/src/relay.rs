//! # Packet Relay Adapter
//!
//! Bridges the session's [`PacketSender`] port to whatever transport the
//! embedding deployment provides. Outbound packets are pushed onto a
//! channel the transport drains; inbound packets are fed straight into the
//! session mailboxes by the transport task.

use async_trait::async_trait;
use ax_01_wire_protocol::Packet;
use ax_03_swap_session::{PacketSender, SessionError};
use shared_types::XAddress;
use tokio::sync::mpsc;

/// An outbound packet with its routing decision.
#[derive(Debug)]
pub enum OutboundPacket {
    /// Deliver to the session owning the address.
    Direct {
        /// Destination routing address.
        to: XAddress,
        /// The packet.
        packet: Packet,
    },
    /// Flood to all sessions.
    Broadcast {
        /// The packet.
        packet: Packet,
    },
}

/// Channel-backed [`PacketSender`].
pub struct ChannelRelay {
    tx: mpsc::Sender<OutboundPacket>,
}

impl ChannelRelay {
    /// Create a relay and the receiving end the transport drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundPacket>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PacketSender for ChannelRelay {
    async fn send_to(&self, addr: &XAddress, packet: Packet) -> Result<(), SessionError> {
        self.tx
            .send(OutboundPacket::Direct { to: *addr, packet })
            .await
            .map_err(|_| SessionError::Transport("relay channel closed".to_string()))
    }

    async fn broadcast(&self, packet: Packet) -> Result<(), SessionError> {
        self.tx
            .send(OutboundPacket::Broadcast { packet })
            .await
            .map_err(|_| SessionError::Transport("relay channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax_01_wire_protocol::Command;

    #[tokio::test]
    async fn test_relay_routes() {
        let (relay, mut rx) = ChannelRelay::new(8);
        let packet = Packet::unsigned(Command::TransactionFinished, vec![0u8; 32]);

        relay.send_to(&[7u8; 20], packet.clone()).await.unwrap();
        relay.broadcast(packet).await.unwrap();

        match rx.recv().await.unwrap() {
            OutboundPacket::Direct { to, .. } => assert_eq!(to, [7u8; 20]),
            other => panic!("expected direct, got {other:?}"),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            OutboundPacket::Broadcast { .. }
        ));
    }
}
