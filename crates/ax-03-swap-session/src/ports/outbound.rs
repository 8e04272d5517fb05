//! # Outbound Ports
//!
//! Traits for the packet relay substrate and the UI notification bus, plus
//! in-memory implementations for tests and simulations.

use crate::domain::errors::SessionError;
use ax_01_wire_protocol::Packet;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{OrderId, XAddress};

/// Packet relay - outbound port.
///
/// `send_to` routes to the session owning `addr`; `broadcast` floods the
/// network. Both are fire-and-forget from the session's point of view.
#[async_trait]
pub trait PacketSender: Send + Sync {
    /// Send a packet towards the session owning `addr`.
    async fn send_to(&self, addr: &XAddress, packet: Packet) -> Result<(), SessionError>;

    /// Flood a packet to every session.
    async fn broadcast(&self, packet: Packet) -> Result<(), SessionError>;
}

/// UI notification bus - outbound port.
pub trait UiNotifier: Send + Sync {
    /// A new order appeared.
    fn order_received(&self, id: &OrderId);

    /// An order changed state.
    fn order_changed(&self, id: &OrderId);
}

// =============================================================================
// In-memory implementations for testing
// =============================================================================

/// Collects sent packets instead of delivering them.
#[derive(Default)]
pub struct MemorySender {
    sent: Mutex<Vec<(Option<XAddress>, Packet)>>,
}

impl MemorySender {
    /// Empty sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything sent so far; `None` address means broadcast.
    pub fn drain(&self) -> Vec<(Option<XAddress>, Packet)> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Number of packets sent so far.
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// True when nothing was sent.
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl PacketSender for MemorySender {
    async fn send_to(&self, addr: &XAddress, packet: Packet) -> Result<(), SessionError> {
        self.sent.lock().push((Some(*addr), packet));
        Ok(())
    }

    async fn broadcast(&self, packet: Packet) -> Result<(), SessionError> {
        self.sent.lock().push((None, packet));
        Ok(())
    }
}

/// Ignores all notifications.
#[derive(Default, Clone, Copy)]
pub struct NullNotifier;

impl UiNotifier for NullNotifier {
    fn order_received(&self, _id: &OrderId) {}
    fn order_changed(&self, _id: &OrderId) {}
}

/// Records notifications for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(OrderId, &'static str)>>,
}

impl RecordingNotifier {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<(OrderId, &'static str)> {
        self.events.lock().clone()
    }
}

impl UiNotifier for RecordingNotifier {
    fn order_received(&self, id: &OrderId) {
        self.events.lock().push((*id, "received"));
    }

    fn order_changed(&self, id: &OrderId) {
        self.events.lock().push((*id, "changed"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax_01_wire_protocol::Command;

    #[tokio::test]
    async fn test_memory_sender_records() {
        let sender = MemorySender::new();
        let packet = Packet::unsigned(Command::TransactionFinished, vec![0u8; 32]);
        sender.send_to(&[1u8; 20], packet.clone()).await.unwrap();
        sender.broadcast(packet).await.unwrap();

        let sent = sender.drain();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Some([1u8; 20]));
        assert_eq!(sent[1].0, None);
        assert!(sender.is_empty());
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        let id = OrderId::from_bytes([1; 32]);
        notifier.order_received(&id);
        notifier.order_changed(&id);
        assert_eq!(notifier.events().len(), 2);
    }
}
