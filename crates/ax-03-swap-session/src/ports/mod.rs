//! # Session Ports

pub mod outbound;

pub use outbound::{MemorySender, NullNotifier, PacketSender, RecordingNotifier, UiNotifier};
