//! # AX-03 Swap Session
//!
//! The protocol engine: per-participant session actors that decode packets,
//! run the ordered swap state machine, drive deposits/redeems through the
//! chain bridges, and roll back failed orders.
//!
//! ## Module Structure
//!
//! ```text
//! ax-03-swap-session/
//! ├── domain/     # orders, hub-side order pairs, states, invariants
//! ├── registry/   # order books and the process-wide UTXO lock table
//! ├── ports/      # packet sender and UI notifier ports (+ mocks)
//! ├── service/    # session actor, hub/trader handlers, watchdog
//! └── txlog       # best-effort raw-transaction journal
//! ```
//!
//! A session is the unit of serialization: it owns its order state and
//! processes one command at a time from its mailbox, so no handler ever
//! observes another handler mid-flight. Multiple sessions (hub plus any
//! number of traders) run concurrently in one process, sharing only the
//! UTXO lock table.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod registry;
pub mod service;
pub mod txlog;

pub use domain::{
    ExchangeOrder, HubState, MakerOrderParams, SessionError, TakerAcceptParams, TradeState,
    TraderOrder,
};
pub use ports::{MemorySender, NullNotifier, PacketSender, RecordingNotifier, UiNotifier};
pub use registry::{LocalOrderBook, OrderRegistry, UtxoLockTable};
pub use service::{
    spawn_session, spawn_watchdog, Dispatch, FatalReason, RetryReason, Session, SessionCommand,
    SessionConfig, SessionHandle, Side,
};
pub use txlog::TxLog;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
