//! # Session Errors

use ax_01_wire_protocol::WireError;
use ax_02_chain_bridge::BridgeError;
use shared_types::{Currency, OrderId};
use thiserror::Error;

/// Errors raised inside the session engine.
///
/// None of these cross the dispatch boundary as failures a peer can see;
/// they are folded into the dispatch result (drop / retry / cancel).
#[derive(Debug, Error)]
pub enum SessionError {
    /// No order with this id is known locally.
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    /// The order exists but is not locally owned (no keys).
    #[error("order {0} is not local")]
    NotLocal(OrderId),

    /// No wallet driver is configured for the currency.
    #[error("no chain bridge for {0}")]
    NoBridge(Currency),

    /// A UTXO is already committed to another order.
    #[error("utxo {txid}:{vout} already locked")]
    UtxoLocked {
        /// Funding transaction id.
        txid: String,
        /// Output index.
        vout: u32,
    },

    /// The packet transport rejected a send.
    #[error("transport error: {0}")]
    Transport(String),

    /// Wallet driver failure.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Packet encode failure (bad field in our own data).
    #[error(transparent)]
    Wire(#[from] WireError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SessionError::UtxoLocked {
            txid: "ab".to_string(),
            vout: 3,
        };
        assert!(err.to_string().contains("ab:3"));
    }
}
