//! # AX-02 Chain Bridge
//!
//! The abstraction over per-currency wallet drivers: fee policy, HTLC
//! script construction, deposit/refund/redeem transaction building and
//! submission, deposit probing, and secret extraction.
//!
//! Real deployments implement [`ChainBridge`] against a wallet RPC; tests
//! and simulations use [`mock::MockChainBridge`], which runs a small
//! in-memory chain with real spend tracking and secret reveal.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod errors;
pub mod htlc;
pub mod mock;
pub mod types;

pub use bridge::ChainBridge;
pub use errors::{BridgeError, RpcErrorCode};
pub use htlc::{build_htlc_script, encode_locktime, script_hash, HtlcScriptParams};
pub use mock::{MockChainBridge, MockChainConfig};
pub use types::{
    CreatedDeposit, DepositCheck, SecretProbe, SignedTx, TxInput, TxOutput, UtxoInfo, WalletInfo,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
