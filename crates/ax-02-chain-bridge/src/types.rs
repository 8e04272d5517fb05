//! # Bridge Value Types

use shared_crypto::SwapSecret;
use shared_types::Amount;

/// Wallet/chain status snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalletInfo {
    /// Current best block height.
    pub blocks: u32,
}

/// An input to a constructed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// Previous transaction id (hex).
    pub txid: String,
    /// Previous output index.
    pub vout: u32,
    /// Previous output value.
    pub amount: Amount,
}

/// An output of a constructed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Destination address in the chain's string form.
    pub address: String,
    /// Value.
    pub amount: Amount,
}

/// A funded, signed deposit transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedDeposit {
    /// Transaction id (hex).
    pub txid: String,
    /// Index of the HTLC output.
    pub vout: u32,
    /// Raw transaction, ready for broadcast.
    pub raw_tx: String,
}

/// A signed refund or redeem transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTx {
    /// Transaction id (hex).
    pub txid: String,
    /// Raw transaction, ready for broadcast.
    pub raw_tx: String,
}

/// Result of probing a counterparty deposit transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositCheck {
    /// Output index paying the expected P2SH address.
    pub vout: u32,
    /// Amount locked beyond the agreed amount; forwarded into the redeem.
    pub overpayment: Amount,
    /// False when the deposit does not match the expected script or amount.
    pub is_good: bool,
}

/// Result of probing a counterparty redeem for the revealed secret.
#[derive(Clone, Debug)]
pub enum SecretProbe {
    /// The spending transaction is not visible yet; keep watching.
    NotFound,
    /// A spend exists but its preimage does not match the hashed secret.
    Mismatch,
    /// The preimage was extracted.
    Found(SwapSecret),
}

/// A chain-queried view of a committed UTXO.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoInfo {
    /// Output value.
    pub amount: Amount,
    /// Owning address in the chain's string form.
    pub address: String,
}
