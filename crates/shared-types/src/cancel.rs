//! # Cancel Reasons
//!
//! Numeric reason codes carried in `TransactionCancel` packets. The values
//! are part of the wire protocol and must stay stable.

use serde::{Deserialize, Serialize};

/// Reason an order was cancelled or rolled back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TxCancelReason {
    /// No reason supplied.
    Unknown = 0,
    /// A trading address failed validation.
    BadAddress = 1,
    /// A committed UTXO is invalid or was spent out from under the order.
    BadUtxo = 2,
    /// The Maker's deposit transaction failed verification.
    BadADepositTx = 3,
    /// The Taker's deposit transaction failed verification.
    BadBDepositTx = 4,
    /// The service-fee transaction could not be stored on the host chain.
    BlocknetError = 5,
    /// A wallet RPC call failed permanently.
    RpcError = 6,
    /// Committed inputs do not cover amount plus fees.
    NoMoney = 7,
    /// An address in the packet does not belong to the order.
    InvalidAddress = 8,
    /// The order stalled past the global timeout.
    Timeout = 9,
    /// Deposit is being reclaimed through the refund path.
    Rollback = 10,
    /// The user asked for the order to be cancelled.
    UserRequest = 11,
}

impl TxCancelReason {
    /// Wire code of the reason.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Decode the wire code, mapping unknown values to [`TxCancelReason::Unknown`].
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::BadAddress,
            2 => Self::BadUtxo,
            3 => Self::BadADepositTx,
            4 => Self::BadBDepositTx,
            5 => Self::BlocknetError,
            6 => Self::RpcError,
            7 => Self::NoMoney,
            8 => Self::InvalidAddress,
            9 => Self::Timeout,
            10 => Self::Rollback,
            11 => Self::UserRequest,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TxCancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::BadAddress => "bad address",
            Self::BadUtxo => "bad utxo",
            Self::BadADepositTx => "bad A deposit tx",
            Self::BadBDepositTx => "bad B deposit tx",
            Self::BlocknetError => "fee chain error",
            Self::RpcError => "rpc error",
            Self::NoMoney => "insufficient funds",
            Self::InvalidAddress => "invalid address",
            Self::Timeout => "timeout",
            Self::Rollback => "rollback",
            Self::UserRequest => "user request",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_stable() {
        assert_eq!(TxCancelReason::BadUtxo.code(), 2);
        assert_eq!(TxCancelReason::Timeout.code(), 9);
        assert_eq!(TxCancelReason::UserRequest.code(), 11);
    }

    #[test]
    fn test_roundtrip() {
        for code in 0..=11 {
            let reason = TxCancelReason::from_code(code);
            assert_eq!(reason.code(), code);
        }
    }

    #[test]
    fn test_unknown_code_maps_to_unknown() {
        assert_eq!(TxCancelReason::from_code(999), TxCancelReason::Unknown);
    }
}
