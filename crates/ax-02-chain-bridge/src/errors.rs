//! # Bridge Errors
//!
//! Wallet RPC failures keep their protocol error codes because the session
//! layer branches on them: missing inputs means wait for the deposit,
//! already-in-chain means the broadcast already succeeded.

use thiserror::Error;

/// Wallet RPC error codes the session layer distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum RpcErrorCode {
    /// Generic wallet error.
    MiscError = -1,
    /// Transaction or block failed verification (typically missing inputs).
    VerifyError = -25,
    /// Transaction rejected by network rules (e.g. non-final locktime).
    VerifyRejected = -26,
    /// Transaction already in chain; success for refund/redeem replays.
    VerifyAlreadyInChain = -27,
}

impl RpcErrorCode {
    /// Numeric code as reported by the wallet.
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// Errors from wallet driver operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The wallet RPC returned an error code.
    #[error("rpc error {code:?}: {message}")]
    Rpc {
        /// Protocol error code.
        code: RpcErrorCode,
        /// Wallet-supplied message.
        message: String,
    },

    /// The wallet is unreachable; treat as transient.
    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    /// The driver could not produce a locktime (chain info missing).
    #[error("locktime unavailable for role {0}")]
    NoLockTime(char),
}

impl BridgeError {
    /// Shorthand constructor for RPC failures.
    pub fn rpc(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// True when the error is `RPC_VERIFY_ALREADY_IN_CHAIN`.
    pub fn is_already_in_chain(&self) -> bool {
        matches!(
            self,
            Self::Rpc {
                code: RpcErrorCode::VerifyAlreadyInChain,
                ..
            }
        )
    }

    /// True when the error is `RPC_VERIFY_ERROR` (missing inputs).
    pub fn is_missing_inputs(&self) -> bool {
        matches!(
            self,
            Self::Rpc {
                code: RpcErrorCode::VerifyError,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RpcErrorCode::VerifyError.code(), -25);
        assert_eq!(RpcErrorCode::VerifyAlreadyInChain.code(), -27);
    }

    #[test]
    fn test_predicates() {
        let err = BridgeError::rpc(RpcErrorCode::VerifyAlreadyInChain, "already known");
        assert!(err.is_already_in_chain());
        assert!(!err.is_missing_inputs());

        let err = BridgeError::rpc(RpcErrorCode::VerifyError, "missing inputs");
        assert!(err.is_missing_inputs());
    }
}
