//! # Command Table
//!
//! Wire command bytes. The numeric values are frozen: peers running older
//! builds must keep agreeing on them.

use crate::errors::WireError;

/// Wire command byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// No-op / unknown-command sink.
    Invalid = 0,
    /// Service announcement (currently routed to the no-op handler).
    Announce = 1,
    /// Peer chat relay (currently routed to the no-op handler).
    XChatMessage = 2,
    /// Service liveness ping (currently routed to the no-op handler).
    ServicesPing = 3,
    /// Maker publishes a new order to the hub.
    Transaction = 4,
    /// Hub re-broadcasts a validated order to the network.
    PendingTransaction = 5,
    /// Taker asks the hub to join an order.
    TransactionAccepting = 6,
    /// Trader acknowledges a hold.
    TransactionHoldApply = 7,
    /// Hub freezes an order pair for setup.
    TransactionHold = 8,
    /// Hub sends swap parameters to both traders.
    TransactionInit = 9,
    /// Trader acknowledges init (Taker attaches its fee tx id).
    TransactionInitialized = 10,
    /// Hub instructs the Maker to create its deposit.
    TransactionCreateA = 11,
    /// Hub instructs the Taker to verify A's deposit and create its own.
    TransactionCreateB = 12,
    /// Maker reports its deposit.
    TransactionCreatedA = 13,
    /// Taker reports its deposit.
    TransactionCreatedB = 14,
    /// Hub instructs the Maker to redeem B's deposit (revealing the secret).
    TransactionConfirmA = 15,
    /// Hub instructs the Taker to extract the secret and redeem A's deposit.
    TransactionConfirmB = 16,
    /// Maker reports its redeem transaction.
    TransactionConfirmedA = 17,
    /// Taker reports its redeem transaction.
    TransactionConfirmedB = 18,
    /// Any party aborts the order with a reason code.
    TransactionCancel = 19,
    /// Hub announces a completed swap.
    TransactionFinished = 20,
}

/// Payload size rule for a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeRule {
    /// Payload size is unconstrained (opaque commands).
    Any,
    /// Payload must be exactly this many bytes.
    Exact(usize),
    /// Payload must be at least this many bytes.
    AtLeast(usize),
    /// Payload must be within this inclusive range.
    Within(usize, usize),
}

impl SizeRule {
    /// Check a payload length against the rule.
    pub fn allows(&self, len: usize) -> bool {
        match *self {
            SizeRule::Any => true,
            SizeRule::Exact(n) => len == n,
            SizeRule::AtLeast(n) => len >= n,
            SizeRule::Within(min, max) => len >= min && len <= max,
        }
    }
}

impl Command {
    /// Decode a command byte.
    pub fn from_byte(byte: u8) -> Result<Self, WireError> {
        Ok(match byte {
            0 => Self::Invalid,
            1 => Self::Announce,
            2 => Self::XChatMessage,
            3 => Self::ServicesPing,
            4 => Self::Transaction,
            5 => Self::PendingTransaction,
            6 => Self::TransactionAccepting,
            7 => Self::TransactionHoldApply,
            8 => Self::TransactionHold,
            9 => Self::TransactionInit,
            10 => Self::TransactionInitialized,
            11 => Self::TransactionCreateA,
            12 => Self::TransactionCreateB,
            13 => Self::TransactionCreatedA,
            14 => Self::TransactionCreatedB,
            15 => Self::TransactionConfirmA,
            16 => Self::TransactionConfirmB,
            17 => Self::TransactionConfirmedA,
            18 => Self::TransactionConfirmedB,
            19 => Self::TransactionCancel,
            20 => Self::TransactionFinished,
            other => return Err(WireError::UnknownCommand(other)),
        })
    }

    /// The wire byte.
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Payload size rule for this command.
    pub fn size_rule(&self) -> SizeRule {
        match self {
            Self::Invalid | Self::Announce | Self::XChatMessage | Self::ServicesPing => {
                SizeRule::Any
            }
            Self::Transaction => SizeRule::AtLeast(152),
            Self::PendingTransaction => SizeRule::Exact(124),
            Self::TransactionAccepting => SizeRule::AtLeast(164),
            Self::TransactionHoldApply => SizeRule::Exact(72),
            Self::TransactionHold => SizeRule::Exact(52),
            Self::TransactionInit => SizeRule::Exact(144),
            Self::TransactionInitialized => SizeRule::Exact(104),
            Self::TransactionCreateA => SizeRule::Exact(85),
            Self::TransactionCreateB => SizeRule::AtLeast(110),
            Self::TransactionCreatedA => SizeRule::AtLeast(77),
            Self::TransactionCreatedB => SizeRule::AtLeast(57),
            Self::TransactionConfirmA => SizeRule::AtLeast(57),
            Self::TransactionConfirmB => SizeRule::Within(53, 999),
            Self::TransactionConfirmedA => SizeRule::Within(53, 999),
            Self::TransactionConfirmedB => SizeRule::Within(53, 999),
            Self::TransactionCancel => SizeRule::Exact(36),
            Self::TransactionFinished => SizeRule::Exact(32),
        }
    }

    /// Short name for log lines and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Announce => "Announce",
            Self::XChatMessage => "XChatMessage",
            Self::ServicesPing => "ServicesPing",
            Self::Transaction => "Transaction",
            Self::PendingTransaction => "PendingTransaction",
            Self::TransactionAccepting => "TransactionAccepting",
            Self::TransactionHoldApply => "TransactionHoldApply",
            Self::TransactionHold => "TransactionHold",
            Self::TransactionInit => "TransactionInit",
            Self::TransactionInitialized => "TransactionInitialized",
            Self::TransactionCreateA => "TransactionCreateA",
            Self::TransactionCreateB => "TransactionCreateB",
            Self::TransactionCreatedA => "TransactionCreatedA",
            Self::TransactionCreatedB => "TransactionCreatedB",
            Self::TransactionConfirmA => "TransactionConfirmA",
            Self::TransactionConfirmB => "TransactionConfirmB",
            Self::TransactionConfirmedA => "TransactionConfirmedA",
            Self::TransactionConfirmedB => "TransactionConfirmedB",
            Self::TransactionCancel => "TransactionCancel",
            Self::TransactionFinished => "TransactionFinished",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_values_frozen() {
        assert_eq!(Command::Invalid.as_byte(), 0);
        assert_eq!(Command::Transaction.as_byte(), 4);
        assert_eq!(Command::TransactionHoldApply.as_byte(), 7);
        assert_eq!(Command::TransactionHold.as_byte(), 8);
        assert_eq!(Command::TransactionConfirmB.as_byte(), 16);
        assert_eq!(Command::TransactionConfirmedA.as_byte(), 17);
        assert_eq!(Command::TransactionFinished.as_byte(), 20);
    }

    #[test]
    fn test_roundtrip_all_bytes() {
        for byte in 0u8..=20 {
            let cmd = Command::from_byte(byte).unwrap();
            assert_eq!(cmd.as_byte(), byte);
        }
    }

    #[test]
    fn test_unknown_byte_fails() {
        assert_eq!(Command::from_byte(21), Err(WireError::UnknownCommand(21)));
        assert_eq!(Command::from_byte(255), Err(WireError::UnknownCommand(255)));
    }

    #[test]
    fn test_size_rules() {
        assert!(Command::TransactionHold.size_rule().allows(52));
        assert!(!Command::TransactionHold.size_rule().allows(51));
        assert!(!Command::TransactionHold.size_rule().allows(53));
        assert!(Command::Transaction.size_rule().allows(300));
        assert!(!Command::Transaction.size_rule().allows(151));
        assert!(Command::TransactionConfirmedA.size_rule().allows(53));
        assert!(!Command::TransactionConfirmedA.size_rule().allows(1000));
    }
}
