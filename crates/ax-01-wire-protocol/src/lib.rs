//! # AX-01 Wire Protocol
//!
//! Framed packet codec for the swap protocol.
//!
//! ## Frame Layout
//!
//! ```text
//! [0..3]   uint32 version            (== PROTOCOL_VERSION, little endian)
//! [4]      uint8  command
//! [5..]    payload                   (per-command layout, see `payloads`)
//! [...]    pubkey                    (33 bytes, compressed secp256k1)
//! [...]    signature                 (65 bytes, recoverable)
//! ```
//!
//! The codec fails closed: wrong version, malformed length, or a bad
//! signature drops the packet without propagating an error to the peer.
//! Command byte values are part of the wire protocol and never change.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod command;
pub mod errors;
pub mod packet;
pub mod payloads;

pub use command::{Command, SizeRule};
pub use errors::WireError;
pub use packet::{Packet, HEADER_SIZE, PROTOCOL_VERSION, TRAILER_SIZE};
pub use payloads::{
    AcceptingBody, CancelBody, ConfirmABody, ConfirmBBody, ConfirmedABody, ConfirmedBBody,
    CreateABody, CreateBBody, CreatedABody, CreatedBBody, FinishedBody, HoldApplyBody, HoldBody,
    InitBody, InitializedBody, Message, PendingTransactionBody, TransactionBody,
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
