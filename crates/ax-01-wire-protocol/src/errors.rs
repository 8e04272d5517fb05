//! # Wire Errors
//!
//! All of these are *drop* conditions: the packet is discarded without any
//! state change and without replying to the peer.

use thiserror::Error;

/// Errors decoding or verifying a wire packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Frame shorter than header + trailer.
    #[error("frame truncated: {0} bytes")]
    Truncated(usize),

    /// Protocol version field does not match [`crate::PROTOCOL_VERSION`].
    #[error("protocol version mismatch: got {0}")]
    BadVersion(u32),

    /// Command byte outside the known table.
    #[error("unknown command byte {0}")]
    UnknownCommand(u8),

    /// Payload violates the command's size rule.
    #[error("bad payload size for {command}: {got} bytes")]
    BadPayloadSize {
        /// Command whose rule was violated.
        command: &'static str,
        /// Observed payload size.
        got: usize,
    },

    /// Payload field ran past the end of the buffer.
    #[error("payload field out of bounds: {0}")]
    OutOfBounds(&'static str),

    /// A zero-terminated string field was not terminated or not UTF-8.
    #[error("bad string field: {0}")]
    BadString(&'static str),

    /// A transaction id field was not valid hex of the right length.
    #[error("bad txid field: {0}")]
    BadTxId(&'static str),

    /// Embedded public key is not a valid curve point.
    #[error("bad public key in payload")]
    BadPublicKey,

    /// A currency field was not valid.
    #[error("bad currency field")]
    BadCurrency,

    /// Attached signature failed verification.
    #[error("bad packet signature")]
    BadSignature,
}
