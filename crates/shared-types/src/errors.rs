//! # Shared Type Errors

use thiserror::Error;

/// Errors constructing shared domain types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A fixed-size field had the wrong length.
    #[error("bad length for {what}: expected {expected}, got {got}")]
    BadLength {
        /// What was being constructed.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        got: usize,
    },

    /// A currency ticker was empty, too long, or not ASCII.
    #[error("bad currency ticker: {0}")]
    BadCurrency(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypeError::BadLength {
            what: "order id",
            expected: 32,
            got: 31,
        };
        assert!(err.to_string().contains("order id"));
        assert!(err.to_string().contains("31"));
    }
}
