//! Error types for shared rate types.

use thiserror::Error;

/// Errors raised when parsing currency codes from user input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyCodeError {
    /// Code is not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    Malformed(String),
}
