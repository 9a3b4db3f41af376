//! Error types for RN2483 protocol parsing

use thiserror::Error;

/// Errors that can occur while decoding protocol values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input was not valid hexadecimal
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded value had the wrong number of bytes
    #[error("expected {expected} bytes of hex, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },

    /// Input was not a valid decimal number
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// Firmware version string did not match `<sku> <x.y.z> <date>`
    #[error("invalid firmware version: {0}")]
    InvalidVersion(String),

    /// Pin name not known to the module
    #[error("unknown pin: {0}")]
    UnknownPin(String),
}

/// Status tokens the module answers with when it rejects a command
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// `invalid_param`
    #[error("invalid parameter")]
    InvalidParam,

    /// `busy`
    #[error("the transceiver is currently busy")]
    Busy,

    /// A line that is not among the expected responses
    #[error("unknown response: {0}")]
    Unknown(String),
}
