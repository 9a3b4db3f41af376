//! Error types for the device driver

use rn_protocol::{CommandError, ParseError};
use thiserror::Error;

/// Errors that can occur while talking to a transceiver
#[derive(Debug, Error)]
pub enum DeviceError {
    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or enumerated
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The stream ended while a response was expected
    #[error("serial device closed the connection")]
    Closed,

    /// The module rejected the command
    #[error("command failed: {0}")]
    Command(#[from] CommandError),

    /// A response could not be decoded
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),

    /// `radio tx` completed with `radio_err`
    #[error("transmission unsuccessful, interrupted by radio WDT")]
    TransmitFailed,

    /// `radio rx` completed with `radio_err`
    #[error("reception unsuccessful, timeout occurred")]
    ReceiveTimeout,

    /// A block NVM access failed part way through
    #[error("NVM access at 0x{address:04X} failed: {source}")]
    Nvm {
        /// Address of the byte that failed
        address: u16,
        /// The underlying failure
        #[source]
        source: Box<DeviceError>,
    },
}

impl DeviceError {
    /// The module's rejection behind this error, looking through NVM context
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            DeviceError::Command(e) => Some(e),
            DeviceError::Nvm { source, .. } => source.command_error(),
            _ => None,
        }
    }
}
