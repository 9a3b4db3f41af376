//! RN2483 Protocol Library
//!
//! This crate provides the vocabulary of the Microchip RN2483/RN2903 LoRa
//! transceiver's line-oriented text protocol, independent of any I/O:
//!
//! - **Hex codecs**: payloads, NVM addresses and values travel as hex text
//! - **Responses**: the status tokens (`ok`, `invalid_param`, `busy`, ...) and
//!   how to classify a response line
//! - **Pins, NVM and firmware versions**: the typed values behind `sys` commands
//!
//! Commands are plain text terminated by `\r\n`, and every command produces
//! at least one response line. Radio commands (`radio tx`, `radio rx`) produce
//! a second, deferred line once the operation completes.
//!
//! # Example
//!
//! ```rust
//! use rn_protocol::{check_command_response, hex, CommandError};
//!
//! let command = format!("radio tx {}", hex::bytes_to_hex(b"hi"));
//! assert_eq!(command, "radio tx 6869");
//!
//! assert!(check_command_response("ok", false).is_ok());
//! assert_eq!(
//!     check_command_response("busy", true),
//!     Err(CommandError::Busy)
//! );
//! ```

use std::time::Duration;

pub mod error;
pub mod hex;
pub mod nvm;
pub mod pins;
pub mod response;
pub mod version;

pub use error::{CommandError, ParseError};
pub use nvm::{user_nvm_index, USER_NVM_END, USER_NVM_LENGTH, USER_NVM_START};
pub use pins::PinName;
pub use response::{check_command_response, parse_radio_rx};
pub use version::{DeviceSku, FirmwareVersion};

/// Default baud rate of the module's UART
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Longest duration the LoRaWAN stack can be paused for (`mac pause`)
pub const MAX_PAUSE_DURATION: Duration = Duration::from_millis(4_294_967_295);

/// Receive window size that keeps the radio listening until a packet arrives
pub const CONTINUOUS_RECEIVE_MODE: u16 = 0;

/// Parameters accepted by `radio get` / `radio set`
pub const KNOWN_RADIO_PARAMETERS: &[&str] = &[
    "bt", "mod", "freq", "pwr", "sf", "afcbw", "rxbw", "bitrate", "fdev", "prlen", "crc", "iqi",
    "cr", "wdt", "bw", "snr",
];

/// Supply voltage measured by the module, in millivolts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Voltage(pub u16);

impl Voltage {
    /// Voltage in volts
    pub fn volts(&self) -> f64 {
        f64::from(self.0) / 1000.0
    }

    /// Voltage in millivolts
    pub fn millivolts(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for Voltage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3} V", self.volts())
    }
}

/// Encode a boolean the way `sys set pindig` expects it
pub fn encode_boolean(value: bool) -> u8 {
    u8::from(value)
}
