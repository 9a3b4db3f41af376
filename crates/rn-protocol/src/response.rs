//! Response line classification

use tracing::trace;

use crate::error::CommandError;

/// Command accepted
pub const OK: &str = "ok";
/// Command or parameter rejected
pub const INVALID_PARAM: &str = "invalid_param";
/// Transceiver busy with another operation
pub const BUSY: &str = "busy";
/// Deferred response: transmission complete
pub const RADIO_TX_OK: &str = "radio_tx_ok";
/// Deferred response: transmission or reception failed
pub const RADIO_ERR: &str = "radio_err";
/// Deferred response prefix: packet received, followed by its hex payload
pub const RADIO_RX: &str = "radio_rx";

/// Check a response line against the known status tokens
///
/// `ok` passes and the error tokens fail. Any other line passes when
/// `allow_unknown` is set (it carries a value, e.g. a `sys get` result) and
/// fails as [`CommandError::Unknown`] otherwise.
pub fn check_command_response(line: &str, allow_unknown: bool) -> Result<(), CommandError> {
    match line {
        OK => Ok(()),
        INVALID_PARAM => Err(CommandError::InvalidParam),
        BUSY => Err(CommandError::Busy),
        _ if allow_unknown => {
            trace!("Passing through value response: {}", line);
            Ok(())
        }
        _ => Err(CommandError::Unknown(line.to_string())),
    }
}

/// Extract the hex payload from a `radio_rx <hex>` line
pub fn parse_radio_rx(line: &str) -> Option<&str> {
    line.strip_prefix(RADIO_RX).map(str::trim)
}
