//! `radio` commands: parameters, transmit and receive
//!
//! Transmit and receive answer twice: an immediate `ok` once the command is
//! accepted, then a deferred line when the radio operation finishes.

use std::fmt::Display;

use rn_protocol::hex::{bytes_to_hex, hex_to_bytes, pad_hex_to_even_length};
use rn_protocol::response::{RADIO_ERR, RADIO_TX_OK};
use rn_protocol::{parse_radio_rx, CommandError, ParseError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::device::Device;
use crate::error::DeviceError;

impl<T> Device<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Set a radio parameter (see `rn_protocol::KNOWN_RADIO_PARAMETERS`)
    pub async fn set_radio_parameter(
        &mut self,
        name: &str,
        value: impl Display,
    ) -> Result<(), DeviceError> {
        self.execute_command_checked_strict(&format!("radio set {name} {value}"))
            .await
    }

    /// Get a radio parameter as the raw response string
    pub async fn radio_parameter(&mut self, name: &str) -> Result<String, DeviceError> {
        self.execute_command_checked(&format!("radio get {name}")).await
    }

    /// Set the transmit power
    pub async fn set_radio_power(&mut self, power: i8) -> Result<(), DeviceError> {
        self.set_radio_parameter("pwr", power).await
    }

    /// Get the configured transmit power
    pub async fn radio_power(&mut self) -> Result<i8, DeviceError> {
        let line = self.radio_parameter("pwr").await?;
        Ok(line
            .parse::<i8>()
            .map_err(|_| ParseError::InvalidNumber(line.clone()))?)
    }

    /// Transmit one packet using the radio's current configuration
    pub async fn radio_tx(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        self.execute_command_checked_strict(&format!("radio tx {}", bytes_to_hex(data)))
            .await?;

        let line = self.read_response().await?;
        match line.as_str() {
            RADIO_TX_OK => Ok(()),
            RADIO_ERR => Err(DeviceError::TransmitFailed),
            _ => Err(CommandError::Unknown(line).into()),
        }
    }

    /// Listen for, and return, a single packet
    ///
    /// `window_size` bounds how long the radio listens; its unit depends on
    /// the modulation. `rn_protocol::CONTINUOUS_RECEIVE_MODE` listens until a
    /// packet arrives.
    pub async fn radio_rx(&mut self, window_size: u16) -> Result<Vec<u8>, DeviceError> {
        self.execute_command_checked_strict(&format!("radio rx {window_size}"))
            .await?;

        let line = self.read_response().await?;
        if line == RADIO_ERR {
            return Err(DeviceError::ReceiveTimeout);
        }

        let payload = parse_radio_rx(&line).ok_or_else(|| CommandError::Unknown(line.clone()))?;
        debug!("Received {} hex digits over the air", payload.len());
        Ok(hex_to_bytes(&pad_hex_to_even_length(payload))?)
    }
}
