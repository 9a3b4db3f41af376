//! `mac` commands

use std::time::Duration;

use rn_protocol::ParseError;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::device::Device;
use crate::error::DeviceError;

impl<T> Device<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Pause the LoRaWAN stack so the radio can be driven directly
    ///
    /// Returns how long the stack will stay paused.
    pub async fn pause_mac(&mut self) -> Result<Duration, DeviceError> {
        let line = self.execute_command_checked("mac pause").await?;
        let millis: u64 = line
            .parse()
            .map_err(|_| ParseError::InvalidNumber(line.clone()))?;
        Ok(Duration::from_millis(millis))
    }

    /// Resume the LoRaWAN stack after [`Device::pause_mac`]
    pub async fn resume_mac(&mut self) -> Result<(), DeviceError> {
        self.execute_command_checked_strict("mac resume").await
    }
}
