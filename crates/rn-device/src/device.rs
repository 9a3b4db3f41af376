//! Line-oriented command/response transport

use rn_protocol::check_command_response;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio_serial::SerialStream;
use tracing::debug;

use crate::error::DeviceError;
use crate::serial::open_serial;

/// A single RN2483 (or RN2903) transceiver
///
/// Generic over the I/O type to support both real serial ports and
/// simulated modules. For a simulated module, use the `DuplexStream`
/// handed out by the simulator.
pub struct Device<T> {
    io: BufStream<T>,
}

impl Device<SerialStream> {
    /// Open the transceiver attached to a serial port
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, DeviceError> {
        Ok(Self::new(open_serial(port_name, baud_rate)?))
    }
}

impl<T> Device<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a device speaking over the given stream
    pub fn new(io: T) -> Self {
        Self {
            io: BufStream::new(io),
        }
    }

    /// Write a command line, terminated with `\r\n`
    pub async fn send_command(&mut self, command: &str) -> Result<(), DeviceError> {
        debug!("Sending command: {}", command);
        self.io.write_all(command.as_bytes()).await?;
        self.io.write_all(b"\r\n").await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Read one response line, with surrounding whitespace removed
    pub async fn read_response(&mut self) -> Result<String, DeviceError> {
        let mut line = String::new();
        if self.io.read_line(&mut line).await? == 0 {
            return Err(DeviceError::Closed);
        }

        let line = line.trim().to_string();
        debug!("Received response: {}", line);
        Ok(line)
    }

    /// Send a command and return its response line unchecked
    pub async fn execute_command(&mut self, command: &str) -> Result<String, DeviceError> {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// Send a command, failing on known error tokens
    ///
    /// Lines other than the status tokens are returned as the command's value.
    pub async fn execute_command_checked(&mut self, command: &str) -> Result<String, DeviceError> {
        let line = self.execute_command(command).await?;
        check_command_response(&line, true)?;
        Ok(line)
    }

    /// Send a command that must be answered with exactly `ok`
    pub async fn execute_command_checked_strict(&mut self, command: &str) -> Result<(), DeviceError> {
        let line = self.execute_command(command).await?;
        check_command_response(&line, false)?;
        Ok(())
    }

    /// Shut the underlying stream
    pub async fn close(mut self) -> Result<(), DeviceError> {
        self.io.shutdown().await?;
        Ok(())
    }

    /// Unwrap the underlying stream, discarding any buffered input
    pub fn into_inner(self) -> T {
        self.io.into_inner()
    }
}
