//! `sys` commands: versions, voltage, GPIO and user NVM

use std::time::Duration;

use rn_protocol::hex::{byte_to_hex, hex_to_byte, pad_hex_to_even_length, u16_to_hex};
use rn_protocol::{encode_boolean, FirmwareVersion, ParseError, PinName, Voltage};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::device::Device;
use crate::error::DeviceError;

impl<T> Device<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Put the module to sleep; returns once it has woken up
    pub async fn sleep(&mut self, duration: Duration) -> Result<(), DeviceError> {
        self.execute_command_checked_strict(&format!("sys sleep {}", duration.as_millis()))
            .await
    }

    /// The preprogrammed EUI node address, as hex
    pub async fn hweui(&mut self) -> Result<String, DeviceError> {
        self.execute_command_checked("sys get hweui").await
    }

    /// Retrieve the firmware version information
    pub async fn version(&mut self) -> Result<FirmwareVersion, DeviceError> {
        self.command_returning_version("sys get ver").await
    }

    /// Reset the module, reverting to its stored configuration
    pub async fn reset(&mut self) -> Result<FirmwareVersion, DeviceError> {
        self.command_returning_version("sys reset").await
    }

    /// Reset the module to its factory configuration, erasing user NVM
    pub async fn factory_reset(&mut self) -> Result<FirmwareVersion, DeviceError> {
        self.command_returning_version("sys factoryRESET").await
    }

    async fn command_returning_version(
        &mut self,
        command: &str,
    ) -> Result<FirmwareVersion, DeviceError> {
        let line = self.execute_command_checked(command).await?;
        Ok(FirmwareVersion::parse(&line)?)
    }

    /// Measure the supply voltage
    pub async fn vdd(&mut self) -> Result<Voltage, DeviceError> {
        let line = self.execute_command_checked("sys get vdd").await?;
        let millivolts = line
            .parse::<u16>()
            .map_err(|_| ParseError::InvalidNumber(line.clone()))?;
        Ok(Voltage(millivolts))
    }

    /// Drive a digital output pin
    pub async fn set_digital_gpio(&mut self, pin: PinName, value: bool) -> Result<(), DeviceError> {
        self.execute_command_checked(&format!(
            "sys set pindig {} {}",
            pin,
            encode_boolean(value)
        ))
        .await?;
        Ok(())
    }

    /// Read one byte of user NVM
    pub async fn read_nvm(&mut self, address: u16) -> Result<u8, DeviceError> {
        let line = self
            .execute_command_checked(&format!("sys get nvm {}", u16_to_hex(address)))
            .await?;
        Ok(hex_to_byte(&pad_hex_to_even_length(&line))?)
    }

    /// Write one byte of user NVM
    pub async fn write_nvm(&mut self, address: u16, value: u8) -> Result<(), DeviceError> {
        self.execute_command_checked_strict(&format!(
            "sys set nvm {} {}",
            u16_to_hex(address),
            byte_to_hex(value)
        ))
        .await
    }

    /// Read `length` consecutive bytes of user NVM starting at `start`
    pub async fn read_nvm_block(&mut self, start: u16, length: u16) -> Result<Vec<u8>, DeviceError> {
        let mut data = Vec::with_capacity(usize::from(length));
        for address in nvm_addresses(start, usize::from(length))? {
            let value = self.read_nvm(address).await.map_err(|e| DeviceError::Nvm {
                address,
                source: Box::new(e),
            })?;
            data.push(value);
        }
        Ok(data)
    }

    /// Write `data` to consecutive bytes of user NVM starting at `start`
    pub async fn write_nvm_block(&mut self, start: u16, data: &[u8]) -> Result<(), DeviceError> {
        for (address, &value) in nvm_addresses(start, data.len())?.zip(data) {
            self.write_nvm(address, value)
                .await
                .map_err(|e| DeviceError::Nvm {
                    address,
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }
}

/// Addresses `start..start + length`, rejecting ranges that wrap the address space
fn nvm_addresses(
    start: u16,
    length: usize,
) -> Result<impl Iterator<Item = u16>, DeviceError> {
    let end = u32::from(start) + length as u32;
    if end > u32::from(u16::MAX) + 1 {
        return Err(DeviceError::Nvm {
            address: start,
            source: Box::new(DeviceError::Command(rn_protocol::CommandError::InvalidParam)),
        });
    }
    Ok((u32::from(start)..end).map(|a| a as u16))
}
