//! Serial port access
//!
//! The module's UART runs 8N1 with no flow control, at
//! [`rn_protocol::DEFAULT_BAUD_RATE`] unless reconfigured.

use std::time::Duration;

use serialport::SerialPortType;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::info;

use crate::error::DeviceError;

/// A serial port a transceiver might be attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Name to pass to [`open_serial`]
    pub port: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub product: Option<String>,
}

impl SerialPortInfo {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            // Only USB adapters report identifiers
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                product: None,
            },
        }
    }

    /// Short human readable description of the port
    pub fn description(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!(
                "{} [{:04X}:{:04X}]",
                self.product.as_deref().unwrap_or("USB serial"),
                vid,
                pid
            ),
            _ => "serial".to_string(),
        }
    }
}

/// Enumerate the serial ports present on this machine
pub fn available_ports() -> Result<Vec<SerialPortInfo>, DeviceError> {
    let ports: Vec<_> = serialport::available_ports()?
        .into_iter()
        .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
        .collect();

    if ports.is_empty() {
        info!("No serial ports found");
    } else {
        info!("Found {} serial port(s)", ports.len());
    }
    Ok(ports)
}

/// Open a serial port configured for the transceiver
pub fn open_serial(port_name: &str, baud_rate: u32) -> Result<SerialStream, DeviceError> {
    let stream = tokio_serial::new(port_name, baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(100))
        .open_native_async()?;

    info!("Opened {} at {} baud", port_name, baud_rate);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_serial_port_info_from_usb() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x04D8,
            pid: 0x000A,
            serial_number: None,
            manufacturer: Some("Microchip".to_string()),
            product: Some("RN2483 PICtail".to_string()),
        });

        let info = SerialPortInfo::from_serialport("/dev/ttyACM0".to_string(), &usb_info);

        assert_eq!(info.vid, Some(0x04D8));
        assert_eq!(info.pid, Some(0x000A));
        assert_eq!(info.description(), "RN2483 PICtail [04D8:000A]");
    }

    #[test]
    fn test_serial_port_info_non_usb() {
        let info =
            SerialPortInfo::from_serialport("/dev/ttyS0".to_string(), &SerialPortType::Unknown);
        assert_eq!(info.vid, None);
        assert_eq!(info.description(), "serial");
    }
}
