//! RN2483 Device Driver
//!
//! This crate drives a Microchip RN2483/RN2903 LoRa transceiver over its
//! line-oriented text protocol. Each call writes one command line, reads the
//! response line(s), and checks them for the module's error tokens. There
//! are no retries; a failed command is reported to the caller as-is.
//!
//! [`Device`] is generic over the transport so the same code drives a real
//! serial port ([`Device::open`]), a [`DebugSerial`] wrapper that logs the
//! traffic, or an in-memory stream connected to a simulated module.
//!
//! # Example
//!
//! ```rust,no_run
//! use rn_device::Device;
//!
//! # async fn run() -> Result<(), rn_device::DeviceError> {
//! let mut device = Device::open("/dev/ttyUSB0", rn_protocol::DEFAULT_BAUD_RATE)?;
//!
//! let version = device.version().await?;
//! println!("{} firmware {}", version.sku.as_str(), version.version_string());
//!
//! device.pause_mac().await?;
//! device.radio_tx(b"hello world!").await?;
//! device.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod debug;
pub mod device;
pub mod error;
pub mod mac;
pub mod radio;
pub mod serial;
pub mod sys;

pub use debug::DebugSerial;
pub use device::Device;
pub use error::DeviceError;
pub use serial::{available_ports, open_serial, SerialPortInfo};
