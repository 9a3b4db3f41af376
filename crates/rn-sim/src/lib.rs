//! RN2483 Simulation Library
//!
//! This crate provides a simulation layer for exercising RN2483 code without
//! physical transceivers. It includes:
//!
//! - **FakeDevice**: a task speaking the module's line protocol over an
//!   in-memory stream, with inspectable GPIO, NVM and radio state
//! - **Ether**: a simulated radio medium that carries packets between
//!   registered fake devices, with pluggable delay, corruption and loss
//!
//! # Example
//!
//! ```rust
//! use rn_sim::{Ether, EtherConfig, FakeDevice, FakeDeviceConfig};
//! use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ether = Ether::new(EtherConfig::default());
//! let (device, stream) = FakeDevice::spawn(FakeDeviceConfig::default());
//! ether.register_device(&device).await?;
//!
//! // Talk to the fake module directly; normally a driver does this
//! let (reader, mut writer) = tokio::io::split(stream);
//! writer.write_all(b"sys get ver\r\n").await?;
//! let mut lines = BufReader::new(reader).lines();
//! assert_eq!(
//!     lines.next_line().await?.as_deref(),
//!     Some("RN2483 1.0.4 Mar 23 1991 13:37:00")
//! );
//!
//! ether.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ether;
pub mod fake;

pub use error::{EtherError, SimError};
pub use ether::{
    Clock, DeviceId, Endpoint, Ether, EtherConfig, EtherLink, ManualClock, PacketTransform,
    PacketTransformExt, PerfectTransform, RadioMedium, Reception, RegisteredDevice, TokioClock,
    TransformOutcome, WithDelay,
};
pub use fake::{FakeDevice, FakeDeviceConfig};
