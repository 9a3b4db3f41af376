//! Simulated radio medium
//!
//! The [`Ether`] lets several fake transceivers exchange packets as if over
//! the air. Each transmission is passed through a [`PacketTransform`] once
//! per receiver, which decides whether the packet arrives, what arrives and
//! after how long. Deliveries are scheduled on a [`Clock`] and handed over in
//! arrival order to receivers that currently have a receive window open.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rn_sim::{Ether, EtherConfig, FakeDevice, FakeDeviceConfig, PacketTransformExt, PerfectTransform};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), rn_sim::EtherError> {
//! let ether = Ether::new(
//!     EtherConfig::default()
//!         .with_transform(PerfectTransform.with_delay(Duration::from_millis(5))),
//! );
//!
//! let (device, _stream) = FakeDevice::spawn(FakeDeviceConfig::default());
//! ether.register_device(&device).await?;
//! assert_eq!(ether.registered_devices().await?.len(), 1);
//!
//! ether.close().await
//! # }
//! ```

mod actor;
pub mod clock;
mod link;
mod queue;
pub mod transform;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

pub use clock::{Clock, ManualClock, TokioClock};
pub use link::{DeviceId, Endpoint, EtherLink, RadioMedium, Reception, RegisteredDevice};
pub use transform::{
    PacketTransform, PacketTransformExt, PerfectTransform, TransformOutcome, WithDelay,
};

use crate::error::EtherError;
use actor::{EtherActor, Mailbox};

/// Default capacity of the actor's request channel
pub const DEFAULT_REQUEST_BUFFER: usize = 64;

/// Configuration for an [`Ether`]
#[derive(Clone)]
pub struct EtherConfig {
    /// Name recorded on the actor's tracing span
    pub name: String,
    /// Source of time for scheduling deliveries
    pub clock: Arc<dyn Clock>,
    /// Policy applied to every (sender, receiver) pair
    pub transform: Arc<dyn PacketTransform>,
    /// Capacity of the request channel
    pub request_buffer: usize,
}

impl Default for EtherConfig {
    fn default() -> Self {
        Self {
            name: "ether".to_string(),
            clock: Arc::new(TokioClock),
            transform: Arc::new(PerfectTransform),
            request_buffer: DEFAULT_REQUEST_BUFFER,
        }
    }
}

impl EtherConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_transform(mut self, transform: impl PacketTransform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    pub fn with_request_buffer(mut self, request_buffer: usize) -> Self {
        self.request_buffer = request_buffer;
        self
    }
}

impl std::fmt::Debug for EtherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtherConfig")
            .field("name", &self.name)
            .field("request_buffer", &self.request_buffer)
            .finish_non_exhaustive()
    }
}

/// A simulated transmission medium shared by registered endpoints
///
/// Must be created inside a tokio runtime; the actor runs as a spawned task
/// until [`Ether::close`] is called, or until the `Ether` and every
/// [`EtherLink`] handed to endpoints have been dropped.
pub struct Ether {
    name: String,
    mailbox: Mailbox,
    task: JoinHandle<()>,
}

impl Ether {
    pub fn new(config: EtherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.request_buffer.max(1));
        let span = info_span!("ether", name = %config.name);
        let actor = EtherActor::new(config.clock, config.transform);
        let task = tokio::spawn(actor.run(rx).instrument(span));

        Self {
            name: config.name,
            mailbox: Mailbox::new(tx),
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle routing radio operations into this ether
    pub fn link(&self) -> EtherLink {
        EtherLink::new(self.mailbox.clone())
    }

    /// Attach an endpoint and install this ether's hooks on it
    pub async fn register_device<E>(&self, endpoint: &E) -> Result<(), EtherError>
    where
        E: Endpoint + ?Sized,
    {
        self.mailbox.register(endpoint.id()).await?;
        endpoint.attach(Arc::new(self.link()));
        Ok(())
    }

    /// Detach an endpoint, closing any receive window it has open
    ///
    /// Unknown endpoints are ignored.
    pub async fn unregister_device(&self, id: DeviceId) -> Result<(), EtherError> {
        self.mailbox.unregister(id).await
    }

    /// Send `payload` from `sender` to every other registered endpoint
    pub async fn transmit(&self, sender: DeviceId, payload: Vec<u8>) -> Result<(), EtherError> {
        self.mailbox.transmit(sender, payload).await
    }

    /// Open a receive window for `receiver`
    pub async fn receive(&self, receiver: DeviceId) -> Result<Reception, EtherError> {
        self.mailbox.receive(receiver).await
    }

    /// The endpoints currently attached, in identity order
    pub async fn registered_devices(&self) -> Result<Vec<RegisteredDevice>, EtherError> {
        self.mailbox.list_devices().await
    }

    /// Unregister every endpoint, stop the actor and wait for it to exit
    pub async fn close(self) -> Result<(), EtherError> {
        let mut errors = Vec::new();

        match self.mailbox.list_devices().await {
            Ok(devices) => {
                for device in devices {
                    if let Err(e) = self.mailbox.unregister(device.id).await {
                        errors.push(e);
                    }
                }
            }
            Err(e) => errors.push(e),
        }

        if let Err(e) = self.mailbox.stop().await {
            errors.push(e);
        }

        if let Err(e) = self.task.await {
            errors.push(EtherError::Task(e));
        }

        if errors.is_empty() {
            info!("Ether {} closed", self.name);
        } else {
            warn!("Ether {} closed with {} error(s)", self.name, errors.len());
        }
        EtherError::combine(errors)
    }
}
