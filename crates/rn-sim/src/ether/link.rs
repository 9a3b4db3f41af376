//! How endpoints attach to the ether

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use super::actor::Mailbox;
use crate::error::EtherError;

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an endpoint attached to the ether
///
/// Every call to [`DeviceId::new`] yields a distinct identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u64);

impl DeviceId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// A single receive window on the ether
///
/// Resolves to the first packet delivered to the endpoint, or `None` once
/// the window is closed: the endpoint was unregistered, a newer receive
/// replaced this one, or the ether stopped.
#[derive(Debug)]
pub struct Reception {
    rx: oneshot::Receiver<Vec<u8>>,
}

impl From<oneshot::Receiver<Vec<u8>>> for Reception {
    fn from(rx: oneshot::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }
}

impl Future for Reception {
    type Output = Option<Vec<u8>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

/// Transmit and receive hooks installed on an endpoint
///
/// The fake device calls these from its `radio tx` and `radio rx` handlers.
pub trait RadioMedium: Send + Sync {
    fn transmit(&self, sender: DeviceId, payload: Vec<u8>)
        -> BoxFuture<'static, Result<(), EtherError>>;

    fn receive(&self, receiver: DeviceId) -> BoxFuture<'static, Result<Reception, EtherError>>;
}

/// Something that can be attached to the ether
pub trait Endpoint {
    fn id(&self) -> DeviceId;

    /// Install the medium's hooks
    fn attach(&self, medium: Arc<dyn RadioMedium>);
}

/// Snapshot of one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredDevice {
    pub id: DeviceId,
    /// Whether a receive window is currently open
    pub listening: bool,
}

/// Handle routing an endpoint's radio operations into the ether
#[derive(Debug, Clone)]
pub struct EtherLink {
    mailbox: Mailbox,
}

impl EtherLink {
    pub(crate) fn new(mailbox: Mailbox) -> Self {
        Self { mailbox }
    }
}

impl RadioMedium for EtherLink {
    fn transmit(
        &self,
        sender: DeviceId,
        payload: Vec<u8>,
    ) -> BoxFuture<'static, Result<(), EtherError>> {
        let mailbox = self.mailbox.clone();
        async move { mailbox.transmit(sender, payload).await }.boxed()
    }

    fn receive(&self, receiver: DeviceId) -> BoxFuture<'static, Result<Reception, EtherError>> {
        let mailbox = self.mailbox.clone();
        async move { mailbox.receive(receiver).await }.boxed()
    }
}
