//! Packet transforms
//!
//! A transform decides, for each (sender, receiver) pair, whether a
//! transmitted packet arrives, what arrives, and how long it takes. Custom
//! transforms model the medium more closely: adding delay, corrupting the
//! received packet, or preventing receipt entirely.

use std::time::Duration;

use super::link::DeviceId;

/// A packet that will be delivered to a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome {
    /// What the receiver will see
    pub packet: Vec<u8>,
    /// Time between transmission and arrival; zero is allowed, and a time
    /// the clock cannot reach means the packet never arrives
    pub flight_time: Duration,
}

impl TransformOutcome {
    pub fn new(packet: Vec<u8>, flight_time: Duration) -> Self {
        Self {
            packet,
            flight_time,
        }
    }
}

/// Maps a transmission to an optional delivery
///
/// Returning `None` suppresses delivery to `receiver`. Closures of the
/// matching signature are transforms too.
pub trait PacketTransform: Send + Sync {
    fn apply(&self, sender: DeviceId, receiver: DeviceId, packet: &[u8])
        -> Option<TransformOutcome>;
}

impl<F> PacketTransform for F
where
    F: Fn(DeviceId, DeviceId, &[u8]) -> Option<TransformOutcome> + Send + Sync,
{
    fn apply(
        &self,
        sender: DeviceId,
        receiver: DeviceId,
        packet: &[u8],
    ) -> Option<TransformOutcome> {
        self(sender, receiver, packet)
    }
}

/// Delivers every packet unchanged with no delay
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfectTransform;

impl PacketTransform for PerfectTransform {
    fn apply(&self, _: DeviceId, _: DeviceId, packet: &[u8]) -> Option<TransformOutcome> {
        Some(TransformOutcome::new(packet.to_vec(), Duration::ZERO))
    }
}

/// Adds a fixed delay to whatever the inner transform delivers
#[derive(Debug, Clone)]
pub struct WithDelay<T> {
    inner: T,
    delay: Duration,
}

impl<T> WithDelay<T> {
    pub fn new(inner: T, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<T: PacketTransform> PacketTransform for WithDelay<T> {
    fn apply(
        &self,
        sender: DeviceId,
        receiver: DeviceId,
        packet: &[u8],
    ) -> Option<TransformOutcome> {
        self.inner
            .apply(sender, receiver, packet)
            .map(|mut outcome| {
                outcome.flight_time = outcome.flight_time.saturating_add(self.delay);
                outcome
            })
    }
}

/// Suppresses deliveries the predicate rejects
#[derive(Debug, Clone)]
pub struct Filter<T, P> {
    inner: T,
    predicate: P,
}

impl<T, P> PacketTransform for Filter<T, P>
where
    T: PacketTransform,
    P: Fn(DeviceId, DeviceId, &[u8]) -> bool + Send + Sync,
{
    fn apply(
        &self,
        sender: DeviceId,
        receiver: DeviceId,
        packet: &[u8],
    ) -> Option<TransformOutcome> {
        if (self.predicate)(sender, receiver, packet) {
            self.inner.apply(sender, receiver, packet)
        } else {
            None
        }
    }
}

/// Rewrites the delivered packet, e.g. to corrupt it
#[derive(Debug, Clone)]
pub struct MapPacket<T, M> {
    inner: T,
    map: M,
}

impl<T, M> PacketTransform for MapPacket<T, M>
where
    T: PacketTransform,
    M: Fn(Vec<u8>) -> Vec<u8> + Send + Sync,
{
    fn apply(
        &self,
        sender: DeviceId,
        receiver: DeviceId,
        packet: &[u8],
    ) -> Option<TransformOutcome> {
        self.inner
            .apply(sender, receiver, packet)
            .map(|outcome| TransformOutcome::new((self.map)(outcome.packet), outcome.flight_time))
    }
}

/// Combinators for composing transforms
pub trait PacketTransformExt: PacketTransform + Sized {
    fn with_delay(self, delay: Duration) -> WithDelay<Self> {
        WithDelay::new(self, delay)
    }

    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        P: Fn(DeviceId, DeviceId, &[u8]) -> bool + Send + Sync,
    {
        Filter {
            inner: self,
            predicate,
        }
    }

    fn map_packet<M>(self, map: M) -> MapPacket<Self, M>
    where
        M: Fn(Vec<u8>) -> Vec<u8> + Send + Sync,
    {
        MapPacket { inner: self, map }
    }
}

impl<T: PacketTransform> PacketTransformExt for T {}
