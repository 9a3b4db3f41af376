//! Ether actor
//!
//! The actor is the only owner of the device registry and the in-flight
//! queue. Every mutation reaches it as an [`EtherRequest`] carrying a
//! one-shot reply channel, so requests are applied one at a time in the order
//! they were received.
//!
//! # Architecture
//!
//! Each loop iteration waits for the first of:
//! - the clock reaching the arrival time of the earliest packet in flight,
//!   armed only while something is in flight
//! - a request from a caller (stop, register, transmit, ...)
//!
//! When both are ready the delivery is handled first. Deliveries never
//! block: a packet whose receiver has no open receive window is dropped.
//!
//! A caller that gives up waiting does not cancel its request. Once queued,
//! the request is applied and its reply is discarded.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::clock::Clock;
use super::link::{DeviceId, Reception, RegisteredDevice};
use super::queue::{InFlightPacket, InFlightQueue};
use super::transform::PacketTransform;
use crate::error::EtherError;

/// Requests handled by the ether actor
#[derive(Debug)]
pub(crate) enum EtherRequest {
    /// Attach an endpoint
    Register {
        id: DeviceId,
        reply: oneshot::Sender<Result<(), EtherError>>,
    },

    /// Detach an endpoint, closing any open receive window
    Unregister {
        id: DeviceId,
        reply: oneshot::Sender<()>,
    },

    /// Schedule a packet for every other registered endpoint
    Transmit {
        sender: DeviceId,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<(), EtherError>>,
    },

    /// Open a receive window
    Receive {
        receiver: DeviceId,
        reply: oneshot::Sender<Result<Reception, EtherError>>,
    },

    /// Snapshot the registry
    ListDevices {
        reply: oneshot::Sender<Vec<RegisteredDevice>>,
    },

    /// Shut the actor down
    Stop { reply: oneshot::Sender<()> },
}

/// Sending half of the actor's request channel
#[derive(Debug, Clone)]
pub(crate) struct Mailbox {
    tx: mpsc::Sender<EtherRequest>,
}

impl Mailbox {
    pub fn new(tx: mpsc::Sender<EtherRequest>) -> Self {
        Self { tx }
    }

    async fn request<R>(
        &self,
        operation: &'static str,
        make: impl FnOnce(oneshot::Sender<R>) -> EtherRequest,
    ) -> Result<R, EtherError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| EtherError::Stopped { operation })?;
        response.await.map_err(|_| EtherError::Stopped { operation })
    }

    pub async fn register(&self, id: DeviceId) -> Result<(), EtherError> {
        self.request("register", |reply| EtherRequest::Register { id, reply })
            .await?
    }

    pub async fn unregister(&self, id: DeviceId) -> Result<(), EtherError> {
        self.request("unregister", |reply| EtherRequest::Unregister { id, reply })
            .await
    }

    pub async fn transmit(&self, sender: DeviceId, payload: Vec<u8>) -> Result<(), EtherError> {
        self.request("transmit", |reply| EtherRequest::Transmit {
            sender,
            payload,
            reply,
        })
        .await?
    }

    pub async fn receive(&self, receiver: DeviceId) -> Result<Reception, EtherError> {
        self.request("receive", |reply| EtherRequest::Receive { receiver, reply })
            .await?
    }

    pub async fn list_devices(&self) -> Result<Vec<RegisteredDevice>, EtherError> {
        self.request("list devices", |reply| EtherRequest::ListDevices { reply })
            .await
    }

    pub async fn stop(&self) -> Result<(), EtherError> {
        self.request("stop", |reply| EtherRequest::Stop { reply })
            .await
    }
}

/// A registered endpoint
#[derive(Debug, Default)]
struct Registration {
    /// The open receive window, if any
    listener: Option<oneshot::Sender<Vec<u8>>>,
}

impl Registration {
    fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_closed())
    }
}

/// State owned by the actor task
pub(crate) struct EtherActor {
    clock: Arc<dyn Clock>,
    transform: Arc<dyn PacketTransform>,
    registry: BTreeMap<DeviceId, Registration>,
    in_flight: InFlightQueue,
}

impl EtherActor {
    pub fn new(clock: Arc<dyn Clock>, transform: Arc<dyn PacketTransform>) -> Self {
        Self {
            clock,
            transform,
            registry: BTreeMap::new(),
            in_flight: InFlightQueue::new(),
        }
    }

    /// Run until stopped or until every request sender is dropped
    pub async fn run(mut self, mut requests: mpsc::Receiver<EtherRequest>) {
        info!("Ether actor started");
        let mut stop_reply = None;

        loop {
            let wake: BoxFuture<'static, ()> = match self.in_flight.peek() {
                Some(next) => self.clock.sleep_until(next.arrival),
                None => future::pending().boxed(),
            };

            tokio::select! {
                biased;

                () = wake => self.deliver_next(),

                request = requests.recv() => match request {
                    Some(request) => {
                        if let Some(reply) = self.handle(request) {
                            stop_reply = Some(reply);
                            break;
                        }
                    }
                    None => {
                        debug!("All ether handles dropped");
                        break;
                    }
                },
            }
        }

        self.shutdown();
        if let Some(reply) = stop_reply {
            let _ = reply.send(());
        }
        info!("Ether actor stopped");
    }

    /// Apply one request, returning the reply channel of a stop request
    fn handle(&mut self, request: EtherRequest) -> Option<oneshot::Sender<()>> {
        match request {
            EtherRequest::Register { id, reply } => {
                let _ = reply.send(self.register(id));
            }

            EtherRequest::Unregister { id, reply } => {
                self.unregister(id);
                let _ = reply.send(());
            }

            EtherRequest::Transmit {
                sender,
                payload,
                reply,
            } => {
                let _ = reply.send(self.transmit(sender, &payload));
            }

            EtherRequest::Receive { receiver, reply } => {
                let _ = reply.send(self.receive(receiver));
            }

            EtherRequest::ListDevices { reply } => {
                let devices = self
                    .registry
                    .iter()
                    .map(|(id, registration)| RegisteredDevice {
                        id: *id,
                        listening: registration.is_listening(),
                    })
                    .collect();
                let _ = reply.send(devices);
            }

            EtherRequest::Stop { reply } => return Some(reply),
        }
        None
    }

    fn register(&mut self, id: DeviceId) -> Result<(), EtherError> {
        if self.registry.contains_key(&id) {
            warn!("{} is already registered", id);
            return Err(EtherError::DeviceAlreadyRegistered(id));
        }

        self.registry.insert(id, Registration::default());
        info!("Registered {} ({} attached)", id, self.registry.len());
        Ok(())
    }

    fn unregister(&mut self, id: DeviceId) {
        // Dropping the registration closes its receive window
        if self.registry.remove(&id).is_some() {
            info!("Unregistered {} ({} attached)", id, self.registry.len());
        } else {
            debug!("Ignoring unregister of unknown {}", id);
        }
    }

    fn transmit(&mut self, sender: DeviceId, payload: &[u8]) -> Result<(), EtherError> {
        if !self.registry.contains_key(&sender) {
            return Err(EtherError::DeviceNotRegistered(sender));
        }

        let now = self.clock.now();
        debug!("{} transmitting {} bytes", sender, payload.len());

        for &receiver in self.registry.keys().filter(|&&id| id != sender) {
            let Some(outcome) = self.transform.apply(sender, receiver, payload) else {
                trace!("Transform suppressed {} -> {}", sender, receiver);
                continue;
            };

            let Some(arrival) = now.checked_add(outcome.flight_time) else {
                warn!(
                    "Flight time {:?} for {} -> {} never elapses; dropping packet",
                    outcome.flight_time, sender, receiver
                );
                continue;
            };

            trace!(
                "Scheduling {} -> {} with flight time {:?}",
                sender,
                receiver,
                outcome.flight_time
            );
            self.in_flight.push(InFlightPacket {
                payload: outcome.packet,
                destination: receiver,
                arrival,
            });
        }

        Ok(())
    }

    fn receive(&mut self, receiver: DeviceId) -> Result<Reception, EtherError> {
        let registration = self
            .registry
            .get_mut(&receiver)
            .ok_or(EtherError::DeviceNotRegistered(receiver))?;

        let (listener, rx) = oneshot::channel();
        if registration.listener.replace(listener).is_some() {
            debug!("{} reopened its receive window", receiver);
        }
        debug!("{} listening", receiver);
        Ok(Reception::from(rx))
    }

    /// Hand the earliest packet to its receiver, if it is listening
    fn deliver_next(&mut self) {
        let Some(packet) = self.in_flight.pop() else {
            return;
        };

        let Some(registration) = self.registry.get_mut(&packet.destination) else {
            trace!("Dropping packet for unregistered {}", packet.destination);
            return;
        };

        let Some(listener) = registration.listener.take() else {
            trace!("{} not listening; dropping packet", packet.destination);
            return;
        };

        let length = packet.payload.len();
        match listener.send(packet.payload) {
            Ok(()) => debug!("Delivered {} bytes to {}", length, packet.destination),
            Err(_) => trace!(
                "{} closed its receive window; dropping packet",
                packet.destination
            ),
        }
    }

    fn shutdown(&mut self) {
        if !self.in_flight.is_empty() {
            debug!("Discarding {} packet(s) in flight", self.in_flight.len());
        }
        self.in_flight.clear();
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ether::clock::ManualClock;
    use crate::ether::transform::{PacketTransformExt, PerfectTransform, TransformOutcome};
    use std::time::Duration;

    fn actor(clock: &ManualClock, delay: Duration) -> EtherActor {
        EtherActor::new(
            Arc::new(clock.clone()),
            Arc::new(PerfectTransform.with_delay(delay)),
        )
    }

    #[test]
    fn test_transmit_skips_sender() {
        let clock = ManualClock::new();
        let mut actor = actor(&clock, Duration::ZERO);
        let (a, b, c) = (DeviceId::new(), DeviceId::new(), DeviceId::new());
        for id in [a, b, c] {
            actor.register(id).unwrap();
        }

        actor.transmit(b, b"x").unwrap();

        let destinations: Vec<DeviceId> = std::iter::from_fn(|| actor.in_flight.pop())
            .map(|p| p.destination)
            .collect();
        assert_eq!(destinations, vec![a, c]);
    }

    #[test]
    fn test_unknown_devices_are_rejected() {
        let clock = ManualClock::new();
        let mut actor = actor(&clock, Duration::ZERO);
        let stranger = DeviceId::new();

        assert!(matches!(
            actor.transmit(stranger, b"x"),
            Err(EtherError::DeviceNotRegistered(id)) if id == stranger
        ));
        assert!(matches!(
            actor.receive(stranger),
            Err(EtherError::DeviceNotRegistered(id)) if id == stranger
        ));
    }

    #[test]
    fn test_double_register_keeps_window() {
        let clock = ManualClock::new();
        let mut actor = actor(&clock, Duration::ZERO);
        let (a, b) = (DeviceId::new(), DeviceId::new());
        actor.register(a).unwrap();
        actor.register(b).unwrap();
        let reception = actor.receive(b).unwrap();

        assert!(matches!(
            actor.register(b),
            Err(EtherError::DeviceAlreadyRegistered(id)) if id == b
        ));

        actor.transmit(a, b"still here").unwrap();
        actor.deliver_next();
        assert_eq!(reception.now_or_never(), Some(Some(b"still here".to_vec())));
    }

    #[test]
    fn test_newer_receive_closes_older() {
        let clock = ManualClock::new();
        let mut actor = actor(&clock, Duration::ZERO);
        let (a, b) = (DeviceId::new(), DeviceId::new());
        actor.register(a).unwrap();
        actor.register(b).unwrap();

        let first = actor.receive(b).unwrap();
        let second = actor.receive(b).unwrap();
        assert_eq!(first.now_or_never(), Some(None));

        actor.transmit(a, b"hi").unwrap();
        actor.deliver_next();
        assert_eq!(second.now_or_never(), Some(Some(b"hi".to_vec())));
    }

    #[test]
    fn test_arrival_uses_clock() {
        let clock = ManualClock::new();
        let start = clock.now();
        let mut actor = actor(&clock, Duration::from_millis(50));
        let (a, b) = (DeviceId::new(), DeviceId::new());
        actor.register(a).unwrap();
        actor.register(b).unwrap();

        clock.advance(Duration::from_millis(10));
        actor.transmit(a, b"x").unwrap();

        assert_eq!(
            actor.in_flight.peek().map(|p| p.arrival),
            Some(start + Duration::from_millis(60))
        );
    }

    #[test]
    fn test_unbounded_flight_time_is_dropped() {
        let clock = ManualClock::new();
        let forever = |_: DeviceId, _: DeviceId, packet: &[u8]| {
            Some(TransformOutcome::new(packet.to_vec(), Duration::MAX))
        };
        let mut actor = EtherActor::new(Arc::new(clock.clone()), Arc::new(forever));
        let (a, b) = (DeviceId::new(), DeviceId::new());
        actor.register(a).unwrap();
        actor.register(b).unwrap();

        actor.transmit(a, b"x").unwrap();
        assert!(actor.in_flight.is_empty());
    }

    #[test]
    fn test_stop_hands_back_its_reply() {
        let clock = ManualClock::new();
        let mut actor = actor(&clock, Duration::ZERO);
        let (reply, _response) = oneshot::channel();
        assert!(actor.handle(EtherRequest::Stop { reply }).is_some());

        let (reply, _response) = oneshot::channel();
        assert!(actor.handle(EtherRequest::ListDevices { reply }).is_none());
    }

    #[test]
    fn test_delivery_without_listener_drops() {
        let clock = ManualClock::new();
        let mut actor = actor(&clock, Duration::ZERO);
        let (a, b) = (DeviceId::new(), DeviceId::new());
        actor.register(a).unwrap();
        actor.register(b).unwrap();

        actor.transmit(a, b"lost").unwrap();
        actor.deliver_next();
        assert!(actor.in_flight.is_empty());

        // A window opened afterwards does not see the dropped packet
        let reception = actor.receive(b).unwrap();
        actor.deliver_next();
        assert!(reception.now_or_never().is_none());
    }
}
