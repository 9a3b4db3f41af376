//! Integration tests for the simulated ether
//!
//! These tests verify end-to-end behavior of the medium including:
//! - Fan-out of transmissions to every other registered endpoint
//! - Delivery in arrival order, driven by a manual or paused clock
//! - Requests abandoned by their caller still being applied
//! - Registration errors and unregistering with packets in flight
//! - Shutdown closing every receive window
//! - Fake devices talking to each other through the driver

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rn_device::{Device, DeviceError};
use rn_sim::{
    DeviceId, Endpoint, Ether, EtherConfig, EtherError, FakeDevice, FakeDeviceConfig, ManualClock,
    PacketTransformExt, PerfectTransform, RadioMedium, TransformOutcome,
};
use tokio::io::DuplexStream;
use tokio::time::timeout;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// A bare endpoint; tests drive it through the ether directly
    pub struct Station {
        pub id: DeviceId,
    }

    impl Station {
        pub fn new() -> Self {
            Self { id: DeviceId::new() }
        }
    }

    impl Endpoint for Station {
        fn id(&self) -> DeviceId {
            self.id
        }

        fn attach(&self, _medium: Arc<dyn RadioMedium>) {}
    }

    /// Register `count` stations
    pub async fn stations(ether: &Ether, count: usize) -> Vec<DeviceId> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let station = Station::new();
            ether.register_device(&station).await.unwrap();
            ids.push(station.id);
        }
        ids
    }

    /// Ether on a manual clock, delaying every packet by `delay`
    pub fn manual_ether(delay: Duration) -> (Ether, ManualClock) {
        let clock = ManualClock::new();
        let ether = Ether::new(
            EtherConfig::default()
                .with_name("manual")
                .with_clock(clock.clone())
                .with_transform(PerfectTransform.with_delay(delay)),
        );
        (ether, clock)
    }

    /// Wait until `id` has a receive window open
    pub async fn wait_until_listening(ether: &Ether, id: DeviceId) {
        loop {
            let devices = ether.registered_devices().await.unwrap();
            if devices.iter().any(|d| d.id == id && d.listening) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    /// A fake device on the ether, with a driver connected to it
    pub struct Node {
        pub fake: FakeDevice,
        pub device: Device<DuplexStream>,
    }

    pub async fn node(ether: &Ether) -> Node {
        let (fake, stream) = FakeDevice::spawn(FakeDeviceConfig::default());
        ether.register_device(&fake).await.unwrap();
        let mut device = Device::new(stream);
        device.pause_mac().await.unwrap();
        Node { fake, device }
    }

    /// Listen in the background for a single packet
    pub fn spawn_rx(
        mut device: Device<DuplexStream>,
        window: u16,
    ) -> tokio::task::JoinHandle<(Device<DuplexStream>, Result<Vec<u8>, DeviceError>)> {
        tokio::spawn(async move {
            let result = device.radio_rx(window).await;
            (device, result)
        })
    }
}

use helpers::*;

const WAIT: Duration = Duration::from_secs(1);

// ============================================================================
// Fan-out
// ============================================================================

mod fan_out_tests {
    use super::*;

    #[tokio::test]
    async fn every_other_endpoint_receives_each_payload_once() {
        let ether = Ether::new(EtherConfig::default());
        let ids = stations(&ether, 3).await;
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let mut a_window = ether.receive(a).await.unwrap();

        for payload in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
            let b_window = ether.receive(b).await.unwrap();
            let c_window = ether.receive(c).await.unwrap();

            ether.transmit(a, payload.clone()).await.unwrap();

            assert_eq!(timeout(WAIT, b_window).await.unwrap(), Some(payload.clone()));
            assert_eq!(timeout(WAIT, c_window).await.unwrap(), Some(payload));
        }

        // No duplicates, and nothing echoed back to the sender
        let b_window = ether.receive(b).await.unwrap();
        assert!(timeout(Duration::from_millis(20), b_window).await.is_err());
        assert!((&mut a_window).now_or_never().is_none());

        ether.close().await.unwrap();
        assert_eq!(a_window.await, None);
    }

    #[tokio::test]
    async fn transform_can_drop_and_corrupt() {
        let (a, b, c) = (Station::new(), Station::new(), Station::new());
        let deaf = c.id;
        let ether = Ether::new(
            EtherConfig::default().with_transform(
                PerfectTransform
                    .filter(move |_, receiver, _| receiver != deaf)
                    .map_packet(|mut packet| {
                        packet[0] ^= 0xFF;
                        packet
                    }),
            ),
        );
        for station in [&a, &b, &c] {
            ether.register_device(station).await.unwrap();
        }

        let b_window = ether.receive(b.id).await.unwrap();
        let c_window = ether.receive(c.id).await.unwrap();
        ether.transmit(a.id, vec![0x0F, 0x01]).await.unwrap();

        assert_eq!(timeout(WAIT, b_window).await.unwrap(), Some(vec![0xF0, 0x01]));
        assert!(timeout(Duration::from_millis(20), c_window).await.is_err());

        ether.close().await.unwrap();
    }
}

// ============================================================================
// Ordering and time
// ============================================================================

mod timing_tests {
    use super::*;

    #[tokio::test]
    async fn deliveries_follow_arrival_order() {
        let clock = ManualClock::new();
        let ether = Ether::new(
            EtherConfig::default()
                .with_clock(clock.clone())
                .with_transform(|_: DeviceId, _: DeviceId, packet: &[u8]| {
                    Some(TransformOutcome::new(
                        packet.to_vec(),
                        Duration::from_millis(u64::from(packet[0])),
                    ))
                }),
        );
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);

        for flight_ms in [30u8, 10, 20] {
            ether.transmit(a, vec![flight_ms]).await.unwrap();
        }

        for expected in [10u8, 20, 30] {
            let mut window = ether.receive(b).await.unwrap();
            clock.advance(Duration::from_millis(9));
            assert!(timeout(Duration::from_millis(20), &mut window).await.is_err());
            clock.advance(Duration::from_millis(1));
            assert_eq!(timeout(WAIT, window).await.unwrap(), Some(vec![expected]));
        }

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn manual_clock_delivers_exactly_at_flight_time() {
        let (ether, clock) = manual_ether(Duration::from_millis(50));
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);

        let mut window = ether.receive(b).await.unwrap();
        ether.transmit(a, b"ping".to_vec()).await.unwrap();

        clock.advance(Duration::from_millis(49));
        assert!(timeout(Duration::from_millis(20), &mut window).await.is_err());

        clock.advance(Duration::from_millis(1));
        assert_eq!(timeout(WAIT, window).await.unwrap(), Some(b"ping".to_vec()));

        ether.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let ether = Ether::new(
            EtherConfig::default().with_transform(PerfectTransform.with_delay(Duration::from_secs(3))),
        );
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);

        let window = ether.receive(b).await.unwrap();
        let start = tokio::time::Instant::now();
        ether.transmit(a, b"slow".to_vec()).await.unwrap();

        assert_eq!(window.await, Some(b"slow".to_vec()));
        assert!(start.elapsed() >= Duration::from_secs(3));

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn window_opened_after_arrival_misses_the_packet() {
        let (ether, clock) = manual_ether(Duration::from_millis(50));
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);

        ether.transmit(a, b"early".to_vec()).await.unwrap();
        clock.advance(Duration::from_millis(50));

        let window = ether.receive(b).await.unwrap();
        assert!(timeout(Duration::from_millis(20), window).await.is_err());

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_flight_time_never_arrives() {
        let ether = Ether::new(EtherConfig::default().with_transform(
            |_: DeviceId, _: DeviceId, packet: &[u8]| {
                let flight_time = if packet == b"forever" {
                    Duration::MAX
                } else {
                    Duration::ZERO
                };
                Some(TransformOutcome::new(packet.to_vec(), flight_time))
            },
        ));
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);

        let window = ether.receive(b).await.unwrap();
        ether.transmit(a, b"forever".to_vec()).await.unwrap();
        ether.transmit(a, b"now".to_vec()).await.unwrap();

        // The ether keeps serving requests and delivering packets
        assert_eq!(timeout(WAIT, window).await.unwrap(), Some(b"now".to_vec()));
        assert_eq!(ether.registered_devices().await.unwrap().len(), 2);

        ether.close().await.unwrap();
    }
}

// ============================================================================
// Cancellation
// ============================================================================

mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn abandoned_transmit_is_still_applied() {
        let ether = Ether::new(EtherConfig::default());
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);
        let window = ether.receive(b).await.unwrap();

        // Queue the request, then stop waiting for the reply
        let mut transmit = Box::pin(ether.transmit(a, b"abandoned".to_vec()));
        assert!(transmit.as_mut().now_or_never().is_none());
        drop(transmit);

        assert_eq!(timeout(WAIT, window).await.unwrap(), Some(b"abandoned".to_vec()));
        assert_eq!(ether.registered_devices().await.unwrap().len(), 2);

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn abandoned_receive_leaves_the_ether_serving() {
        let ether = Ether::new(EtherConfig::default());
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);

        let mut receive = Box::pin(ether.receive(b));
        assert!(receive.as_mut().now_or_never().is_none());
        drop(receive);

        let window = ether.receive(b).await.unwrap();
        ether.transmit(a, b"y".to_vec()).await.unwrap();
        assert_eq!(timeout(WAIT, window).await.unwrap(), Some(b"y".to_vec()));

        ether.close().await.unwrap();
    }
}

// ============================================================================
// Registration
// ============================================================================

mod registration_tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_endpoints_are_rejected() {
        let ether = Ether::new(EtherConfig::default());
        let stranger = DeviceId::new();

        assert!(matches!(
            ether.transmit(stranger, b"x".to_vec()).await,
            Err(EtherError::DeviceNotRegistered(id)) if id == stranger
        ));
        assert!(matches!(
            ether.receive(stranger).await,
            Err(EtherError::DeviceNotRegistered(id)) if id == stranger
        ));

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn double_registration_is_an_error() {
        let ether = Ether::new(EtherConfig::default());
        let (fake, _stream) = FakeDevice::spawn(FakeDeviceConfig::default());

        ether.register_device(&fake).await.unwrap();
        assert!(matches!(
            ether.register_device(&fake).await,
            Err(EtherError::DeviceAlreadyRegistered(id)) if id == fake.id()
        ));
        assert_eq!(ether.registered_devices().await.unwrap().len(), 1);

        // Unknown devices are ignored
        ether.unregister_device(DeviceId::new()).await.unwrap();

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn unregistering_closes_window_and_drops_in_flight() {
        let (ether, clock) = manual_ether(Duration::from_millis(50));
        let ids = stations(&ether, 2).await;
        let (a, b) = (ids[0], ids[1]);

        let window = ether.receive(b).await.unwrap();
        ether.transmit(a, b"too late".to_vec()).await.unwrap();
        ether.unregister_device(b).await.unwrap();

        assert_eq!(timeout(WAIT, window).await.unwrap(), None);

        clock.advance(Duration::from_millis(50));
        let devices = ether.registered_devices().await.unwrap();
        assert_eq!(devices.iter().map(|d| d.id).collect::<Vec<_>>(), vec![a]);
        assert!(matches!(
            ether.receive(b).await,
            Err(EtherError::DeviceNotRegistered(_))
        ));

        ether.close().await.unwrap();
    }
}

// ============================================================================
// Shutdown
// ============================================================================

mod shutdown_tests {
    use super::*;

    #[tokio::test]
    async fn close_closes_every_window_and_stops_the_actor() {
        let ether = Ether::new(EtherConfig::default());
        let ids = stations(&ether, 2).await;
        let link = ether.link();

        let a_window = ether.receive(ids[0]).await.unwrap();
        let b_window = ether.receive(ids[1]).await.unwrap();

        ether.close().await.unwrap();

        assert_eq!(timeout(WAIT, a_window).await.unwrap(), None);
        assert_eq!(timeout(WAIT, b_window).await.unwrap(), None);
        assert!(matches!(
            link.transmit(ids[0], b"x".to_vec()).await,
            Err(EtherError::Stopped {
                operation: "transmit"
            })
        ));
    }
}

// ============================================================================
// Fake devices over the ether
// ============================================================================

mod device_tests {
    use super::*;

    #[tokio::test]
    async fn hello_world_reaches_the_other_device() {
        let ether = Ether::new(EtherConfig::default());
        let mut a = node(&ether).await;
        let b = node(&ether).await;
        let b_id = b.fake.id();

        let rx = spawn_rx(b.device, rn_protocol::CONTINUOUS_RECEIVE_MODE);
        wait_until_listening(&ether, b_id).await;

        a.device.radio_tx(b"hello world!").await.unwrap();

        let (_device, received) = timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(received.unwrap(), b"hello world!");

        // The sender hears nothing of its own transmission
        assert!(matches!(
            a.device.radio_rx(50).await,
            Err(DeviceError::ReceiveTimeout)
        ));

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn delayed_packet_waits_for_virtual_time() {
        let (ether, clock) = manual_ether(Duration::from_millis(50));
        let mut a = node(&ether).await;
        let b = node(&ether).await;
        let b_id = b.fake.id();

        let rx = spawn_rx(b.device, rn_protocol::CONTINUOUS_RECEIVE_MODE);
        wait_until_listening(&ether, b_id).await;

        a.device.radio_tx(b"hello world!").await.unwrap();

        clock.advance(Duration::from_millis(49));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!rx.is_finished());

        clock.advance(Duration::from_millis(1));
        let (_device, received) = timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(received.unwrap(), b"hello world!");

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn unregistered_device_fails_to_transmit() {
        let ether = Ether::new(EtherConfig::default());
        let mut a = node(&ether).await;
        ether.unregister_device(a.fake.id()).await.unwrap();

        // The hooks stay installed but the ether no longer knows the device
        assert!(a.fake.has_medium());
        assert!(matches!(
            a.device.radio_tx(b"anyone?").await,
            Err(DeviceError::TransmitFailed)
        ));

        ether.close().await.unwrap();
    }

    #[tokio::test]
    async fn closing_the_ether_ends_pending_receives() {
        let ether = Ether::new(EtherConfig::default());
        let b = node(&ether).await;
        let b_id = b.fake.id();

        let rx = spawn_rx(b.device, rn_protocol::CONTINUOUS_RECEIVE_MODE);
        wait_until_listening(&ether, b_id).await;
        ether.close().await.unwrap();

        let (device, received) = timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(matches!(received, Err(DeviceError::ReceiveTimeout)));

        drop(device);
        b.fake.wait().await.unwrap();
    }
}
