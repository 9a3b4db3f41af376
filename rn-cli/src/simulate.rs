//! In-process simulation: fake transceivers taking turns to transmit over a
//! simulated ether while every other device listens

use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use rn_device::{DebugSerial, Device};
use rn_protocol::CONTINUOUS_RECEIVE_MODE;
use rn_sim::{
    Ether, EtherConfig, FakeDevice, FakeDeviceConfig, PacketTransformExt, PerfectTransform,
};
use tokio::io::DuplexStream;
use tracing::{debug, info};

/// Parameters of a simulation run
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub devices: usize,
    pub delay: Duration,
    pub packets: usize,
}

/// Outcome of a simulation run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub transmissions: usize,
    pub deliveries: usize,
}

struct Node {
    fake: FakeDevice,
    device: Device<DebugSerial<DuplexStream>>,
}

pub async fn simulate(config: &SimulationConfig) -> Result<SimulationReport> {
    anyhow::ensure!(config.devices >= 2, "a simulation needs at least two devices");

    let ether = Ether::new(
        EtherConfig::default()
            .with_name("simulate")
            .with_transform(PerfectTransform.with_delay(config.delay)),
    );

    let mut nodes = Vec::with_capacity(config.devices);
    for _ in 0..config.devices {
        let (fake, stream) = FakeDevice::spawn(FakeDeviceConfig::default());
        ether.register_device(&fake).await?;
        let label = fake.id().to_string();
        let mut device = Device::new(DebugSerial::new(stream, label, true));
        device
            .pause_mac()
            .await
            .with_context(|| format!("error pausing MAC layer of {}", fake.id()))?;
        nodes.push(Node { fake, device });
    }
    info!(
        "Simulating {} devices with {:?} flight time",
        nodes.len(),
        config.delay
    );

    let mut report = SimulationReport::default();
    for number in 0..config.packets {
        let sender = number % nodes.len();
        report.deliveries += exchange(&ether, &mut nodes, sender, number).await?;
        report.transmissions += 1;
    }

    ether.close().await?;
    for node in nodes {
        node.device.close().await?;
        node.fake.wait().await?;
    }

    Ok(report)
}

/// One transmission from `nodes[sender]`, heard by everyone else
async fn exchange(
    ether: &Ether,
    nodes: &mut [Node],
    sender: usize,
    number: usize,
) -> Result<usize> {
    let (before, rest) = nodes.split_at_mut(sender);
    let Some((transmitter, after)) = rest.split_first_mut() else {
        anyhow::bail!("no device at index {sender}");
    };
    let listeners = before.len() + after.len();
    let transmitter_id = transmitter.fake.id();

    let receptions = join_all(before.iter_mut().chain(after.iter_mut()).map(|node| {
        async move {
            let packet = node.device.radio_rx(CONTINUOUS_RECEIVE_MODE).await;
            (node.fake.id(), packet)
        }
    }));

    let transmission = async {
        wait_for_listeners(ether, listeners).await?;
        let packet = format!("pkt={number} from={transmitter_id}");
        debug!("{} transmitting {:?}", transmitter_id, packet);
        transmitter
            .device
            .radio_tx(packet.as_bytes())
            .await
            .with_context(|| format!("{transmitter_id} failed to transmit"))
    };

    let (received, transmitted) = tokio::join!(receptions, transmission);
    transmitted?;

    let mut deliveries = 0;
    for (id, packet) in received {
        let packet = packet.with_context(|| format!("{id} failed to receive"))?;
        println!(
            "{} -> {}: {}",
            transmitter_id,
            id,
            String::from_utf8_lossy(&packet)
        );
        deliveries += 1;
    }
    Ok(deliveries)
}

async fn wait_for_listeners(ether: &Ether, count: usize) -> Result<()> {
    loop {
        let devices = ether.registered_devices().await?;
        if devices.iter().filter(|d| d.listening).count() >= count {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
