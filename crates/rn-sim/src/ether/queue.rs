//! Earliest-first queue of packets in flight

use std::collections::VecDeque;

use tokio::time::Instant;

use super::link::DeviceId;

/// A packet scheduled for delivery to one receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InFlightPacket {
    pub payload: Vec<u8>,
    pub destination: DeviceId,
    pub arrival: Instant,
}

/// Packets ordered by non-decreasing arrival time
///
/// Packets with equal arrival times keep the order they were pushed in.
#[derive(Debug, Default)]
pub(crate) struct InFlightQueue {
    packets: VecDeque<InFlightPacket>,
}

impl InFlightQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert before the first packet arriving strictly later
    pub fn push(&mut self, packet: InFlightPacket) {
        let index = self
            .packets
            .partition_point(|queued| queued.arrival <= packet.arrival);
        self.packets.insert(index, packet);
    }

    /// The next packet to arrive
    pub fn peek(&self) -> Option<&InFlightPacket> {
        self.packets.front()
    }

    pub fn pop(&mut self) -> Option<InFlightPacket> {
        self.packets.pop_front()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn clear(&mut self) {
        self.packets.clear();
    }
}
