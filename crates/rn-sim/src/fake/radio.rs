//! `radio` commands
//!
//! `radio tx` and `radio rx` answer `ok` straight away, then a second line
//! once the attached medium has carried the packet or the receive window
//! has closed. While a receive window is open the device keeps reading
//! commands: `radio rxstop` closes the window and anything else is `busy`.

use std::collections::BTreeMap;
use std::time::Duration;

use std::future::Future;

use futures::future;
use rn_protocol::hex::{bytes_to_hex, hex_to_bytes};
use rn_protocol::response::{BUSY, RADIO_ERR, RADIO_RX, RADIO_TX_OK};
use rn_protocol::{CONTINUOUS_RECEIVE_MODE, KNOWN_RADIO_PARAMETERS};
use tracing::{debug, info, warn};

use super::{FakeDeviceConfig, Session};
use crate::error::SimError;

/// Largest payload `radio tx` accepts, in bytes
const MAX_PAYLOAD: usize = 255;

/// Transmit power range accepted by `radio set pwr`, in dBm
const MIN_POWER: i8 = -3;
const MAX_POWER: i8 = 15;

/// Ends a receive window early
const RXSTOP: &str = "radio rxstop";

/// How a receive window ended
enum Listened {
    Packet(Vec<u8>),
    /// Timed out or closed by the medium
    Closed,
    /// `radio rxstop` arrived
    Stopped,
    /// The driver hung up
    HungUp,
}

pub(crate) struct RadioState {
    parameters: BTreeMap<&'static str, String>,
}

impl RadioState {
    pub fn new(config: &FakeDeviceConfig) -> Self {
        let parameters = KNOWN_RADIO_PARAMETERS
            .iter()
            .map(|&name| {
                let value = match name {
                    "pwr" => config.radio_power.to_string(),
                    _ => default_parameter(name).to_string(),
                };
                (name, value)
            })
            .collect();
        Self { parameters }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Apply `radio set`, returning whether the value was accepted
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        if !valid_parameter(name, value) {
            return false;
        }
        match self.parameters.get_mut(name) {
            Some(current) => {
                *current = value.to_string();
                true
            }
            None => false,
        }
    }
}

/// Power-on value of a radio parameter
fn default_parameter(name: &str) -> &'static str {
    match name {
        "bt" => "0.5",
        "mod" => "lora",
        "freq" => "868100000",
        "pwr" => "1",
        "sf" => "sf12",
        "afcbw" => "41.7",
        "rxbw" => "25",
        "bitrate" => "50000",
        "fdev" => "25000",
        "prlen" => "8",
        "crc" => "on",
        "iqi" => "off",
        "cr" => "4/5",
        "wdt" => "15000",
        "bw" => "125",
        "snr" => "-128",
        _ => "",
    }
}

fn valid_parameter(name: &str, value: &str) -> bool {
    match name {
        "pwr" => value
            .parse::<i8>()
            .is_ok_and(|power| (MIN_POWER..=MAX_POWER).contains(&power)),
        "mod" => matches!(value, "lora" | "fsk"),
        "freq" => value.parse::<u32>().is_ok_and(|hz| {
            (433_050_000..=434_790_000).contains(&hz) || (863_000_000..=870_000_000).contains(&hz)
        }),
        "sf" => matches!(value, "sf7" | "sf8" | "sf9" | "sf10" | "sf11" | "sf12"),
        "bt" => matches!(value, "none" | "1.0" | "0.5" | "0.3"),
        "crc" | "iqi" => matches!(value, "on" | "off"),
        "cr" => matches!(value, "4/5" | "4/6" | "4/7" | "4/8"),
        "bw" => matches!(value, "125" | "250" | "500"),
        "afcbw" | "rxbw" => value.parse::<f32>().is_ok(),
        "prlen" => value.parse::<u16>().is_ok(),
        "bitrate" | "fdev" | "wdt" => value.parse::<u32>().is_ok(),
        // Read-only
        "snr" => false,
        _ => false,
    }
}

impl Session {
    pub(super) async fn radio(&mut self, params: &[&str]) -> Result<(), SimError> {
        match params {
            ["get", name] => {
                let value = self.state().radio.get(name).map(str::to_string);
                match value {
                    Some(value) => self.respond(value).await,
                    None => self.invalid_param().await,
                }
            }
            ["set", name, value] => {
                let accepted = self.state().radio.set(name, value);
                self.ack(accepted).await
            }
            ["tx", data] => self.radio_tx(data).await,
            ["rx", window] => self.radio_rx(window).await,
            // Nothing to stop outside a receive window
            ["rxstop"] => self.ok().await,
            _ => self.invalid_param().await,
        }
    }

    async fn radio_tx(&mut self, data: &str) -> Result<(), SimError> {
        let payload = match hex_to_bytes(data) {
            Ok(payload) if payload.len() <= MAX_PAYLOAD => payload,
            _ => return self.invalid_param().await,
        };
        self.ok().await?;

        let Some(medium) = self.medium() else {
            info!("No medium attached; dropping transmission");
            return self.respond(RADIO_TX_OK).await;
        };

        debug!("Transmitting {} bytes", payload.len());
        match medium.transmit(self.id, payload).await {
            Ok(()) => self.respond(RADIO_TX_OK).await,
            Err(e) => {
                warn!("Transmission failed: {}", e);
                self.respond(RADIO_ERR).await
            }
        }
    }

    async fn radio_rx(&mut self, window: &str) -> Result<(), SimError> {
        let Ok(window_ms) = window.parse::<u16>() else {
            return self.invalid_param().await;
        };
        self.ok().await?;

        let reception = match self.medium() {
            Some(medium) => match medium.receive(self.id).await {
                Ok(reception) => Some(reception),
                Err(e) => {
                    warn!("Could not listen: {}", e);
                    return self.respond(RADIO_ERR).await;
                }
            },
            None => {
                info!("No medium attached; nothing will be received");
                None
            }
        };

        let listen = async move {
            match reception {
                Some(reception) => reception.await,
                None => future::pending().await,
            }
        };

        let listened = if window_ms == CONTINUOUS_RECEIVE_MODE {
            self.listen(listen).await?
        } else {
            let window = Duration::from_millis(u64::from(window_ms));
            tokio::time::timeout(window, self.listen(listen))
                .await
                .unwrap_or(Ok(Listened::Closed))?
        };

        match listened {
            Listened::Packet(payload) => {
                debug!("Received {} bytes", payload.len());
                self.respond(format!("{} {}", RADIO_RX, bytes_to_hex(&payload)))
                    .await
            }
            Listened::Closed => self.respond(RADIO_ERR).await,
            Listened::Stopped => {
                self.respond(RADIO_ERR).await?;
                self.ok().await
            }
            Listened::HungUp => {
                debug!("Driver hung up while listening");
                Ok(())
            }
        }
    }

    /// Wait for a packet while still reading commands
    ///
    /// `radio rxstop` ends the window and anything else is answered `busy`.
    async fn listen(
        &mut self,
        reception: impl Future<Output = Option<Vec<u8>>>,
    ) -> Result<Listened, SimError> {
        tokio::pin!(reception);
        loop {
            tokio::select! {
                received = &mut reception => {
                    return Ok(received.map_or(Listened::Closed, Listened::Packet));
                }
                command = self.next_command() => match command? {
                    None => return Ok(Listened::HungUp),
                    Some(command) if command == RXSTOP => return Ok(Listened::Stopped),
                    Some(command) => {
                        debug!("Receiving; rejecting {}", command);
                        self.respond(BUSY).await?;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_known_parameters() {
        let radio = RadioState::new(&FakeDeviceConfig::default().with_radio_power(7));
        for name in KNOWN_RADIO_PARAMETERS {
            assert!(radio.get(name).is_some_and(|v| !v.is_empty()), "{name}");
        }
        assert_eq!(radio.get("pwr"), Some("7"));
        assert_eq!(radio.get("nope"), None);
    }

    #[test]
    fn test_set_validates() {
        let mut radio = RadioState::new(&FakeDeviceConfig::default());

        assert!(radio.set("pwr", "-3"));
        assert!(radio.set("pwr", "15"));
        assert!(!radio.set("pwr", "16"));
        assert!(!radio.set("pwr", "high"));
        assert_eq!(radio.get("pwr"), Some("15"));

        assert!(radio.set("sf", "sf7"));
        assert!(!radio.set("sf", "sf6"));
        assert!(radio.set("freq", "869525000"));
        assert!(!radio.set("freq", "915000000"));
        assert!(!radio.set("snr", "5"));
        assert!(!radio.set("nope", "1"));
    }
}
