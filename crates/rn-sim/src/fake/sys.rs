//! `sys` commands

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use rn_protocol::hex::{byte_to_hex, hex_to_byte, hex_to_u16, pad_hex};
use rn_protocol::{user_nvm_index, PinName, USER_NVM_LENGTH};
use tracing::info;

use super::{FakeDeviceConfig, Session};
use crate::error::SimError;

/// Shortest sleep the module accepts, in milliseconds
const MIN_SLEEP_MS: u64 = 100;

/// Nominal supply voltage reported by `sys get vdd`, in millivolts
const NOMINAL_VDD_MV: u16 = 3304;

pub(crate) struct SysState {
    pub firmware_version: String,
    pub hweui: String,
    gpio: BTreeMap<PinName, bool>,
    pub nvm: Vec<u8>,
}

impl SysState {
    pub fn new(config: &FakeDeviceConfig) -> Self {
        Self {
            firmware_version: config.firmware_version.clone(),
            hweui: config.hweui.clone(),
            gpio: PinName::ALL.iter().map(|&pin| (pin, false)).collect(),
            nvm: vec![0xFF; usize::from(USER_NVM_LENGTH)],
        }
    }

    pub fn gpio(&self, pin: PinName) -> bool {
        self.gpio.get(&pin).copied().unwrap_or(false)
    }

    pub fn set_gpio(&mut self, pin: PinName, level: bool) {
        self.gpio.insert(pin, level);
    }

    pub fn read_nvm(&self, address: u16) -> Result<u8, SimError> {
        user_nvm_index(address)
            .map(|index| self.nvm[index])
            .ok_or(SimError::NvmOutOfBounds(address))
    }

    pub fn write_nvm(&mut self, address: u16, value: u8) -> Result<(), SimError> {
        let index = user_nvm_index(address).ok_or(SimError::NvmOutOfBounds(address))?;
        self.nvm[index] = value;
        Ok(())
    }
}

/// Supply voltage with a little measurement noise
fn measure_vdd() -> u16 {
    rand::thread_rng().gen_range(NOMINAL_VDD_MV - 4..NOMINAL_VDD_MV + 4)
}

/// NVM addresses may be sent without leading zeros
fn parse_address(address: &str) -> Option<u16> {
    hex_to_u16(&pad_hex(address, 4)).ok()
}

fn parse_level(level: &str) -> Option<bool> {
    match level {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

impl Session {
    pub(super) async fn sys(&mut self, params: &[&str]) -> Result<(), SimError> {
        match params {
            ["get", "ver"] => {
                let version = self.state().sys.firmware_version.clone();
                self.respond(version).await
            }
            ["get", "vdd"] => self.respond(measure_vdd()).await,
            ["get", "hweui"] => {
                let hweui = self.state().sys.hweui.clone();
                self.respond(hweui).await
            }
            ["get", "nvm", address] => {
                let value =
                    parse_address(address).and_then(|a| self.state().sys.read_nvm(a).ok());
                match value {
                    Some(value) => self.respond(byte_to_hex(value)).await,
                    None => self.invalid_param().await,
                }
            }
            ["set", "nvm", address, value] => {
                let written = match (parse_address(address), hex_to_byte(value)) {
                    (Some(address), Ok(value)) => {
                        self.state().sys.write_nvm(address, value).is_ok()
                    }
                    _ => false,
                };
                self.ack(written).await
            }
            ["set", "pindig", pin, level] => {
                let accepted = match (pin.parse::<PinName>(), parse_level(level)) {
                    (Ok(pin), Some(level)) => {
                        self.state().sys.set_gpio(pin, level);
                        true
                    }
                    _ => false,
                };
                self.ack(accepted).await
            }
            ["reset"] => self.reset(false).await,
            ["factoryRESET"] => self.reset(true).await,
            ["sleep", millis] => match millis.parse::<u64>() {
                Ok(millis) if (MIN_SLEEP_MS..=u64::from(u32::MAX)).contains(&millis) => {
                    info!("Sleeping for {} ms", millis);
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    self.ok().await
                }
                _ => self.invalid_param().await,
            },
            _ => self.invalid_param().await,
        }
    }

    async fn reset(&mut self, erase_nvm: bool) -> Result<(), SimError> {
        let version = {
            let mut state = self.state();
            state.reset(erase_nvm);
            state.sys.firmware_version.clone()
        };
        info!(
            "Reset ({})",
            if erase_nvm { "factory" } else { "NVM kept" }
        );
        self.respond(version).await
    }
}
