//! Fake RN2483 transceiver
//!
//! [`FakeDevice::spawn`] starts a task that interprets the module's text
//! protocol over an in-memory duplex stream. The other end of the stream is
//! handed back to the caller, ready to be wrapped in a driver as if it were
//! a serial port.
//!
//! The device's state is shared between the interpreter and the
//! [`FakeDevice`] handle so tests can inspect it (GPIO levels, NVM contents,
//! radio parameters) without going through the protocol.
//!
//! Radio transmissions and receptions go through the [`RadioMedium`]
//! attached to the device, normally by registering it with an
//! [`Ether`](crate::Ether).

mod mac;
mod radio;
mod sys;

use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rn_protocol::response::{INVALID_PARAM, OK};
use rn_protocol::PinName;
use serde::{Deserialize, Serialize};
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

use crate::error::SimError;
use crate::ether::{DeviceId, Endpoint, RadioMedium};

use mac::MacState;
use radio::RadioState;
use sys::SysState;

/// Capacity of the in-memory stream between driver and fake device
const STREAM_BUFFER: usize = 4096;

/// Configuration for a [`FakeDevice`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeDeviceConfig {
    /// Reported by `sys get ver` and the reset commands
    pub firmware_version: String,
    /// Reported by `sys get hweui`
    pub hweui: String,
    /// Transmit power after power-on or reset
    pub radio_power: i8,
}

impl Default for FakeDeviceConfig {
    fn default() -> Self {
        Self {
            firmware_version: "RN2483 1.0.4 Mar 23 1991 13:37:00".to_string(),
            hweui: "0004A30B001C0530".to_string(),
            radio_power: 10,
        }
    }
}

impl FakeDeviceConfig {
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = firmware_version.into();
        self
    }

    pub fn with_hweui(mut self, hweui: impl Into<String>) -> Self {
        self.hweui = hweui.into();
        self
    }

    pub fn with_radio_power(mut self, radio_power: i8) -> Self {
        self.radio_power = radio_power;
        self
    }
}

/// Everything the fake device remembers
pub(crate) struct FakeState {
    config: FakeDeviceConfig,
    pub sys: SysState,
    pub mac: MacState,
    pub radio: RadioState,
    medium: Option<Arc<dyn RadioMedium>>,
}

impl FakeState {
    fn new(config: FakeDeviceConfig) -> Self {
        Self {
            sys: SysState::new(&config),
            mac: MacState::default(),
            radio: RadioState::new(&config),
            medium: None,
            config,
        }
    }

    /// Power-on defaults, keeping user NVM unless `erase_nvm` is set
    fn reset(&mut self, erase_nvm: bool) {
        let nvm = std::mem::take(&mut self.sys.nvm);
        self.sys = SysState::new(&self.config);
        if !erase_nvm {
            self.sys.nvm = nvm;
        }
        self.mac = MacState::default();
        self.radio = RadioState::new(&self.config);
    }
}

type SharedState = Arc<Mutex<FakeState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running fake transceiver
pub struct FakeDevice {
    id: DeviceId,
    state: SharedState,
    task: JoinHandle<Result<(), SimError>>,
}

impl FakeDevice {
    /// Start a fake device, returning its handle and the driver's end of the stream
    ///
    /// The interpreter exits once the returned stream is dropped or shut down.
    pub fn spawn(config: FakeDeviceConfig) -> (Self, DuplexStream) {
        let id = DeviceId::new();
        let (host, device) = tokio::io::duplex(STREAM_BUFFER);
        let state = Arc::new(Mutex::new(FakeState::new(config)));

        let span = info_span!("fake_device", %id);
        let task = tokio::spawn(run(id, Arc::clone(&state), device).instrument(span));

        (Self { id, state, task }, host)
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Replace the medium used by `radio tx` and `radio rx`
    pub fn set_medium(&self, medium: Option<Arc<dyn RadioMedium>>) {
        lock(&self.state).medium = medium;
    }

    pub fn has_medium(&self) -> bool {
        lock(&self.state).medium.is_some()
    }

    /// Level of a digital output
    pub fn gpio(&self, pin: PinName) -> bool {
        lock(&self.state).sys.gpio(pin)
    }

    /// Copy of the whole user NVM
    pub fn nvm(&self) -> Vec<u8> {
        lock(&self.state).sys.nvm.clone()
    }

    pub fn read_nvm(&self, address: u16) -> Result<u8, SimError> {
        lock(&self.state).sys.read_nvm(address)
    }

    pub fn write_nvm(&self, address: u16, value: u8) -> Result<(), SimError> {
        lock(&self.state).sys.write_nvm(address, value)
    }

    pub fn is_mac_paused(&self) -> bool {
        lock(&self.state).mac.is_paused()
    }

    /// Current value of a radio parameter, as `radio get` would report it
    pub fn radio_parameter(&self, name: &str) -> Option<String> {
        lock(&self.state).radio.get(name).map(str::to_string)
    }

    /// Wait for the interpreter to exit
    pub async fn wait(self) -> Result<(), SimError> {
        self.task.await?
    }
}

impl Endpoint for FakeDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn attach(&self, medium: Arc<dyn RadioMedium>) {
        self.set_medium(Some(medium));
    }
}

/// Interpret commands until the driver hangs up
async fn run(id: DeviceId, state: SharedState, stream: DuplexStream) -> Result<(), SimError> {
    let (reader, writer) = tokio::io::split(stream);
    let mut session = Session {
        id,
        state,
        lines: BufReader::new(reader).lines(),
        writer,
    };
    info!("Fake device started");

    while let Some(command) = session.next_command().await? {
        session.process(&command).await?;
    }

    info!("Command stream closed; fake device stopping");
    Ok(())
}

/// The interpreter's side of a fake device
struct Session {
    id: DeviceId,
    state: SharedState,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Session {
    /// Next non-empty command line, or `None` once the driver hangs up
    async fn next_command(&mut self) -> Result<Option<String>, SimError> {
        while let Some(line) = self.lines.next_line().await? {
            let command = line.trim();
            if !command.is_empty() {
                return Ok(Some(command.to_string()));
            }
        }
        Ok(None)
    }

    async fn process(&mut self, command: &str) -> Result<(), SimError> {
        debug!("Command received: {}", command);
        let tokens: Vec<&str> = command.split_whitespace().collect();
        match tokens.as_slice() {
            ["sys", params @ ..] => self.sys(params).await,
            ["mac", params @ ..] => self.mac(params).await,
            ["radio", params @ ..] => self.radio(params).await,
            _ => self.invalid_param().await,
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        lock(&self.state)
    }

    fn medium(&self) -> Option<Arc<dyn RadioMedium>> {
        self.state().medium.clone()
    }

    /// Write one response line
    async fn respond(&mut self, response: impl Display) -> Result<(), SimError> {
        let line = format!("{response}\r\n");
        debug!("Writing response: {}", line.trim_end());
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn ok(&mut self) -> Result<(), SimError> {
        self.respond(OK).await
    }

    async fn invalid_param(&mut self) -> Result<(), SimError> {
        self.respond(INVALID_PARAM).await
    }

    /// `ok` if the command was applied, `invalid_param` otherwise
    async fn ack(&mut self, accepted: bool) -> Result<(), SimError> {
        if accepted {
            self.ok().await
        } else {
            self.invalid_param().await
        }
    }
}
