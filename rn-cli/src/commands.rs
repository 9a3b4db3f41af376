//! Subcommands that drive a single transceiver
//!
//! Each command is generic over the device's transport so the same code
//! runs against a serial port or a fake device.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rn_device::{Device, DeviceError};
use rn_protocol::hex::u16_to_hex;
use rn_protocol::{
    FirmwareVersion, PinName, Voltage, KNOWN_RADIO_PARAMETERS, USER_NVM_END, USER_NVM_START,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

/// What `info` reports about a transceiver
#[derive(Debug)]
pub struct DeviceInfo {
    pub version: FirmwareVersion,
    pub vdd: Voltage,
    pub hweui: String,
    pub radio: Vec<(&'static str, String)>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SKU:          {}{}",
            self.version.sku.as_str(),
            if self.version.is_known_sku() { "" } else { " (unknown)" }
        )?;
        writeln!(f, "Firmware:     {}", self.version.version_string())?;
        writeln!(f, "Released:     {}", self.version.release_time)?;
        writeln!(
            f,
            "VDD:          {} mV ({:.3} V)",
            self.vdd.millivolts(),
            self.vdd.volts()
        )?;
        writeln!(f, "HWEUI:        {}", self.hweui)?;
        writeln!(f, "Radio:")?;
        for (name, value) in &self.radio {
            writeln!(f, "  {name:<12}{value}")?;
        }
        Ok(())
    }
}

/// Query version, supply voltage, HWEUI and every radio parameter
pub async fn info<T>(device: &mut Device<T>) -> Result<DeviceInfo>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let version = device.version().await.context("error getting device version")?;
    let vdd = device.vdd().await.context("error getting device VDD")?;
    let hweui = device.hweui().await.context("error getting device HWEUI")?;

    let mut radio = Vec::with_capacity(KNOWN_RADIO_PARAMETERS.len());
    for &name in KNOWN_RADIO_PARAMETERS {
        let value = device
            .radio_parameter(name)
            .await
            .with_context(|| format!("error getting radio parameter {name}"))?;
        radio.push((name, value));
    }

    Ok(DeviceInfo {
        version,
        vdd,
        hweui,
        radio,
    })
}

/// Toggle `pins` every `interval` until `stop` resolves, then switch them off
///
/// Neighbouring pins are driven in opposite phase.
pub async fn blinky<T>(
    device: &mut Device<T>,
    pins: &[PinName],
    interval: Duration,
    stop: impl Future<Output = ()>,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    tokio::pin!(stop);
    let mut level = true;

    let result = loop {
        if let Err(e) = set_pins(device, pins, level).await {
            break Err(e);
        }
        level = !level;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut stop => break Ok(()),
        }
    };

    for &pin in pins {
        if let Err(e) = device.set_digital_gpio(pin, false).await {
            warn!("Error turning off {}: {}", pin, e);
        }
    }
    result
}

async fn set_pins<T>(device: &mut Device<T>, pins: &[PinName], level: bool) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    for (i, &pin) in pins.iter().enumerate() {
        device
            .set_digital_gpio(pin, level == (i % 2 == 0))
            .await
            .with_context(|| format!("error toggling {pin}"))?;
    }
    Ok(())
}

async fn pause_mac<T>(device: &mut Device<T>) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let duration = device.pause_mac().await.context("error pausing MAC layer")?;
    info!("MAC layer paused for {:?}", duration);
    Ok(())
}

/// Transmit a numbered, timestamped test packet every `interval` until `stop`
///
/// Returns how many packets were sent successfully.
pub async fn transmit<T>(
    device: &mut Device<T>,
    power: i8,
    interval: Duration,
    stop: impl Future<Output = ()>,
) -> Result<u64>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pause_mac(device).await?;
    device
        .set_radio_power(power)
        .await
        .context("error setting radio power")?;

    tokio::pin!(stop);
    let mut sent = 0;
    for number in 0u64.. {
        let packet = format!(
            "test: pkt={} ts={}",
            number,
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
        );

        info!("Transmitting {:?}", packet);
        match device.radio_tx(packet.as_bytes()).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to transmit packet {}: {}", number, e),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut stop => break,
        }
    }
    Ok(sent)
}

/// Listen for packets until `stop`, handing each one to `on_packet`
///
/// Receive windows that close empty are reopened.
pub async fn receive<T>(
    device: &mut Device<T>,
    window: u16,
    stop: impl Future<Output = ()>,
    mut on_packet: impl FnMut(&[u8]),
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pause_mac(device).await?;

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => return Ok(()),
            received = device.radio_rx(window) => match received {
                Ok(packet) => on_packet(&packet),
                Err(DeviceError::ReceiveTimeout) => continue,
                Err(e) => return Err(e).context("error receiving packet"),
            },
        }
    }
}

/// Interactive terminal: send each input line as a command and echo the replies
///
/// Replies are collected for `quiet` after each command, so the deferred
/// second line of `radio tx` and `radio rx` shows up if it arrives in time.
/// A reply still arriving when that period ends may be cut short. Stops at
/// `quit`, at the end of `input`, or when `stop` resolves.
pub async fn miniterm<T, R, W>(
    device: &mut Device<T>,
    input: R,
    mut output: W,
    quiet: Duration,
    stop: impl Future<Output = ()>,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut input = input.lines();
    tokio::pin!(stop);

    loop {
        write_output(&mut output, "> ").await?;
        let line = tokio::select! {
            _ = &mut stop => return Ok(()),
            line = input.next_line() => line.context("error reading input")?,
        };
        let Some(line) = line else {
            return Ok(());
        };

        let command = line.trim();
        match command {
            "quit" => return Ok(()),
            "" => continue,
            _ => {}
        }

        if let Err(e) = device.send_command(command).await {
            write_output(&mut output, &format!("ERR: {e}\n")).await?;
            continue;
        }

        let deadline = tokio::time::Instant::now() + quiet;
        while let Ok(response) = tokio::time::timeout_at(deadline, device.read_response()).await {
            let response = response.context("error reading from device")?;
            write_output(&mut output, &format!("RX: {response}\n")).await?;
        }
    }
}

async fn write_output<W>(output: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output
        .write_all(text.as_bytes())
        .await
        .context("error writing output")?;
    output.flush().await.context("error writing output")
}

/// Resolve a user NVM read; `None` means from the start, or to the end
pub fn nvm_read_range(from: Option<u16>, length: Option<u16>) -> Result<(u16, u16)> {
    let from = from.unwrap_or(USER_NVM_START);
    let end = u32::from(USER_NVM_END) + 1;
    let length = match length {
        Some(length) => u32::from(length),
        None => end.saturating_sub(u32::from(from)),
    };
    check_nvm_bounds("read", from, length)?;
    Ok((from, length as u16))
}

pub fn check_nvm_bounds(operation: &str, start: u16, length: u32) -> Result<()> {
    let end = u32::from(start) + length;
    if start < USER_NVM_START || end > u32::from(USER_NVM_END) + 1 {
        bail!(
            "{} would be out of bounds (0x{}->0x{:04x} exceeds 0x{}->0x{})",
            operation,
            u16_to_hex(start),
            end,
            u16_to_hex(USER_NVM_START),
            u16_to_hex(USER_NVM_END)
        );
    }
    Ok(())
}

pub async fn read_nvm<T>(device: &mut Device<T>, from: u16, length: u16) -> Result<Vec<u8>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    info!("Reading {} bytes of NVM from 0x{}", length, u16_to_hex(from));
    Ok(device.read_nvm_block(from, length).await?)
}

pub async fn write_nvm<T>(device: &mut Device<T>, start: u16, data: &[u8]) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    check_nvm_bounds("write", start, data.len() as u32)?;
    info!("Writing {} bytes of NVM from 0x{}", data.len(), u16_to_hex(start));
    Ok(device.write_nvm_block(start, data).await?)
}
