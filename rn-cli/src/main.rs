//! RN2483 command-line tool
//!
//! Drives a transceiver attached over a serial port, or runs a group of
//! fake transceivers over a simulated ether.

mod commands;
mod hexdump;
mod simulate;

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rn_device::{available_ports, open_serial, DebugSerial, Device};
use rn_protocol::hex::{bytes_to_hex, hex_to_bytes, hex_to_u16, pad_hex};
use rn_protocol::{PinName, DEFAULT_BAUD_RATE};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simulate::SimulationConfig;

#[derive(Parser, Debug)]
#[command(name = "rn2483", version, about = "Drive RN2483 LoRa transceivers", long_about = None)]
struct Cli {
    /// Serial device port the transceiver is attached to
    #[arg(short, long, global = true, env = "PORT")]
    port: Option<String>,

    /// Baud rate for the serial port
    #[arg(short, long, global = true, env = "BAUDRATE", default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Increase logging verbosity; -v logs serial traffic
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    Ports,

    /// Run fake transceivers over a simulated ether
    Simulate {
        /// Number of fake devices
        #[arg(long, default_value_t = 3)]
        devices: usize,

        /// Flight time of every packet, in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 0)]
        delay: u64,

        /// Number of packets to send, round robin
        #[arg(long, default_value_t = 5)]
        packets: usize,
    },

    #[command(flatten)]
    Device(DeviceCommand),
}

/// Commands that talk to the transceiver on `--port`
#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// Show firmware version, supply voltage, HWEUI and radio parameters
    Info,

    /// Blink the user LEDs on and off
    Blinky {
        /// Pins to toggle; neighbours blink in opposite phase
        #[arg(long = "pin", default_values = ["GPIO10", "GPIO11"])]
        pins: Vec<PinName>,

        /// Milliseconds between toggles
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        interval: u64,
    },

    /// Transmit a test packet at a fixed interval
    Tx {
        /// Transmit power in dBm
        #[arg(long, env = "RADIO_POWER", default_value_t = 10, allow_negative_numbers = true)]
        power: i8,

        /// Milliseconds between transmissions
        #[arg(long, value_name = "MS", env = "TRANSMIT_INTERVAL", default_value_t = 10_000)]
        interval: u64,
    },

    /// Listen for incoming packets
    Rx {
        /// Receive window; 0 listens until a packet arrives
        #[arg(long, default_value_t = rn_protocol::CONTINUOUS_RECEIVE_MODE)]
        window: u16,

        /// Print packets as text instead of hex
        #[arg(long, env = "ASSUME_TEXT")]
        text: bool,
    },

    /// Type commands at the transceiver and see its replies; `quit` exits
    Miniterm {
        /// How long to wait for replies after each command
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        quiet: u64,
    },

    /// View and change user NVM
    Nvm {
        #[command(subcommand)]
        command: NvmCommand,
    },
}

#[derive(Subcommand, Debug)]
enum NvmCommand {
    /// Read user NVM to stdout
    Read {
        /// First address to read, in hex; defaults to the start of user NVM
        #[arg(long, value_parser = parse_address)]
        from: Option<u16>,

        /// Number of bytes to read; defaults to the end of user NVM
        #[arg(long)]
        length: Option<u16>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
        format: OutputFormat,
    },

    /// Write bytes to user NVM
    Write {
        /// First address to write, in hex
        #[arg(long, value_parser = parse_address, default_value = "300")]
        address: u16,

        /// Data as hex; read raw from stdin when omitted
        data: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Raw,
    Hexdump,
}

/// Addresses are hex, with or without a `0x` prefix
fn parse_address(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex_to_u16(&pad_hex(digits, 4)).map_err(|e| e.to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rn2483={level},rn_protocol={level},rn_device={level},rn_sim={level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Program exiting with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ports => {
            for port in available_ports()? {
                println!("{}\t{}", port.port, port.description());
            }
            Ok(())
        }
        Command::Simulate {
            devices,
            delay,
            packets,
        } => {
            let report = simulate::simulate(&SimulationConfig {
                devices,
                delay: Duration::from_millis(delay),
                packets,
            })
            .await?;
            info!(
                "{} transmissions, {} deliveries",
                report.transmissions, report.deliveries
            );
            Ok(())
        }
        Command::Device(command) => {
            let port = cli
                .port
                .context("no serial port given; pass --port or set PORT")?;
            let stream = open_serial(&port, cli.baud)
                .with_context(|| format!("error opening serial port {port}"))?;
            let mut device = Device::new(DebugSerial::new(stream, port, true));

            let result = run_on_device(&mut device, command).await;
            if let Err(e) = device.close().await {
                error!("Error closing device: {}", e);
            }
            result
        }
    }
}

async fn run_on_device<T>(device: &mut Device<T>, command: DeviceCommand) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    match command {
        DeviceCommand::Info => {
            print!("{}", commands::info(device).await?);
            Ok(())
        }
        DeviceCommand::Blinky { pins, interval } => {
            commands::blinky(device, &pins, Duration::from_millis(interval), shutdown_signal())
                .await
        }
        DeviceCommand::Tx { power, interval } => {
            let sent = commands::transmit(
                device,
                power,
                Duration::from_millis(interval),
                shutdown_signal(),
            )
            .await?;
            info!("Transmitted {} packets", sent);
            Ok(())
        }
        DeviceCommand::Rx { window, text } => {
            commands::receive(device, window, shutdown_signal(), |packet| {
                if text {
                    println!("{}", String::from_utf8_lossy(packet));
                } else {
                    println!("{}", bytes_to_hex(packet));
                }
            })
            .await
        }
        DeviceCommand::Miniterm { quiet } => {
            commands::miniterm(
                device,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                Duration::from_millis(quiet),
                shutdown_signal(),
            )
            .await
        }
        DeviceCommand::Nvm {
            command:
                NvmCommand::Read {
                    from,
                    length,
                    format,
                },
        } => {
            let (from, length) = commands::nvm_read_range(from, length)?;
            let data = commands::read_nvm(device, from, length).await?;
            match format {
                OutputFormat::Raw => std::io::stdout()
                    .write_all(&data)
                    .context("error writing NVM data to stdout")?,
                OutputFormat::Hexdump => print!("{}", hexdump::hexdump(from, &data)),
            }
            Ok(())
        }
        DeviceCommand::Nvm {
            command: NvmCommand::Write { address, data },
        } => {
            let data = match data {
                Some(hex) => hex_to_bytes(&hex).context("data is not valid hex")?,
                None => {
                    let mut data = Vec::new();
                    std::io::stdin()
                        .read_to_end(&mut data)
                        .context("error reading data from stdin")?;
                    data
                }
            };
            commands::write_nvm(device, address, &data).await
        }
    }
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("300"), Ok(0x300));
        assert_eq!(parse_address("0x3ff"), Ok(0x3FF));
        assert_eq!(parse_address("0X310"), Ok(0x310));
        assert!(parse_address("0x10000").is_err());
        assert!(parse_address("nope").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "rn2483", "-vv", "--port", "/dev/ttyUSB0", "tx", "--power", "-3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.baud, DEFAULT_BAUD_RATE);
        assert!(matches!(
            cli.command,
            Command::Device(DeviceCommand::Tx {
                power: -3,
                interval: 10_000
            })
        ));

        let cli = Cli::try_parse_from(["rn2483", "blinky", "--pin", "gpio5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Device(DeviceCommand::Blinky { ref pins, .. }) if pins == &[PinName::Gpio5]
        ));

        let cli = Cli::try_parse_from(["rn2483", "-p", "/dev/ttyUSB0", "miniterm"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Device(DeviceCommand::Miniterm { quiet: 1000 })
        ));

        let cli = Cli::try_parse_from([
            "rn2483", "nvm", "read", "--from", "0x3f0", "--format", "hexdump",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Device(DeviceCommand::Nvm {
                command: NvmCommand::Read {
                    from: Some(0x3F0),
                    length: None,
                    format: OutputFormat::Hexdump,
                }
            })
        ));
    }
}
