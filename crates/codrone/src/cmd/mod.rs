use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use codrone_link::{DeviceType, MessageKind};
use codrone_transport::LinkStream;

use crate::exit::{transport_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one frame and print its bytes.
    Encode(EncodeArgs),
    /// Parse captured bytes and print every frame found.
    Decode(DecodeArgs),
    /// Send one frame to the drone.
    Send(SendArgs),
    /// Print frames received from the drone.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Message kind, by name (e.g. `command`) or tag (e.g. `0x11`).
    #[arg(long, short = 'k', value_parser = parse_kind)]
    pub kind: MessageKind,
    /// Payload as hex (spaces allowed).
    #[arg(long, default_value = "")]
    pub hex: String,
    /// Source device.
    #[arg(long, default_value = "base", value_parser = parse_device)]
    pub from: DeviceType,
    /// Destination device.
    #[arg(long, default_value = "drone", value_parser = parse_device)]
    pub to: DeviceType,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured bytes as hex.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Read captured bytes from a file.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
    /// Largest payload accepted before a frame is treated as corrupt.
    #[arg(long, default_value_t = codrone_frame::DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial bridge: `tcp://host:port`, `unix:/path` or a socket path.
    pub endpoint: String,
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Wait for the drone to acknowledge, re-sending on timeout.
    #[arg(long)]
    pub confirm: bool,
    /// Transmissions before giving up when --confirm is set.
    #[arg(long, default_value_t = codrone_link::DEFAULT_MAX_ATTEMPTS)]
    pub retries: u32,
    /// Wait per attempt when --confirm is set (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms")]
    pub ack_timeout: String,
    /// Connection timeout for TCP bridges.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial bridge: `tcp://host:port`, `unix:/path` or a socket path.
    pub endpoint: String,
    /// Only print these kinds (comma-separated names or tags).
    #[arg(long, value_delimiter = ',', value_parser = parse_kind)]
    pub kinds: Option<Vec<MessageKind>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Connection timeout for TCP bridges.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Where the serial bridge listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl Endpoint {
    pub fn parse(input: &str) -> CliResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CliError::usage("endpoint must not be empty"));
        }
        if let Some(addr) = input.strip_prefix("tcp://") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(CliError::usage(format!(
                    "tcp endpoint needs host:port, got {input}"
                )));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }
        let path = input.strip_prefix("unix:").unwrap_or(input);
        if path.is_empty() {
            return Err(CliError::usage("unix endpoint needs a socket path"));
        }
        Ok(Self::Unix(PathBuf::from(path)))
    }

    pub fn connect(&self, timeout: Duration) -> CliResult<LinkStream> {
        match self {
            Self::Tcp(addr) => codrone_transport::tcp::connect(addr, timeout)
                .map_err(|err| transport_error("connect failed", err)),
            #[cfg(unix)]
            Self::Unix(path) => codrone_transport::uds::connect(path)
                .map_err(|err| transport_error("connect failed", err)),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(CliError::usage(
                "unix socket endpoints are not supported on this platform",
            )),
        }
    }
}

pub fn parse_kind(input: &str) -> Result<MessageKind, String> {
    let input = input.trim();
    let by_tag = parse_hex_byte(input).and_then(MessageKind::from_u8);
    by_tag
        .or_else(|| MessageKind::from_name(&input.replace(['-', '_'], "")))
        .ok_or_else(|| format!("unknown message kind: {input}"))
}

pub fn parse_device(input: &str) -> Result<DeviceType, String> {
    let input = input.trim();
    let by_tag = parse_hex_byte(input).and_then(DeviceType::from_u8);
    by_tag
        .or_else(|| DeviceType::from_name(&input.replace(['-', '_'], "")))
        .ok_or_else(|| format!("unknown device: {input}"))
}

fn parse_hex_byte(input: &str) -> Option<u8> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))?;
    u8::from_str_radix(digits, 16).ok()
}

/// Decode hex text, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::usage("hex input has an odd number of digits"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| {
                    CliError::usage(format!(
                        "invalid hex byte: {}",
                        String::from_utf8_lossy(pair)
                    ))
                })
        })
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_forms() {
        assert_eq!(
            Endpoint::parse("tcp://192.168.4.1:2000").unwrap(),
            Endpoint::Tcp("192.168.4.1:2000".to_string())
        );
        assert_eq!(
            Endpoint::parse("unix:/tmp/drone.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/drone.sock"))
        );
        assert_eq!(
            Endpoint::parse("/tmp/drone.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/drone.sock"))
        );
        assert!(Endpoint::parse("tcp://nohost").is_err());
        assert!(Endpoint::parse("unix:").is_err());
        assert!(Endpoint::parse(" ").is_err());
    }

    #[test]
    fn kinds_by_name_or_tag() {
        assert_eq!(parse_kind("command").unwrap(), MessageKind::Command);
        assert_eq!(parse_kind("0x40").unwrap(), MessageKind::State);
        assert_eq!(
            parse_kind("display-draw-string").unwrap(),
            MessageKind::DisplayDrawString
        );
        assert!(parse_kind("0x08").is_err());
        assert!(parse_kind("warp").is_err());
    }

    #[test]
    fn devices_by_name_or_tag() {
        assert_eq!(parse_device("drone").unwrap(), DeviceType::Drone);
        assert_eq!(parse_device("0x70").unwrap(), DeviceType::Base);
        assert_eq!(parse_device("ble_client").unwrap(), DeviceType::BleClient);
        assert!(parse_device("0x11").is_err());
    }

    #[test]
    fn hex_payloads() {
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex("0a55").unwrap(), vec![0x0A, 0x55]);
        assert_eq!(parse_hex("0x 11 01").unwrap(), vec![0x11, 0x01]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("0ms").is_err());
        assert!(parse_duration("soon").is_err());
    }
}
