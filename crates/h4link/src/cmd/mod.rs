use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use h4link_frame::PacketType;
use h4link_transport::UartTransportConfig;
#[cfg(unix)]
use h4link_transport::{H4Transport, PacketQueue, TransportConfig};
#[cfg(unix)]
use h4link_uart::PosixUart;
use h4link_uart::{FlowControl, DEFAULT_BAUDRATE};

#[cfg(unix)]
use crate::exit::transport_error;
use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
#[cfg(unix)]
pub mod monitor;
#[cfg(unix)]
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a captured H4 byte stream.
    Decode(DecodeArgs),
    /// Print packets received on a serial device.
    Monitor(MonitorArgs),
    /// Send a single packet on a serial device.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        #[cfg(unix)]
        Command::Monitor(args) => monitor::run(args, format),
        #[cfg(unix)]
        Command::Send(args) => send::run(args, format),
        #[cfg(not(unix))]
        Command::Monitor(_) | Command::Send(_) => Err(CliError::new(
            USAGE,
            "serial devices are only supported on unix targets",
        )),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// H4 bytes as hex (whitespace and ':' separators, optional 0x per byte group).
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Read raw H4 bytes from a capture file.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LineArgs {
    /// Serial device, e.g. /dev/ttyUSB0.
    pub device: String,
    /// Line speed.
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baud: u32,
    /// Enable RTS/CTS hardware flow control.
    #[arg(long)]
    pub flow_control: bool,
}

impl LineArgs {
    pub fn transport_config(&self) -> UartTransportConfig {
        UartTransportConfig::new(self.device.clone())
            .with_baudrate(self.baud)
            .with_flow_control(FlowControl::from_enabled(self.flow_control))
    }
}

/// Open `line` as an H4 transport with a queue registered as the handler.
#[cfg(unix)]
pub fn open_line(line: &LineArgs) -> CliResult<(H4Transport<PosixUart>, PacketQueue)> {
    let config = TransportConfig::Uart(line.transport_config());
    let mut transport = H4Transport::new(PosixUart::new());
    transport
        .init(&config)
        .map_err(|err| transport_error("init failed", err))?;

    let queue = PacketQueue::new();
    transport.register_packet_handler(queue.clone());
    transport
        .open()
        .map_err(|err| transport_error("open failed", err))?;
    Ok((transport, queue))
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub line: LineArgs,
    /// Exit after receiving N packets.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub line: LineArgs,
    /// Packet type tag to send.
    #[arg(long = "type", value_enum)]
    pub packet_type: PacketKind,
    /// Packet header + payload as hex, without the type tag.
    #[arg(long)]
    pub hex: String,
    /// Wait for one received packet and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the send to complete and, with --wait, for
    /// the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Packet types a host may put on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PacketKind {
    Command,
    Acl,
    Sco,
}

impl From<PacketKind> for PacketType {
    fn from(kind: PacketKind) -> Self {
        match kind {
            PacketKind::Command => PacketType::Command,
            PacketKind::Acl => PacketType::Acl,
            PacketKind::Sco => PacketType::Sco,
        }
    }
}

/// Parse a hex string such as `01 03 0c 00`, `01:03:0c:00` or `0x01 0x03`.
///
/// Each whitespace or `:` separated token may carry its own `0x` prefix.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_ascii_whitespace() || c == ':')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();
    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, "hex input must be ASCII"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let text = &digits[i..i + 2];
            u8::from_str_radix(text, 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte: {text}")))
        })
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_separators() {
        assert_eq!(parse_hex("01 03 0c 00").unwrap(), vec![0x01, 0x03, 0x0C, 0x00]);
        assert_eq!(parse_hex("04:0e:04").unwrap(), vec![0x04, 0x0E, 0x04]);
        assert_eq!(parse_hex("0x040E").unwrap(), vec![0x04, 0x0E]);
        assert_eq!(parse_hex("0x04 0x0e 0X00").unwrap(), vec![0x04, 0x0E, 0x00]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("040").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("04 x0e").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("é0").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn line_args_build_uart_config() {
        let line = LineArgs {
            device: "/dev/ttyUSB0".to_string(),
            baud: 921_600,
            flow_control: true,
        };
        let config = line.transport_config();
        assert_eq!(config.device_name.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baudrate_init, 921_600);
        assert_eq!(config.flow_control, FlowControl::RtsCts);
    }

    #[test]
    fn packet_kind_maps_to_tag() {
        assert_eq!(PacketType::from(PacketKind::Command).tag(), 0x01);
        assert_eq!(PacketType::from(PacketKind::Sco).tag(), 0x03);
    }
}
