use std::fs;

use h4link_frame::Packet;
use h4link_transport::{H4Transport, PacketQueue, TransportConfig, UartTransportConfig};
use h4link_uart::MockUart;
use tracing::{debug, warn};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{io_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_packets, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = match (&args.hex, &args.file) {
        (Some(hex), _) => parse_hex(hex)?,
        (None, Some(path)) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => Vec::new(),
    };

    let decoded = decode_stream(&bytes)?;
    print_packets(&decoded.packets, format);

    if decoded.trailing > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "stream ends inside a packet ({} trailing bytes)",
                decoded.trailing
            ),
        ));
    }
    Ok(SUCCESS)
}

#[derive(Debug)]
pub struct Decoded {
    pub packets: Vec<Packet>,
    /// Bytes consumed by a packet the stream did not finish.
    pub trailing: usize,
}

/// Replay `bytes` as if they had arrived on a serial line.
pub fn decode_stream(bytes: &[u8]) -> CliResult<Decoded> {
    let mut uart = MockUart::new();
    uart.inject_rx(bytes);

    let mut transport = H4Transport::new(uart);
    let config = TransportConfig::Uart(UartTransportConfig::default());
    transport
        .init(&config)
        .map_err(|err| transport_error("init failed", err))?;

    let queue = PacketQueue::new();
    transport.register_packet_handler(queue.clone());
    transport
        .open()
        .map_err(|err| transport_error("open failed", err))?;

    let completions = transport
        .drain()
        .map_err(|err| transport_error("decode failed", err))?;
    debug!(completions, "decode drained");

    let trailing = transport.partial_len() + transport.driver().rx_pending();
    if trailing > 0 {
        warn!(trailing, state = ?transport.frame_state(), "incomplete packet at end of stream");
    }

    Ok(Decoded {
        packets: queue.drain(),
        trailing,
    })
}
