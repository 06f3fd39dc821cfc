use std::time::{Duration, Instant};

use bytes::BytesMut;
use h4link_frame::{
    encode_packet, OutgoingPacket, Packet, PacketType, HCI_EVENT_TRANSPORT_PACKET_SENT,
};
use tracing::debug;

use crate::cmd::{open_line, parse_duration, parse_hex, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let packet_type = PacketType::from(args.packet_type);
    let payload = parse_hex(&args.hex)?;
    check_header(packet_type, &payload)?;

    let (mut transport, queue) = open_line(&args.line)?;
    transport
        .send_packet(packet_type, OutgoingPacket::from_payload(&payload))
        .map_err(|err| transport_error("send failed", err))?;

    let deadline = Instant::now() + timeout;
    let mut waiter = SendWaiter::new(args.wait);
    loop {
        transport
            .poll()
            .map_err(|err| transport_error("receive failed", err))?;

        while let Some(packet) = queue.pop() {
            if let Some(response) = waiter.accept(packet) {
                print_packet(&response, format);
            }
        }
        if waiter.is_done() {
            break;
        }
        if Instant::now() >= deadline {
            let _ = transport.close();
            return Err(timeout_error(&waiter, timeout));
        }
    }

    transport
        .close()
        .map_err(|err| transport_error("close failed", err))?;
    Ok(SUCCESS)
}

/// Reject payloads whose header disagrees with their length.
fn check_header(packet_type: PacketType, payload: &[u8]) -> CliResult<()> {
    let mut scratch = BytesMut::with_capacity(payload.len() + 1);
    encode_packet(packet_type, payload, &mut scratch)
        .map_err(|err| frame_error(&format!("invalid {packet_type} packet"), err))
}

fn timeout_error(waiter: &SendWaiter, timeout: Duration) -> CliError {
    let what = if waiter.sent {
        "response"
    } else {
        "send completion"
    };
    CliError::new(TIMEOUT, format!("timed out after {timeout:?} waiting for {what}"))
}

/// Tracks the send completion and, optionally, one response packet.
#[derive(Debug)]
struct SendWaiter {
    wait_for_response: bool,
    sent: bool,
    responded: bool,
}

impl SendWaiter {
    fn new(wait_for_response: bool) -> Self {
        Self {
            wait_for_response,
            sent: false,
            responded: false,
        }
    }

    /// Returns the packet when it is the response to print.
    fn accept(&mut self, packet: Packet) -> Option<Packet> {
        if is_sent_event(&packet) {
            debug!("packet sent");
            self.sent = true;
            return None;
        }
        if self.wait_for_response && !self.responded {
            self.responded = true;
            return Some(packet);
        }
        debug!(packet_type = %packet.packet_type, "ignoring unsolicited packet");
        None
    }

    fn is_done(&self) -> bool {
        self.sent && (!self.wait_for_response || self.responded)
    }
}

fn is_sent_event(packet: &Packet) -> bool {
    packet.packet_type == PacketType::Event
        && packet.data.first() == Some(&HCI_EVENT_TRANSPORT_PACKET_SENT)
}
