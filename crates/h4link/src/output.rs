use std::fmt::Write as _;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use h4link_frame::{Packet, PacketType, HCI_EVENT_TRANSPORT_PACKET_SENT};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct PacketOutput {
    pub packet_type: &'static str,
    pub tag: u8,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_code: Option<u8>,
    pub data: String,
}

impl PacketOutput {
    pub fn from_packet(packet: &Packet) -> Self {
        let event_code = match packet.packet_type {
            PacketType::Event => packet.data.first().copied(),
            _ => None,
        };
        Self {
            packet_type: packet.packet_type.name(),
            tag: packet.packet_type.tag(),
            size: packet.data.len(),
            event_code,
            data: hex(&packet.data),
        }
    }
}

pub fn print_packet(packet: &Packet, format: OutputFormat) {
    print_packets(std::slice::from_ref(packet), format);
}

pub fn print_packets(packets: &[Packet], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for packet in packets {
                println!(
                    "{}",
                    serde_json::to_string(&PacketOutput::from_packet(packet))
                        .unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            if packets.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "SIZE", "DETAIL", "DATA"]);
            for packet in packets {
                table.add_row(vec![
                    packet.packet_type.name().to_string(),
                    packet.data.len().to_string(),
                    detail(packet),
                    hex(&packet.data),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for packet in packets {
                println!(
                    "type={} size={} {} data={}",
                    packet.packet_type,
                    packet.data.len(),
                    detail(packet),
                    hex(&packet.data)
                );
            }
        }
    }
}

fn detail(packet: &Packet) -> String {
    match (packet.packet_type, packet.data.first()) {
        (PacketType::Event, Some(&HCI_EVENT_TRANSPORT_PACKET_SENT)) => {
            "transport-packet-sent".to_string()
        }
        (PacketType::Event, Some(code)) => format!("event=0x{code:02x}"),
        _ => match packet.declared_payload_len() {
            Some(len) => format!("payload={len}"),
            None => String::new(),
        },
    }
}

pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
