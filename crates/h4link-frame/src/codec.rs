use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet::PacketType;

/// A complete HCI packet as delivered by the framer, without its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The packet type tag.
    pub packet_type: PacketType,
    /// Header + payload.
    pub data: Bytes,
}

impl Packet {
    /// Create a new packet.
    pub fn new(packet_type: PacketType, data: impl Into<Bytes>) -> Self {
        Self {
            packet_type,
            data: data.into(),
        }
    }

    /// The total wire size of this packet (type tag + header + payload).
    pub fn wire_size(&self) -> usize {
        1 + self.data.len()
    }

    /// Payload length declared by the packet header, if the header is complete.
    pub fn declared_payload_len(&self) -> Option<usize> {
        self.packet_type.payload_len(&self.data)
    }
}

/// Encode a packet into the H4 wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────────────────────────┬────────────────────┐
/// │ Type (1B) │ Header (2-4B, per type)  │ Payload (L bytes)  │
/// │ 01 - 04   │ carries L                │                    │
/// └───────────┴──────────────────────────┴────────────────────┘
/// ```
///
/// `packet` is header + payload. The header must be complete and its length
/// field must match the payload that follows it.
pub fn encode_packet(packet_type: PacketType, packet: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header_size = packet_type.header_size();
    let declared = packet_type
        .payload_len(packet)
        .ok_or(FrameError::UnexpectedBlockLength {
            expected: header_size,
            actual: packet.len(),
        })?;
    if header_size + declared != packet.len() {
        return Err(FrameError::UnexpectedBlockLength {
            expected: header_size + declared,
            actual: packet.len(),
        });
    }
    dst.reserve(1 + packet.len());
    dst.put_u8(packet_type.tag());
    dst.put_slice(packet);
    Ok(())
}
