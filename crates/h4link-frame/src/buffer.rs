//! Packet buffers.
//!
//! [`PacketBuffer`] is the fixed receive region used by the framer. Its
//! logical view starts after a reserved pre-buffer; logical byte 0 holds the
//! packet type tag and the header plus payload follow.
//!
//! [`OutgoingPacket`] is the send-side counterpart: a payload that always has
//! at least one byte of headroom in front of it, so the type tag can be
//! written in place when the packet is handed to the driver.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet::{
    PacketType, ACL_HEADER_SIZE, COMMAND_HEADER_SIZE, DEFAULT_ACL_PAYLOAD, EVENT_HEADER_SIZE,
    MAX_EVENT_PAYLOAD, MAX_SCO_PAYLOAD, SCO_HEADER_SIZE,
};

/// Default pre-buffer size: room for the packet type tag.
pub const DEFAULT_PRE_BUFFER_SIZE: usize = 1;

/// Default maximum packet size (header + payload, excluding the type tag).
pub const DEFAULT_MAX_PACKET_SIZE: usize = ACL_HEADER_SIZE + DEFAULT_ACL_PAYLOAD;

/// Smallest maximum packet size that still fits every event and SCO packet.
///
/// Event and SCO lengths are not bounds-checked while framing; this minimum
/// is what keeps them inside the buffer.
pub const MIN_MAX_PACKET_SIZE: usize = {
    let event = EVENT_HEADER_SIZE + MAX_EVENT_PAYLOAD;
    let sco = SCO_HEADER_SIZE + MAX_SCO_PAYLOAD;
    if event > sco {
        event
    } else {
        sco
    }
};

/// Fixed-capacity receive buffer with a reserved pre-buffer.
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    storage: Box<[u8]>,
    pre_buffer_size: usize,
    max_packet_size: usize,
}

impl PacketBuffer {
    /// Allocate a buffer of `pre_buffer_size + 1 + max_packet_size` bytes.
    pub fn new(pre_buffer_size: usize, max_packet_size: usize) -> Result<Self> {
        if pre_buffer_size == 0 {
            return Err(FrameError::InvalidPreBuffer);
        }
        if max_packet_size < MIN_MAX_PACKET_SIZE {
            return Err(FrameError::BufferTooSmall {
                size: max_packet_size,
                min: MIN_MAX_PACKET_SIZE,
            });
        }
        Ok(Self {
            storage: vec![0u8; pre_buffer_size + 1 + max_packet_size].into_boxed_slice(),
            pre_buffer_size,
            max_packet_size,
        })
    }

    /// Bytes reserved before the logical view.
    pub fn pre_buffer_size(&self) -> usize {
        self.pre_buffer_size
    }

    /// Largest header + payload the buffer accepts.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Length of the logical view: type tag + max packet size.
    pub fn capacity(&self) -> usize {
        1 + self.max_packet_size
    }

    /// The logical packet view.
    pub fn logical(&self) -> &[u8] {
        &self.storage[self.pre_buffer_size..]
    }

    pub fn logical_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.pre_buffer_size..]
    }

    /// Copy `block` into the logical view at `offset`.
    pub fn write_at(&mut self, offset: usize, block: &[u8]) -> Result<()> {
        let capacity = self.capacity();
        let end = offset.checked_add(block.len()).filter(|end| *end <= capacity);
        let Some(end) = end else {
            return Err(FrameError::Overflow {
                offset,
                len: block.len(),
                capacity,
            });
        };
        self.logical_mut()[offset..end].copy_from_slice(block);
        Ok(())
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self {
            storage: vec![0u8; DEFAULT_PRE_BUFFER_SIZE + 1 + DEFAULT_MAX_PACKET_SIZE]
                .into_boxed_slice(),
            pre_buffer_size: DEFAULT_PRE_BUFFER_SIZE,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

/// An outgoing packet with reserved headroom for the type tag.
#[derive(Debug, Clone)]
pub struct OutgoingPacket {
    buf: BytesMut,
    headroom: usize,
}

impl OutgoingPacket {
    /// Create an empty packet with the default headroom.
    pub fn new() -> Self {
        Self::with_headroom_unchecked(DEFAULT_PRE_BUFFER_SIZE, 0)
    }

    /// Create an empty packet reserving `headroom` bytes before the payload.
    pub fn with_headroom(headroom: usize) -> Result<Self> {
        if headroom == 0 {
            return Err(FrameError::InvalidPreBuffer);
        }
        Ok(Self::with_headroom_unchecked(headroom, 0))
    }

    /// Create a packet holding `payload` (header + parameters/data).
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut packet = Self::with_headroom_unchecked(DEFAULT_PRE_BUFFER_SIZE, payload.len());
        packet.buf.put_slice(payload);
        packet
    }

    /// Build an HCI command: opcode (LE), parameter length, parameters.
    pub fn command(opcode: u16, params: &[u8]) -> Result<Self> {
        if params.len() > u8::MAX as usize {
            return Err(FrameError::Overflow {
                offset: COMMAND_HEADER_SIZE,
                len: params.len(),
                capacity: u8::MAX as usize,
            });
        }
        let mut packet =
            Self::with_headroom_unchecked(DEFAULT_PRE_BUFFER_SIZE, COMMAND_HEADER_SIZE + params.len());
        packet.buf.put_u16_le(opcode);
        packet.buf.put_u8(params.len() as u8);
        packet.buf.put_slice(params);
        Ok(packet)
    }

    fn with_headroom_unchecked(headroom: usize, payload_capacity: usize) -> Self {
        let mut buf = BytesMut::with_capacity(headroom + payload_capacity);
        buf.put_bytes(0, headroom);
        Self { buf, headroom }
    }

    /// Append payload bytes.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Bytes reserved in front of the payload.
    pub fn headroom(&self) -> usize {
        self.headroom
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[self.headroom..]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.headroom..]
    }

    /// Payload length, excluding the type tag.
    pub fn len(&self) -> usize {
        self.buf.len() - self.headroom
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `packet_type` into the byte before the payload and return
    /// tag + payload. The payload is not copied.
    pub fn into_wire(self, packet_type: PacketType) -> Bytes {
        let mut buf = self.buf;
        let start = self.headroom - 1;
        buf[start] = packet_type.tag();
        buf.split_off(start).freeze()
    }
}

impl Default for OutgoingPacket {
    fn default() -> Self {
        Self::new()
    }
}
