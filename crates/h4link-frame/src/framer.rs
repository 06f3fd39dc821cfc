use tracing::trace;

use crate::buffer::PacketBuffer;
use crate::error::{FrameError, Result};
use crate::packet::{PacketType, ACL_HEADER_SIZE};

/// Receive state of the H4 framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    AwaitingType,
    AwaitingEventHeader,
    AwaitingAclHeader,
    AwaitingScoHeader,
    AwaitingPayload,
}

/// The next block the framer wants from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Offset into the logical packet view.
    pub offset: usize,
    /// Number of bytes to read. May be zero.
    pub len: usize,
}

/// Incremental H4 receive state machine.
///
/// Each state requests exactly the bytes needed to learn the size of the
/// next chunk, so the framer never reads past a packet boundary and never
/// holds more than one packet.
#[derive(Debug, Clone)]
pub struct H4Framer {
    buffer: PacketBuffer,
    state: FrameState,
    read_pos: usize,
    bytes_to_read: usize,
}

impl H4Framer {
    /// Create a framer with the default buffer layout.
    pub fn new() -> Self {
        Self::with_buffer(PacketBuffer::default())
    }

    /// Create a framer that receives into `buffer`.
    pub fn with_buffer(buffer: PacketBuffer) -> Self {
        Self {
            buffer,
            state: FrameState::AwaitingType,
            read_pos: 0,
            bytes_to_read: 1,
        }
    }

    /// Return to `AwaitingType`, discarding any partial packet.
    pub fn reset(&mut self) {
        self.state = FrameState::AwaitingType;
        self.read_pos = 0;
        self.bytes_to_read = 1;
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn bytes_to_read(&self) -> usize {
        self.bytes_to_read
    }

    pub fn buffer(&self) -> &PacketBuffer {
        &self.buffer
    }

    /// The block to request next.
    pub fn next_read(&self) -> ReadRequest {
        debug_assert!(self.read_pos + self.bytes_to_read <= self.buffer.capacity());
        ReadRequest {
            offset: self.read_pos,
            len: self.bytes_to_read,
        }
    }

    /// Consume a completed receive block.
    ///
    /// `block` must hold exactly the bytes of the last [`ReadRequest`]. When
    /// the block completes a packet, `on_packet` is called with the type and
    /// header + payload. Errors discard the partial packet and leave the
    /// framer waiting for a new type tag.
    pub fn block_received<F>(&mut self, block: &[u8], on_packet: F) -> Result<()>
    where
        F: FnOnce(PacketType, &[u8]),
    {
        let result = self.step(block, on_packet);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn step<F>(&mut self, block: &[u8], on_packet: F) -> Result<()>
    where
        F: FnOnce(PacketType, &[u8]),
    {
        if block.len() != self.bytes_to_read {
            return Err(FrameError::UnexpectedBlockLength {
                expected: self.bytes_to_read,
                actual: block.len(),
            });
        }
        self.buffer.write_at(self.read_pos, block)?;
        self.read_pos += self.bytes_to_read;

        let packet = self.buffer.logical();
        match self.state {
            FrameState::AwaitingType => {
                let packet_type = PacketType::from_tag(packet[0])
                    .filter(|packet_type| packet_type.is_receivable())
                    .ok_or(FrameError::InvalidPacketType(packet[0]))?;
                self.bytes_to_read = packet_type.header_size();
                self.state = match packet_type {
                    PacketType::Acl => FrameState::AwaitingAclHeader,
                    PacketType::Sco => FrameState::AwaitingScoHeader,
                    _ => FrameState::AwaitingEventHeader,
                };
            }
            FrameState::AwaitingEventHeader => {
                self.bytes_to_read = packet[2] as usize;
                self.state = FrameState::AwaitingPayload;
            }
            FrameState::AwaitingAclHeader => {
                let len = u16::from_le_bytes([packet[3], packet[4]]) as usize;
                let max_packet_size = self.buffer.max_packet_size();
                if ACL_HEADER_SIZE + len > max_packet_size {
                    return Err(FrameError::AclTooLarge {
                        len,
                        max: max_packet_size - ACL_HEADER_SIZE,
                    });
                }
                self.bytes_to_read = len;
                self.state = FrameState::AwaitingPayload;
            }
            FrameState::AwaitingScoHeader => {
                self.bytes_to_read = packet[3] as usize;
                self.state = FrameState::AwaitingPayload;
            }
            FrameState::AwaitingPayload => {
                let packet_type = PacketType::try_from(packet[0])?;
                trace!(%packet_type, len = self.read_pos - 1, "packet complete");
                on_packet(packet_type, &packet[1..self.read_pos]);
                self.reset();
            }
        }
        Ok(())
    }
}

impl Default for H4Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_packet, Packet};

    /// Drive `framer` with `stream`, honouring each read request, until the
    /// stream cannot satisfy the next one.
    fn feed(framer: &mut H4Framer, stream: &[u8]) -> (Vec<Packet>, Vec<FrameError>) {
        let mut packets = Vec::new();
        let mut errors = Vec::new();
        let mut pos = 0usize;
        loop {
            let request = framer.next_read();
            if pos + request.len > stream.len() {
                break;
            }
            let block = &stream[pos..pos + request.len];
            pos += request.len;
            let result = framer.block_received(block, |packet_type, data| {
                packets.push(Packet::new(packet_type, data.to_vec()));
            });
            if let Err(err) = result {
                errors.push(err);
            }
        }
        (packets, errors)
    }

    fn wire(packets: &[(PacketType, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (packet_type, data) in packets {
            encode_packet(*packet_type, data, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn initial_state() {
        let framer = H4Framer::new();
        assert_eq!(framer.state(), FrameState::AwaitingType);
        assert_eq!(framer.next_read(), ReadRequest { offset: 0, len: 1 });
    }

    #[test]
    fn event_packet_delivered() {
        let mut framer = H4Framer::new();
        let (packets, errors) = feed(&mut framer, &[0x04, 0x0E, 0x02, 0xAB, 0xCD]);

        assert!(errors.is_empty());
        assert_eq!(
            packets,
            vec![Packet::new(PacketType::Event, vec![0x0E, 0x02, 0xAB, 0xCD])]
        );
        assert_eq!(packets[0].data.len(), 4);
        assert_eq!(framer.state(), FrameState::AwaitingType);
    }

    #[test]
    fn read_requests_follow_headers() {
        let mut framer = H4Framer::new();
        framer.block_received(&[0x02], |_, _| {}).unwrap();
        assert_eq!(framer.state(), FrameState::AwaitingAclHeader);
        assert_eq!(framer.next_read(), ReadRequest { offset: 1, len: 4 });

        framer.block_received(&[0x01, 0x00, 0x03, 0x00], |_, _| {}).unwrap();
        assert_eq!(framer.state(), FrameState::AwaitingPayload);
        assert_eq!(framer.next_read(), ReadRequest { offset: 5, len: 3 });

        let mut delivered = None;
        framer
            .block_received(&[0xAA, 0xBB, 0xCC], |packet_type, data| {
                delivered = Some((packet_type, data.to_vec()));
            })
            .unwrap();
        assert_eq!(
            delivered,
            Some((PacketType::Acl, vec![0x01, 0x00, 0x03, 0x00, 0xAA, 0xBB, 0xCC]))
        );
        assert_eq!(framer.next_read(), ReadRequest { offset: 0, len: 1 });
    }

    #[test]
    fn back_to_back_packets() {
        let event: &[u8] = &[0x13, 0x05, 0x01, 0x40, 0x00, 0x01, 0x00];
        let acl: &[u8] = &[0x40, 0x20, 0x02, 0x00, 0x11, 0x22];
        let sco: &[u8] = &[0x01, 0x00, 0x03, 0x7F, 0x80, 0x81];
        let stream = wire(&[
            (PacketType::Event, event),
            (PacketType::Acl, acl),
            (PacketType::Sco, sco),
            (PacketType::Event, event),
        ]);

        let mut framer = H4Framer::new();
        let (packets, errors) = feed(&mut framer, &stream);

        assert!(errors.is_empty());
        assert_eq!(packets.len(), 4);
        assert_eq!(packets[0], Packet::new(PacketType::Event, event.to_vec()));
        assert_eq!(packets[1], Packet::new(PacketType::Acl, acl.to_vec()));
        assert_eq!(packets[2], Packet::new(PacketType::Sco, sco.to_vec()));
        assert_eq!(packets[3], Packet::new(PacketType::Event, event.to_vec()));
    }

    #[test]
    fn reported_length_is_header_plus_payload() {
        let params = [0x5Au8; 200];
        let mut event = vec![0x0E, params.len() as u8];
        event.extend_from_slice(&params);

        let mut framer = H4Framer::new();
        let (packets, _) = feed(&mut framer, &wire(&[(PacketType::Event, &event)]));
        assert_eq!(packets[0].data.len(), 2 + 200);
    }

    #[test]
    fn zero_length_event_payload() {
        let mut framer = H4Framer::new();
        framer.block_received(&[0x04], |_, _| {}).unwrap();
        framer.block_received(&[0x6E, 0x00], |_, _| {}).unwrap();
        assert_eq!(framer.next_read(), ReadRequest { offset: 3, len: 0 });

        let mut delivered = Vec::new();
        framer
            .block_received(&[], |packet_type, data| {
                delivered.push((packet_type, data.to_vec()));
            })
            .unwrap();
        assert_eq!(delivered, vec![(PacketType::Event, vec![0x6E, 0x00])]);
        assert_eq!(framer.state(), FrameState::AwaitingType);
    }

    #[test]
    fn invalid_tag_resyncs_on_next_byte() {
        let mut stream = vec![0xFF];
        stream.extend_from_slice(&[0x02, 0x01, 0x00, 0x01, 0x00, 0x99]);

        let mut framer = H4Framer::new();
        let (packets, errors) = feed(&mut framer, &stream);

        assert_eq!(errors, vec![FrameError::InvalidPacketType(0xFF)]);
        assert_eq!(
            packets,
            vec![Packet::new(PacketType::Acl, vec![0x01, 0x00, 0x01, 0x00, 0x99])]
        );
    }

    #[test]
    fn command_tag_is_not_receivable() {
        let mut framer = H4Framer::new();
        let err = framer.block_received(&[0x01], |_, _| {}).unwrap_err();
        assert_eq!(err, FrameError::InvalidPacketType(0x01));
        assert_eq!(framer.state(), FrameState::AwaitingType);
        assert_eq!(framer.next_read(), ReadRequest { offset: 0, len: 1 });
    }

    #[test]
    fn oversized_acl_is_discarded() {
        let buffer = PacketBuffer::new(1, 300).unwrap();
        let mut framer = H4Framer::with_buffer(buffer);

        framer.block_received(&[0x02], |_, _| {}).unwrap();
        // 0x0200 = 512 bytes declared, only 296 fit.
        let err = framer
            .block_received(&[0x01, 0x00, 0x00, 0x02], |_, _| {})
            .unwrap_err();

        assert_eq!(err, FrameError::AclTooLarge { len: 512, max: 296 });
        assert_eq!(framer.state(), FrameState::AwaitingType);
        assert_eq!(framer.next_read(), ReadRequest { offset: 0, len: 1 });

        let (packets, errors) = feed(&mut framer, &[0x04, 0x0E, 0x01, 0x00]);
        assert!(errors.is_empty());
        assert_eq!(packets, vec![Packet::new(PacketType::Event, vec![0x0E, 0x01, 0x00])]);
    }

    #[test]
    fn acl_filling_buffer_exactly_is_accepted() {
        let buffer = PacketBuffer::new(1, 300).unwrap();
        let mut framer = H4Framer::with_buffer(buffer);
        let mut acl = vec![0x01, 0x00];
        acl.extend_from_slice(&296u16.to_le_bytes());
        acl.extend(std::iter::repeat(0xEE).take(296));

        let (packets, errors) = feed(&mut framer, &wire(&[(PacketType::Acl, &acl)]));
        assert!(errors.is_empty());
        assert_eq!(packets[0].data.len(), 300);

        let mut too_big = vec![0x02, 0x01, 0x00];
        too_big.extend_from_slice(&297u16.to_le_bytes());
        let (packets, errors) = feed(&mut framer, &too_big);
        assert!(packets.is_empty());
        assert_eq!(errors, vec![FrameError::AclTooLarge { len: 297, max: 296 }]);
    }

    #[test]
    fn max_sco_and_event_fit_minimum_buffer() {
        let buffer = PacketBuffer::new(1, crate::buffer::MIN_MAX_PACKET_SIZE).unwrap();
        let mut framer = H4Framer::with_buffer(buffer);

        let mut sco = vec![0x01, 0x00, 0xFF];
        sco.extend(std::iter::repeat(0x11).take(255));
        let mut event = vec![0x3E, 0xFF];
        event.extend(std::iter::repeat(0x22).take(255));

        let stream = wire(&[(PacketType::Sco, &sco), (PacketType::Event, &event)]);
        let (packets, errors) = feed(&mut framer, &stream);
        assert!(errors.is_empty());
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data.len(), 258);
        assert_eq!(packets[1].data.len(), 257);
    }

    #[test]
    fn wrong_block_length_resets() {
        let mut framer = H4Framer::new();
        framer.block_received(&[0x04], |_, _| {}).unwrap();
        let err = framer.block_received(&[0x0E], |_, _| {}).unwrap_err();
        assert_eq!(
            err,
            FrameError::UnexpectedBlockLength {
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(framer.state(), FrameState::AwaitingType);
    }

    #[test]
    fn reset_discards_partial_packet() {
        let mut framer = H4Framer::new();
        framer.block_received(&[0x03], |_, _| {}).unwrap();
        framer.block_received(&[0x01, 0x00, 0x02], |_, _| {}).unwrap();
        assert_eq!(framer.read_pos(), 4);

        framer.reset();
        assert_eq!(framer.state(), FrameState::AwaitingType);
        assert_eq!(framer.read_pos(), 0);
        assert_eq!(framer.bytes_to_read(), 1);
    }
}
