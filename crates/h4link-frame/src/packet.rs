//! HCI packet types and header layout.
//!
//! Every H4 packet starts with a one-byte type tag, followed by a fixed-size
//! header that carries the payload length.

/// Command header: opcode (2, LE) + parameter length (1).
pub const COMMAND_HEADER_SIZE: usize = 3;

/// Event header: event code (1) + parameter length (1).
pub const EVENT_HEADER_SIZE: usize = 2;

/// ACL header: handle + flags (2, LE) + payload length (2, LE).
pub const ACL_HEADER_SIZE: usize = 4;

/// SCO header: handle (2, LE) + payload length (1).
pub const SCO_HEADER_SIZE: usize = 3;

/// Largest event parameter block (8-bit length field).
pub const MAX_EVENT_PAYLOAD: usize = 255;

/// Largest SCO payload (8-bit length field).
pub const MAX_SCO_PAYLOAD: usize = 255;

/// Default ACL payload capacity (EDR 3-DH5 packet).
pub const DEFAULT_ACL_PAYLOAD: usize = 1021;

/// Synthetic event reported when the transport finished sending a packet.
pub const HCI_EVENT_TRANSPORT_PACKET_SENT: u8 = 0x6E;

/// HCI packet type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Host to controller command.
    Command = 0x01,
    /// Asynchronous connection-oriented data.
    Acl = 0x02,
    /// Synchronous connection-oriented data.
    Sco = 0x03,
    /// Controller to host event.
    Event = 0x04,
}

impl PacketType {
    /// Parse a type tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::Acl),
            0x03 => Some(Self::Sco),
            0x04 => Some(Self::Event),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Size of the header following the type tag.
    pub fn header_size(self) -> usize {
        match self {
            Self::Command => COMMAND_HEADER_SIZE,
            Self::Acl => ACL_HEADER_SIZE,
            Self::Sco => SCO_HEADER_SIZE,
            Self::Event => EVENT_HEADER_SIZE,
        }
    }

    /// Payload length declared by `header`, or `None` if `header` is short.
    pub fn payload_len(self, header: &[u8]) -> Option<usize> {
        if header.len() < self.header_size() {
            return None;
        }
        let len = match self {
            Self::Command => header[2] as usize,
            Self::Event => header[1] as usize,
            Self::Acl => u16::from_le_bytes([header[2], header[3]]) as usize,
            Self::Sco => header[2] as usize,
        };
        Some(len)
    }

    /// Whether a controller may send this type to the host.
    pub fn is_receivable(self) -> bool {
        !matches!(self, Self::Command)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Acl => "ACL",
            Self::Sco => "SCO",
            Self::Event => "EVENT",
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = crate::error::FrameError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::from_tag(tag).ok_or(crate::error::FrameError::InvalidPacketType(tag))
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        packet_type.tag()
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_h4() {
        assert_eq!(PacketType::Command.tag(), 0x01);
        assert_eq!(PacketType::Acl.tag(), 0x02);
        assert_eq!(PacketType::Sco.tag(), 0x03);
        assert_eq!(PacketType::Event.tag(), 0x04);
        assert_eq!(PacketType::from_tag(0x04), Some(PacketType::Event));
        assert_eq!(PacketType::from_tag(0x00), None);
        assert_eq!(PacketType::from_tag(0xFF), None);
    }

    #[test]
    fn try_from_rejects_unknown() {
        assert_eq!(
            PacketType::try_from(0x09),
            Err(crate::error::FrameError::InvalidPacketType(0x09))
        );
        assert_eq!(PacketType::try_from(0x02), Ok(PacketType::Acl));
    }

    #[test]
    fn payload_len_per_type() {
        assert_eq!(PacketType::Event.payload_len(&[0x0E, 0x04]), Some(4));
        assert_eq!(PacketType::Acl.payload_len(&[0x01, 0x20, 0x10, 0x01]), Some(0x0110));
        assert_eq!(PacketType::Sco.payload_len(&[0x01, 0x00, 0x30]), Some(0x30));
        assert_eq!(PacketType::Command.payload_len(&[0x03, 0x0C, 0x00]), Some(0));
        assert_eq!(PacketType::Acl.payload_len(&[0x01, 0x20]), None);
    }

    #[test]
    fn command_is_not_receivable() {
        assert!(!PacketType::Command.is_receivable());
        assert!(PacketType::Event.is_receivable());
        assert!(PacketType::Acl.is_receivable());
        assert!(PacketType::Sco.is_receivable());
    }
}
