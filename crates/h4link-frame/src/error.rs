/// Errors that can occur while framing H4 packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The byte at a packet boundary is not a receivable packet type.
    #[error("invalid packet type 0x{0:02x}")]
    InvalidPacketType(u8),

    /// An ACL header declares more payload than the packet buffer can hold.
    #[error("invalid ACL payload len {len} - only space for {max}")]
    AclTooLarge { len: usize, max: usize },

    /// A completed receive block does not match the requested length.
    #[error("unexpected block length {actual} (requested {expected})")]
    UnexpectedBlockLength { expected: usize, actual: usize },

    /// A write into the packet buffer would run past its end.
    #[error("buffer overflow: {len} bytes at offset {offset} exceed capacity {capacity}")]
    Overflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// The configured packet size cannot hold the largest event or SCO packet.
    #[error("packet buffer too small ({size} bytes, min {min})")]
    BufferTooSmall { size: usize, min: usize },

    /// The pre-buffer must leave room for at least the packet type tag.
    #[error("pre-buffer must be at least 1 byte")]
    InvalidPreBuffer,
}

pub type Result<T> = std::result::Result<T, FrameError>;
