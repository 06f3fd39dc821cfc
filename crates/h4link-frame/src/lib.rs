//! H4 packet framing for HCI over a byte-oriented serial link.
//!
//! Every packet on the wire is:
//! - A 1-byte packet type tag (command, ACL, SCO, event)
//! - A fixed-size header for that type, carrying the payload length
//! - The payload
//!
//! The link has no delimiters. [`H4Framer`] recovers packet boundaries by
//! reading the tag, then the header, then exactly the declared payload.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod framer;
pub mod packet;

pub use buffer::{
    OutgoingPacket, PacketBuffer, DEFAULT_MAX_PACKET_SIZE, DEFAULT_PRE_BUFFER_SIZE,
    MIN_MAX_PACKET_SIZE,
};
pub use codec::{encode_packet, Packet};
pub use error::{FrameError, Result};
pub use framer::{FrameState, H4Framer, ReadRequest};
pub use packet::{
    PacketType, ACL_HEADER_SIZE, COMMAND_HEADER_SIZE, EVENT_HEADER_SIZE,
    HCI_EVENT_TRANSPORT_PACKET_SENT, SCO_HEADER_SIZE,
};
