//! Bluetooth HCI H4 transport over serial links.
//!
//! h4link frames the byte stream between a host stack and a Bluetooth
//! controller into HCI packets, and frames outgoing packets for the wire.
//!
//! # Crate Structure
//!
//! - [`uart`]: Serial driver abstraction (POSIX tty, in-memory mock)
//! - [`frame`]: H4 packet types, buffers, and the receive state machine
//! - [`transport`]: The H4 transport: lifecycle, send gate, packet dispatch

/// Re-export serial driver types.
pub mod uart {
    pub use h4link_uart::*;
}

/// Re-export frame types.
pub mod frame {
    pub use h4link_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use h4link_transport::*;
}

pub use h4link_frame::{OutgoingPacket, Packet, PacketType};
pub use h4link_transport::{H4Transport, PacketHandler, TransportConfig, UartTransportConfig};
