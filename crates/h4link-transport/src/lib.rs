//! H4 HCI transport.
//!
//! Wires a [`SerialDriver`](h4link_uart::SerialDriver) to the H4 framer:
//! received bytes become packets for the registered [`PacketHandler`], and
//! outgoing packets get their type tag and go out one at a time.

pub mod config;
pub mod error;
pub mod handler;
pub mod transport;

pub use config::{TransportConfig, UartTransportConfig};
pub use error::{Result, TransportError};
pub use handler::{NoopHandler, PacketHandler, PacketQueue};
pub use transport::H4Transport;
