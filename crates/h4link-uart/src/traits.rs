use bytes::Bytes;

use crate::error::Result;

/// Default UART baud rate used before a controller is switched to its main rate.
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Hardware flow control mode for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No hardware flow control.
    #[default]
    None,
    /// RTS/CTS handshaking.
    RtsCts,
}

impl FlowControl {
    /// Build from the boolean flag used by most board configurations.
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::RtsCts
        } else {
            Self::None
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::RtsCts)
    }
}

/// Configuration handed to a [`SerialDriver`] at init time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartConfig {
    /// Device identifier, e.g. `/dev/ttyUSB0`. Optional for in-memory drivers.
    pub device_name: Option<String>,
    /// Baud rate applied when the device is opened.
    pub baudrate: u32,
    /// Flow control mode applied when the device is opened.
    pub flow_control: FlowControl,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            baudrate: DEFAULT_BAUDRATE,
            flow_control: FlowControl::None,
        }
    }
}

/// A completed asynchronous driver request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A requested receive block has been filled.
    ///
    /// The block length always equals the length passed to
    /// [`SerialDriver::receive_block`].
    BlockReceived(Bytes),
    /// The block passed to [`SerialDriver::send_block`] has been written.
    BlockSent,
}

/// Block-oriented serial driver.
///
/// Requests (`receive_block`, `send_block`) return immediately. The matching
/// completions are reported, in issue order, through [`poll_completion`]
/// on the caller's execution context. At most one receive and one send
/// request are outstanding at any time.
///
/// [`poll_completion`]: SerialDriver::poll_completion
pub trait SerialDriver {
    /// Store the configuration used by the next `open`.
    fn init(&mut self, config: &UartConfig);

    /// Open the line.
    fn open(&mut self) -> Result<()>;

    /// Close the line. Pending requests are dropped and produce no completion.
    fn close(&mut self) -> Result<()>;

    /// Change the line speed.
    fn set_baudrate(&mut self, baudrate: u32) -> Result<()>;

    /// Request exactly `len` bytes. `len == 0` completes with an empty block.
    fn receive_block(&mut self, len: usize);

    /// Request transmission of `block`.
    fn send_block(&mut self, block: Bytes);

    /// Return the next completion, or `None` when nothing is ready.
    fn poll_completion(&mut self) -> Result<Option<Completion>>;
}

impl<D: SerialDriver + ?Sized> SerialDriver for Box<D> {
    fn init(&mut self, config: &UartConfig) {
        (**self).init(config)
    }

    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        (**self).set_baudrate(baudrate)
    }

    fn receive_block(&mut self, len: usize) {
        (**self).receive_block(len)
    }

    fn send_block(&mut self, block: Bytes) {
        (**self).send_block(block)
    }

    fn poll_completion(&mut self) -> Result<Option<Completion>> {
        (**self).poll_completion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = UartConfig::default();
        assert_eq!(config.baudrate, DEFAULT_BAUDRATE);
        assert_eq!(config.flow_control, FlowControl::None);
        assert!(config.device_name.is_none());
    }

    #[test]
    fn flow_control_from_flag() {
        assert_eq!(FlowControl::from_enabled(true), FlowControl::RtsCts);
        assert_eq!(FlowControl::from_enabled(false), FlowControl::None);
        assert!(FlowControl::RtsCts.is_enabled());
        assert!(!FlowControl::None.is_enabled());
    }
}
