//! In-memory serial driver.
//!
//! `MockUart` keeps received bytes in a queue and records every transmitted
//! block, so transports can be exercised without hardware. It is also what
//! the CLI uses to decode captured byte streams offline.

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{DriverError, Result};
use crate::traits::{Completion, SerialDriver, UartConfig};

/// In-memory [`SerialDriver`].
///
/// ```
/// use h4link_uart::{Completion, MockUart, SerialDriver};
///
/// let mut uart = MockUart::new();
/// uart.open().unwrap();
/// uart.inject_rx(&[0x04, 0x0E]);
/// uart.receive_block(2);
/// let completion = uart.poll_completion().unwrap();
/// assert_eq!(completion, Some(Completion::BlockReceived(vec![0x04, 0x0E].into())));
/// ```
#[derive(Debug)]
pub struct MockUart {
    config: UartConfig,
    open: bool,
    rx: VecDeque<u8>,
    pending_read: Option<usize>,
    read_requests: Vec<usize>,
    send_pending: bool,
    send_ready: bool,
    auto_complete_sends: bool,
    sent_blocks: Vec<Bytes>,
    baudrates: Vec<u32>,
    fail_next_open: Option<DriverError>,
    fail_next_poll: Option<DriverError>,
}

impl Default for MockUart {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUart {
    /// Create a closed mock driver that completes sends automatically.
    pub fn new() -> Self {
        Self {
            config: UartConfig::default(),
            open: false,
            rx: VecDeque::new(),
            pending_read: None,
            read_requests: Vec::new(),
            send_pending: false,
            send_ready: false,
            auto_complete_sends: true,
            sent_blocks: Vec::new(),
            baudrates: Vec::new(),
            fail_next_open: None,
            fail_next_poll: None,
        }
    }

    /// Queue bytes as if they had arrived on the line.
    pub fn inject_rx(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    /// Bytes received but not yet handed out by a completion.
    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    /// When `false`, send completions are held until [`complete_send`] is called.
    ///
    /// [`complete_send`]: MockUart::complete_send
    pub fn set_auto_complete_sends(&mut self, enabled: bool) {
        self.auto_complete_sends = enabled;
    }

    /// Release the completion of the outstanding send, if any.
    pub fn complete_send(&mut self) {
        if self.send_pending {
            self.send_ready = true;
        }
    }

    /// Make the next `open` fail with `err`.
    pub fn fail_next_open(&mut self, err: DriverError) {
        self.fail_next_open = Some(err);
    }

    /// Make the next `poll_completion` on an open line fail with `err`.
    ///
    /// Like a failed write on a real line, the failure drops any pending send.
    pub fn fail_next_poll(&mut self, err: DriverError) {
        self.fail_next_poll = Some(err);
    }

    /// Every block handed to `send_block`, in order.
    pub fn sent_blocks(&self) -> &[Bytes] {
        &self.sent_blocks
    }

    /// All transmitted bytes concatenated.
    pub fn tx_bytes(&self) -> Vec<u8> {
        self.sent_blocks.iter().flat_map(|b| b.iter().copied()).collect()
    }

    /// Length of the outstanding receive request.
    pub fn pending_read(&self) -> Option<usize> {
        self.pending_read
    }

    /// Lengths of all receive requests issued since creation.
    pub fn read_requests(&self) -> &[usize] {
        &self.read_requests
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Current line speed.
    pub fn baudrate(&self) -> u32 {
        self.config.baudrate
    }

    /// Baud rates applied through `set_baudrate`, in order.
    pub fn baudrate_changes(&self) -> &[u32] {
        &self.baudrates
    }
}

impl SerialDriver for MockUart {
    fn init(&mut self, config: &UartConfig) {
        self.config = config.clone();
    }

    fn open(&mut self) -> Result<()> {
        if let Some(err) = self.fail_next_open.take() {
            return Err(err);
        }
        self.open = true;
        debug!(baudrate = self.config.baudrate, "mock uart opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        self.pending_read = None;
        self.send_pending = false;
        self.send_ready = false;
        debug!("mock uart closed");
        Ok(())
    }

    fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        self.config.baudrate = baudrate;
        self.baudrates.push(baudrate);
        Ok(())
    }

    fn receive_block(&mut self, len: usize) {
        if self.pending_read.is_some() {
            warn!(len, "receive requested while another receive is pending");
        }
        self.pending_read = Some(len);
        self.read_requests.push(len);
    }

    fn send_block(&mut self, block: Bytes) {
        if self.send_pending {
            warn!(len = block.len(), "send requested while another send is pending");
        }
        self.sent_blocks.push(block);
        self.send_pending = true;
        self.send_ready = self.auto_complete_sends;
    }

    fn poll_completion(&mut self) -> Result<Option<Completion>> {
        if !self.open {
            return Ok(None);
        }

        if let Some(err) = self.fail_next_poll.take() {
            self.send_pending = false;
            self.send_ready = false;
            return Err(err);
        }

        if self.send_pending && self.send_ready {
            self.send_pending = false;
            self.send_ready = false;
            return Ok(Some(Completion::BlockSent));
        }

        match self.pending_read {
            Some(len) if self.rx.len() >= len => {
                self.pending_read = None;
                let block: Vec<u8> = self.rx.drain(..len).collect();
                Ok(Some(Completion::BlockReceived(Bytes::from(block))))
            }
            _ => Ok(None),
        }
    }
}
