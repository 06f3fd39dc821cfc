use h4link_frame::{
    FrameState, H4Framer, OutgoingPacket, PacketBuffer, PacketType,
    HCI_EVENT_TRANSPORT_PACKET_SENT,
};
use h4link_uart::{Completion, SerialDriver, UartConfig};
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::handler::{NoopHandler, PacketHandler};

/// H4 transport over a block-oriented serial driver.
///
/// All state changes happen on the caller's thread: requests go out to the
/// driver immediately, and completions come back through [`poll`] (or
/// [`handle_completion`] for drivers that push them). At most one send is in
/// flight; consumers check [`can_send_now`] before [`send_packet`].
///
/// [`poll`]: H4Transport::poll
/// [`handle_completion`]: H4Transport::handle_completion
/// [`can_send_now`]: H4Transport::can_send_now
/// [`send_packet`]: H4Transport::send_packet
pub struct H4Transport<D> {
    driver: D,
    uart_config: Option<UartConfig>,
    baudrate_main: Option<u32>,
    framer: H4Framer,
    handler: Box<dyn PacketHandler>,
    write_active: bool,
    open: bool,
}

impl<D: SerialDriver> H4Transport<D> {
    /// Transport name.
    pub const NAME: &'static str = "H4";

    /// Create a transport over `driver` with the default packet buffer.
    pub fn new(driver: D) -> Self {
        Self::with_buffer(driver, PacketBuffer::default())
    }

    /// Create a transport that receives into `buffer`.
    pub fn with_buffer(driver: D, buffer: PacketBuffer) -> Self {
        Self {
            driver,
            uart_config: None,
            baudrate_main: None,
            framer: H4Framer::with_buffer(buffer),
            handler: Box::new(NoopHandler),
            write_active: false,
            open: false,
        }
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Configure the driver from a UART transport configuration.
    ///
    /// Any other configuration kind is rejected and leaves the transport
    /// untouched.
    pub fn init(&mut self, config: &TransportConfig) -> Result<()> {
        let TransportConfig::Uart(uart) = config else {
            error!(kind = config.kind(), "h4 transport: config is not a UART config");
            return Err(TransportError::InvalidConfig(format!(
                "expected uart config, got {}",
                config.kind()
            )));
        };

        let driver_config = uart.driver_config();
        self.driver.init(&driver_config);
        debug!(
            device = ?driver_config.device_name,
            baudrate = driver_config.baudrate,
            flow_control = ?driver_config.flow_control,
            "h4 transport initialized"
        );
        self.uart_config = Some(driver_config);
        self.baudrate_main = uart.baudrate_main;
        Ok(())
    }

    /// Open the driver and start reading the first packet.
    ///
    /// A driver error is returned unchanged and leaves the receive state as
    /// it was.
    pub fn open(&mut self) -> Result<()> {
        if self.uart_config.is_none() {
            error!("h4 transport: open before init");
            return Err(TransportError::NotInitialized);
        }

        self.driver.open()?;

        self.framer.reset();
        self.write_active = false;
        self.open = true;
        info!("h4 transport open");
        self.trigger_next_read();
        Ok(())
    }

    /// Close the driver. The registered handler is kept.
    pub fn close(&mut self) -> Result<()> {
        let result = self.driver.close();
        self.write_active = false;
        self.open = false;
        info!("h4 transport closed");
        result.map_err(Into::into)
    }

    /// Replace the packet handler.
    pub fn register_packet_handler<H>(&mut self, handler: H)
    where
        H: PacketHandler + 'static,
    {
        self.handler = Box::new(handler);
    }

    /// Whether `send_packet` may be called. Independent of packet type.
    pub fn can_send_now(&self, _packet_type: PacketType) -> bool {
        !self.write_active
    }

    /// Queue `packet` for transmission with `packet_type` as its tag.
    ///
    /// Returns as soon as the driver has the request. Completion is reported
    /// to the handler as a transport-packet-sent event.
    pub fn send_packet(&mut self, packet_type: PacketType, packet: OutgoingPacket) -> Result<()> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if self.write_active {
            warn!(%packet_type, "send while previous packet still in flight");
            return Err(TransportError::WriteInFlight);
        }

        let wire = packet.into_wire(packet_type);
        debug!(%packet_type, len = wire.len(), "sending packet");
        self.write_active = true;
        self.driver.send_block(wire);
        Ok(())
    }

    /// Change the line speed.
    pub fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        info!(baudrate, "h4 transport set baud rate");
        self.driver.set_baudrate(baudrate)?;
        Ok(())
    }

    /// Driver callback: the requested receive block is filled.
    pub fn on_block_received(&mut self, block: &[u8]) {
        let handler = &mut self.handler;
        let result = self
            .framer
            .block_received(block, |packet_type, packet| {
                handler.handle_packet(packet_type, packet)
            });
        if let Err(err) = result {
            error!(%err, "h4 framing error, waiting for next packet type");
        }
        self.trigger_next_read();
    }

    /// Driver callback: the outstanding send has been written.
    pub fn on_block_sent(&mut self) {
        self.write_active = false;

        let event = [HCI_EVENT_TRANSPORT_PACKET_SENT, 0];
        self.handler.handle_packet(PacketType::Event, &event);
    }

    /// Route a driver completion to the matching callback.
    pub fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::BlockReceived(block) => self.on_block_received(&block),
            Completion::BlockSent => self.on_block_sent(),
        }
    }

    /// Process at most one driver completion. Returns whether one was handled.
    ///
    /// A driver error ends any send in flight: the send gate reopens and no
    /// packet-sent event is reported for it. The line itself may need to be
    /// closed and reopened before it is usable again.
    pub fn poll(&mut self) -> Result<bool> {
        let completion = match self.driver.poll_completion() {
            Ok(completion) => completion,
            Err(err) => {
                if self.write_active {
                    warn!(%err, "driver error, dropping packet in flight");
                    self.write_active = false;
                }
                return Err(err.into());
            }
        };
        match completion {
            Some(completion) => {
                self.handle_completion(completion);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Process completions until the driver has none ready.
    pub fn drain(&mut self) -> Result<usize> {
        let mut handled = 0usize;
        while self.poll()? {
            handled = handled.saturating_add(1);
        }
        Ok(handled)
    }

    fn trigger_next_read(&mut self) {
        let request = self.framer.next_read();
        self.driver.receive_block(request.len);
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Driver configuration applied by the last successful `init`.
    pub fn uart_config(&self) -> Option<&UartConfig> {
        self.uart_config.as_ref()
    }

    /// Post-setup baud rate from the configuration, if any.
    pub fn baudrate_main(&self) -> Option<u32> {
        self.baudrate_main
    }

    /// Current receive state.
    pub fn frame_state(&self) -> FrameState {
        self.framer.state()
    }

    /// Bytes of the current packet received so far, type tag included.
    pub fn partial_len(&self) -> usize {
        self.framer.read_pos()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D> std::fmt::Debug for H4Transport<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H4Transport")
            .field("open", &self.open)
            .field("write_active", &self.write_active)
            .field("state", &self.framer.state())
            .finish()
    }
}
