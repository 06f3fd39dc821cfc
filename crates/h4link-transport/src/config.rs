use h4link_uart::{FlowControl, UartConfig, DEFAULT_BAUDRATE};

/// Transport configuration, tagged by transport kind.
///
/// Only [`TransportConfig::Uart`] can drive an H4 transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Serial line configuration.
    Uart(UartTransportConfig),
    /// USB transport; not usable with H4.
    Usb,
}

impl TransportConfig {
    /// Convenience constructor for a UART config on `device_name`.
    pub fn uart(device_name: impl Into<String>) -> Self {
        Self::Uart(UartTransportConfig::new(device_name))
    }

    /// Human-readable kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uart(_) => "uart",
            Self::Usb => "usb",
        }
    }
}

impl From<UartTransportConfig> for TransportConfig {
    fn from(config: UartTransportConfig) -> Self {
        Self::Uart(config)
    }
}

/// UART transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartTransportConfig {
    /// Baud rate used when the line is opened.
    pub baudrate_init: u32,
    /// Baud rate the consumer switches to after controller setup, if any.
    pub baudrate_main: Option<u32>,
    /// Hardware flow control.
    pub flow_control: FlowControl,
    /// Serial device, e.g. `/dev/ttyUSB0`.
    pub device_name: Option<String>,
}

impl UartTransportConfig {
    /// Config for `device_name` with default rates and no flow control.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: Some(device_name.into()),
            ..Self::default()
        }
    }

    pub fn with_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate_init = baudrate;
        self
    }

    pub fn with_main_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate_main = Some(baudrate);
        self
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    /// The driver configuration derived from this transport configuration.
    pub fn driver_config(&self) -> UartConfig {
        UartConfig {
            device_name: self.device_name.clone(),
            baudrate: self.baudrate_init,
            flow_control: self.flow_control,
        }
    }
}

impl Default for UartTransportConfig {
    fn default() -> Self {
        Self {
            baudrate_init: DEFAULT_BAUDRATE,
            baudrate_main: None,
            flow_control: FlowControl::None,
            device_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_config_copies_fields() {
        let config = UartTransportConfig::new("/dev/ttyUSB0")
            .with_baudrate(921_600)
            .with_main_baudrate(3_000_000)
            .with_flow_control(FlowControl::RtsCts);

        let driver = config.driver_config();
        assert_eq!(driver.device_name.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(driver.baudrate, 921_600);
        assert_eq!(driver.flow_control, FlowControl::RtsCts);
        assert_eq!(config.baudrate_main, Some(3_000_000));
    }

    #[test]
    fn kinds() {
        assert_eq!(TransportConfig::uart("/dev/ttyS0").kind(), "uart");
        assert_eq!(TransportConfig::Usb.kind(), "usb");
        let config: TransportConfig = UartTransportConfig::default().into();
        assert!(matches!(config, TransportConfig::Uart(_)));
    }
}
