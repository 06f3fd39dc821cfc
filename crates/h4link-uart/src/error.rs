use std::path::PathBuf;

/// Errors that can occur in serial driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Failed to open the serial device.
    #[error("failed to open {device}: {source}")]
    Open {
        device: PathBuf,
        source: std::io::Error,
    },

    /// No device was named in the driver configuration.
    #[error("no serial device configured")]
    MissingDevice,

    /// The driver was used before `open` succeeded.
    #[error("serial device is not open")]
    NotOpen,

    /// The requested baud rate cannot be expressed by the driver.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudrate(u32),

    /// An I/O error occurred on the serial line.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end of the line went away.
    #[error("serial line closed")]
    Closed,
}

impl DriverError {
    /// Integer error code for callers that speak the C-style transport API.
    ///
    /// Returns the raw OS error when one is available, `-1` otherwise.
    pub fn code(&self) -> i32 {
        match self {
            DriverError::Open { source, .. } | DriverError::Io(source) => {
                source.raw_os_error().unwrap_or(-1)
            }
            _ => -1,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
