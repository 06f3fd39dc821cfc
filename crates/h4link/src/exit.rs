use std::fmt;
use std::io;

use h4link_frame::FrameError;
use h4link_transport::TransportError;
use h4link_uart::DriverError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => TRANSPORT_ERROR,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(&err), format!("{context}: {err}"))
}

pub fn driver_error(context: &str, err: DriverError) -> CliError {
    let code = match &err {
        DriverError::Open { source, .. } | DriverError::Io(source) => io_code(source),
        DriverError::MissingDevice | DriverError::UnsupportedBaudrate(_) => USAGE,
        DriverError::NotOpen | DriverError::Closed => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Driver(err) => driver_error(context, err),
        TransportError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::NotInitialized => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::BufferTooSmall { .. } | FrameError::InvalidPreBuffer => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}
