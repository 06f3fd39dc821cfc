//! Serial driver abstraction for H4 transports.
//!
//! The H4 transport never touches a serial port directly. It talks to a
//! [`SerialDriver`], which accepts block read/write requests and reports
//! their completions. Two drivers are provided:
//! - [`PosixUart`]: a raw-mode tty on Linux/macOS
//! - [`MockUart`]: an in-memory line for tests and offline decoding

pub mod error;
pub mod mock;
pub mod traits;

#[cfg(unix)]
pub mod posix;

pub use error::{DriverError, Result};
pub use mock::MockUart;
pub use traits::{Completion, FlowControl, SerialDriver, UartConfig, DEFAULT_BAUDRATE};

#[cfg(unix)]
pub use posix::PosixUart;
