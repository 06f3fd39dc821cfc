use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::error::{DriverError, Result};
use crate::traits::{Completion, FlowControl, SerialDriver, UartConfig};

/// POSIX tty serial driver.
///
/// Opens the configured device in raw mode via termios. Writes complete
/// synchronously inside [`SerialDriver::poll_completion`]; reads wait for
/// data with `poll(2)`, bounded by the driver's poll timeout, and accumulate
/// partial reads until the requested block is full.
pub struct PosixUart {
    config: UartConfig,
    file: Option<File>,
    poll_timeout: Duration,
    pending_read: Option<usize>,
    partial: BytesMut,
    pending_send: Option<Bytes>,
}

impl Default for PosixUart {
    fn default() -> Self {
        Self::new()
    }
}

impl PosixUart {
    /// Default upper bound for a single wait inside `poll_completion`.
    pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

    pub fn new() -> Self {
        Self {
            config: UartConfig::default(),
            file: None,
            poll_timeout: Self::DEFAULT_POLL_TIMEOUT,
            pending_read: None,
            partial: BytesMut::new(),
            pending_send: None,
        }
    }

    /// Set how long a single `poll_completion` call may wait for data.
    pub fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = timeout;
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Driver name for diagnostics.
    pub fn driver_name(&self) -> &'static str {
        "posix-tty"
    }

    fn wait_readable(&self, file: &File) -> Result<bool> {
        let mut fds = libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = self.poll_timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        // SAFETY: `fds` is a valid pollfd for one descriptor owned by `file`.
        let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }
        let hung_up = fds.revents & (libc::POLLHUP | libc::POLLERR) != 0;
        if rc > 0 && hung_up && fds.revents & libc::POLLIN == 0 {
            return Err(DriverError::Closed);
        }
        Ok(rc > 0)
    }
}

impl SerialDriver for PosixUart {
    fn init(&mut self, config: &UartConfig) {
        self.config = config.clone();
    }

    fn open(&mut self) -> Result<()> {
        let device = PathBuf::from(
            self.config
                .device_name
                .as_deref()
                .ok_or(DriverError::MissingDevice)?,
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&device)
            .map_err(|e| DriverError::Open {
                device: device.clone(),
                source: e,
            })?;

        configure_tty(&file, self.config.baudrate, self.config.flow_control)?;
        set_blocking(&file)?;

        info!(
            ?device,
            baudrate = self.config.baudrate,
            flow_control = ?self.config.flow_control,
            "opened serial device"
        );

        self.file = Some(file);
        self.pending_read = None;
        self.partial.clear();
        self.pending_send = None;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            debug!(device = ?self.config.device_name, "closed serial device");
        }
        self.pending_read = None;
        self.partial.clear();
        self.pending_send = None;
        Ok(())
    }

    fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        let speed = baud_constant(baudrate).ok_or(DriverError::UnsupportedBaudrate(baudrate))?;
        if let Some(file) = &self.file {
            apply_speed(file, speed)?;
        }
        self.config.baudrate = baudrate;
        Ok(())
    }

    fn receive_block(&mut self, len: usize) {
        self.pending_read = Some(len);
        self.partial.clear();
        self.partial.reserve(len);
    }

    fn send_block(&mut self, block: Bytes) {
        self.pending_send = Some(block);
    }

    fn poll_completion(&mut self) -> Result<Option<Completion>> {
        let Some(file) = self.file.as_ref() else {
            return Ok(None);
        };

        if let Some(block) = self.pending_send.take() {
            let mut writer = file;
            writer.write_all(&block)?;
            writer.flush()?;
            return Ok(Some(Completion::BlockSent));
        }

        let Some(len) = self.pending_read else {
            return Ok(None);
        };

        if self.partial.len() < len {
            if !self.wait_readable(file)? {
                return Ok(None);
            }

            let mut chunk = vec![0u8; len - self.partial.len()];
            let mut reader = file;
            let read = match reader.read(&mut chunk) {
                Ok(n) => n,
                Err(err)
                    if err.kind() == ErrorKind::Interrupted
                        || err.kind() == ErrorKind::WouldBlock =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(err.into()),
            };
            if read == 0 {
                return Err(DriverError::Closed);
            }
            self.partial.extend_from_slice(&chunk[..read]);
        }

        if self.partial.len() < len {
            return Ok(None);
        }

        self.pending_read = None;
        Ok(Some(Completion::BlockReceived(self.partial.split().freeze())))
    }
}

impl std::fmt::Debug for PosixUart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixUart")
            .field("device", &self.config.device_name)
            .field("baudrate", &self.config.baudrate)
            .field("open", &self.file.is_some())
            .finish()
    }
}

/// Map a numeric baud rate to its termios speed constant.
pub fn baud_constant(baudrate: u32) -> Option<libc::speed_t> {
    let speed = match baudrate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        500_000 => libc::B500000,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => libc::B1000000,
        #[cfg(target_os = "linux")]
        1_500_000 => libc::B1500000,
        #[cfg(target_os = "linux")]
        2_000_000 => libc::B2000000,
        #[cfg(target_os = "linux")]
        3_000_000 => libc::B3000000,
        #[cfg(target_os = "linux")]
        4_000_000 => libc::B4000000,
        _ => return None,
    };
    Some(speed)
}

fn read_termios(file: &File) -> Result<libc::termios> {
    // SAFETY: termios is a plain C struct; all-zero is a valid bit pattern and
    // it is fully overwritten by tcgetattr on success.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: the descriptor is open for the lifetime of `file`, `tio` is writable.
    if unsafe { libc::tcgetattr(file.as_raw_fd(), &mut tio) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(tio)
}

fn write_termios(file: &File, tio: &libc::termios) -> Result<()> {
    // SAFETY: the descriptor is open for the lifetime of `file`, `tio` is initialized.
    if unsafe { libc::tcsetattr(file.as_raw_fd(), libc::TCSANOW, tio) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

fn set_speed(tio: &mut libc::termios, speed: libc::speed_t) -> Result<()> {
    // SAFETY: `tio` is a valid, initialized termios struct.
    let rc = unsafe { libc::cfsetispeed(tio, speed) | libc::cfsetospeed(tio, speed) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

fn apply_speed(file: &File, speed: libc::speed_t) -> Result<()> {
    let mut tio = read_termios(file)?;
    set_speed(&mut tio, speed)?;
    write_termios(file, &tio)
}

/// Clear `O_NONBLOCK` once `CLOCAL` is set, so writes block normally.
fn set_blocking(file: &File) -> Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: the descriptor is open for the lifetime of `file`.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    // SAFETY: as above; only the status flags are changed.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

fn configure_tty(file: &File, baudrate: u32, flow_control: FlowControl) -> Result<()> {
    let speed = baud_constant(baudrate).ok_or(DriverError::UnsupportedBaudrate(baudrate))?;
    let mut tio = read_termios(file)?;

    // SAFETY: `tio` is a valid, initialized termios struct.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CREAD | libc::CLOCAL;
    match flow_control {
        FlowControl::RtsCts => tio.c_cflag |= libc::CRTSCTS,
        FlowControl::None => tio.c_cflag &= !libc::CRTSCTS,
    }
    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;
    set_speed(&mut tio, speed)?;
    write_termios(file, &tio)?;

    // SAFETY: the descriptor is open for the lifetime of `file`.
    if unsafe { libc::tcflush(file.as_raw_fd(), libc::TCIOFLUSH) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_baud_rates_map() {
        assert_eq!(baud_constant(9600), Some(libc::B9600));
        assert_eq!(baud_constant(115_200), Some(libc::B115200));
        assert_eq!(baud_constant(12_345), None);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn high_baud_rates_map_on_linux() {
        assert_eq!(baud_constant(921_600), Some(libc::B921600));
        assert_eq!(baud_constant(3_000_000), Some(libc::B3000000));
    }

    #[test]
    fn open_without_device_fails() {
        let mut uart = PosixUart::new();
        assert!(matches!(uart.open(), Err(DriverError::MissingDevice)));
        assert!(!uart.is_open());
    }

    #[test]
    fn open_missing_device_reports_path() {
        let mut uart = PosixUart::new();
        uart.init(&UartConfig {
            device_name: Some("/dev/h4link-does-not-exist".to_string()),
            ..UartConfig::default()
        });
        let err = uart.open().unwrap_err();
        assert!(matches!(err, DriverError::Open { .. }));
        assert!(err.to_string().contains("h4link-does-not-exist"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn open_non_tty_fails_configuration() {
        let mut uart = PosixUart::new();
        uart.init(&UartConfig {
            device_name: Some("/dev/null".to_string()),
            ..UartConfig::default()
        });
        assert!(matches!(uart.open(), Err(DriverError::Io(_))));
        assert!(!uart.is_open());
    }

    #[test]
    fn set_baudrate_before_open_is_stored() {
        let mut uart = PosixUart::new();
        uart.set_baudrate(57_600).unwrap();
        assert!(matches!(
            uart.set_baudrate(7),
            Err(DriverError::UnsupportedBaudrate(7))
        ));
        assert!(format!("{uart:?}").contains("57600"));
    }

    #[cfg(target_os = "linux")]
    mod pty {
        use std::io::{Read, Write};
        use std::os::fd::FromRawFd;

        use super::*;

        /// Open a pseudo terminal. Returns the master end and the slave path.
        fn open_pty() -> (File, String) {
            let mut master: libc::c_int = -1;
            let mut slave: libc::c_int = -1;
            // SAFETY: both out-pointers are valid; name, termios and winsize may be null.
            let rc = unsafe {
                libc::openpty(
                    &mut master,
                    &mut slave,
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                )
            };
            assert_eq!(rc, 0, "openpty failed: {}", std::io::Error::last_os_error());

            let path = std::fs::read_link(format!("/proc/self/fd/{slave}"))
                .expect("slave fd should resolve to a pts path");
            // SAFETY: `slave` came from openpty and is not used after this.
            unsafe { libc::close(slave) };
            // SAFETY: `master` came from openpty and is owned by the File from here on.
            let master = unsafe { File::from_raw_fd(master) };
            (master, path.to_string_lossy().into_owned())
        }

        fn open_uart(device: String) -> PosixUart {
            let mut uart = PosixUart::new();
            uart.set_poll_timeout(Duration::from_secs(1));
            uart.init(&UartConfig {
                device_name: Some(device),
                ..UartConfig::default()
            });
            uart.open().expect("pty slave should open");
            uart
        }

        fn poll_until_some(uart: &mut PosixUart) -> Completion {
            for _ in 0..10 {
                if let Some(completion) = uart.poll_completion().unwrap() {
                    return completion;
                }
            }
            panic!("no completion after 10 polls");
        }

        #[test]
        fn open_leaves_descriptor_blocking() {
            let (_master, device) = open_pty();
            let uart = open_uart(device);

            let fd = uart.file.as_ref().unwrap().as_raw_fd();
            // SAFETY: `fd` belongs to the open uart.
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            assert!(flags >= 0);
            assert_eq!(flags & libc::O_NONBLOCK, 0);
        }

        #[test]
        fn partial_reads_accumulate_into_one_block() {
            let (mut master, device) = open_pty();
            let mut uart = open_uart(device);

            uart.receive_block(3);
            master.write_all(&[0x04]).unwrap();
            assert_eq!(uart.poll_completion().unwrap(), None);

            master.write_all(&[0x0E, 0x00]).unwrap();
            assert_eq!(
                poll_until_some(&mut uart),
                Completion::BlockReceived(Bytes::from_static(&[0x04, 0x0E, 0x00]))
            );
            assert_eq!(uart.pending_read, None);
        }

        #[test]
        fn send_completes_and_reaches_the_line() {
            let (mut master, device) = open_pty();
            let mut uart = open_uart(device);

            uart.send_block(Bytes::from_static(&[0x01, 0x03, 0x0C, 0x00]));
            assert_eq!(uart.poll_completion().unwrap(), Some(Completion::BlockSent));

            let mut wire = [0u8; 4];
            master.read_exact(&mut wire).unwrap();
            assert_eq!(wire, [0x01, 0x03, 0x0C, 0x00]);
        }

        #[test]
        fn hang_up_is_reported_as_error() {
            let (master, device) = open_pty();
            let mut uart = open_uart(device);

            uart.receive_block(1);
            drop(master);
            assert!(uart.poll_completion().is_err());
        }
    }

    #[test]
    fn poll_on_closed_driver_is_idle() {
        let mut uart = PosixUart::new();
        uart.receive_block(1);
        uart.send_block(Bytes::from_static(b"x"));
        assert_eq!(uart.poll_completion().unwrap(), None);
        assert_eq!(uart.poll_timeout(), PosixUart::DEFAULT_POLL_TIMEOUT);
    }
}
