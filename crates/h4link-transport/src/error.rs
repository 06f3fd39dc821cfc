/// Errors that can occur in H4 transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Serial driver error, propagated unchanged.
    #[error("driver error: {0}")]
    Driver(#[from] h4link_uart::DriverError),

    /// The configuration passed to `init` cannot drive an H4 transport.
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),

    /// `open` was called before a successful `init`.
    #[error("transport not initialized")]
    NotInitialized,

    /// The transport is not open.
    #[error("transport not open")]
    NotOpen,

    /// A packet is still being sent; check `can_send_now` first.
    #[error("write already in flight")]
    WriteInFlight,
}

pub type Result<T> = std::result::Result<T, TransportError>;
