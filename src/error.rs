use thiserror::Error;

/// Result type for CP750 operations
pub type Result<T> = std::result::Result<T, Cp750Error>;

/// Errors that can occur when interacting with a CP750 processor
#[derive(Error, Debug)]
pub enum Cp750Error {
    /// The availability gate reports the device as unpowered
    ///
    /// This is an expected state, not a fault: polling publishes the
    /// all-absent snapshot instead of surfacing it.
    #[error("device gated off by power condition")]
    GateClosed,

    /// TCP connect or DNS resolution failed
    #[error("connection failed: {0}")]
    ConnectionFailure(#[source] std::io::Error),

    /// The device stayed silent after the single reconnect retry
    #[error("no response from device after reconnect retry")]
    NoResponse,

    /// I/O error or timeout during a write/read cycle
    #[error("command failed: {0}")]
    CommandFailure(#[source] std::io::Error),

    /// Input rejected before reaching the device
    #[error("invalid value: {0}")]
    Validation(String),
}
