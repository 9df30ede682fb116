//! Error types for the gateway host

use dv_protocol::Mode;
use thiserror::Error;

/// Errors that can occur while bringing the host up
///
/// Nothing inside the real-time loop produces one of these: once the loop is
/// running, failures are logged and absorbed.
#[derive(Debug, Error)]
pub enum HostError {
    /// Modem transport could not be opened
    #[error("failed to open modem: {0}")]
    ModemOpen(String),

    /// Display could not be opened
    #[error("failed to open display: {0}")]
    DisplayOpen(String),

    /// Network backend could not be opened
    #[error("failed to open {mode} network: {reason}")]
    NetworkOpen {
        /// Mode the network serves
        mode: Mode,
        /// Why it failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the frame queue
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Not enough free space for the frame and its length prefix
    #[error("overflow in the {name} ring buffer: need {needed} bytes, {free} free")]
    Overflow {
        /// Queue name
        name: String,
        /// Bytes required
        needed: usize,
        /// Bytes available
        free: usize,
    },
}
