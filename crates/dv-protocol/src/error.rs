//! Error types for frame handling and sub-header codecs

use thiserror::Error;

/// Errors that can occur while building a frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// No bytes at all - not even a tag
    #[error("empty frame")]
    Empty,

    /// Frame exceeds the fixed frame capacity
    #[error("frame too long: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },
}

/// Errors that can occur while decoding a sub-header
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer is shorter than the structure being decoded
    #[error("short buffer: need {needed} bytes, got {actual}")]
    ShortBuffer { needed: usize, actual: usize },

    /// Checksum mismatch
    #[error("checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}
