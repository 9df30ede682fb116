//! Digital-voice modem frame library
//!
//! This crate provides the frame representation and sub-header codecs for
//! the traffic exchanged between a multi-mode digital-voice modem and the
//! gateway host:
//!
//! - **System Fusion (YSF)**: sync pattern, FICH sub-header and the callsign
//!   fields carried in the payload
//! - **D-Star**: 41-byte radio header with CRC-protected callsign fields
//! - **DMR**: two-slot bursts tagged with a data type, raw link control and CSBK
//!
//! # Architecture
//!
//! Every frame read from (or written to) the modem is a [`Frame`]: an owned,
//! fixed-capacity byte buffer whose first byte is a [`FrameTag`]. Protocol
//! modules decode the bytes after the tag into small value types and encode
//! them back. Decoding never mutates the frame; encoding only touches the
//! frame it is handed.
//!
//! The forward-error-correction layers of the air interfaces are handled by
//! the modem DSP and are not modelled here.
//!
//! # Example
//!
//! ```rust
//! use dv_protocol::fusion::{self, Fich};
//! use dv_protocol::FrameTag;
//!
//! let fich = Fich {
//!     frame_info: fusion::FI_COMMUNICATIONS,
//!     frame_number: 2,
//!     frame_total: 6,
//!     ..Fich::default()
//! };
//!
//! let frame = fusion::build_frame(FrameTag::Data, &fich, &[0u8; fusion::PAYLOAD_LEN]);
//! let decoded = Fich::decode(fusion::ysf_bytes(&frame)).unwrap();
//! assert_eq!(decoded.frame_number, 2);
//! ```

pub mod crc;
pub mod dmr;
pub mod dstar;
pub mod error;
pub mod frame;
pub mod fusion;

pub use error::{CodecError, FrameError};
pub use frame::{Frame, FrameTag, MAX_FRAME_LEN};

/// Which personality currently owns the shared RF channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// No protocol is active
    #[default]
    Idle,
    /// D-Star
    DStar,
    /// DMR (both time slots)
    Dmr,
    /// Yaesu System Fusion
    Fusion,
    /// Modem reported a hardware lockout
    Lockout,
    /// Modem reported an internal fault
    Error,
}

impl Mode {
    /// Returns a human-readable name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Idle => "Idle",
            Mode::DStar => "D-Star",
            Mode::Dmr => "DMR",
            Mode::Fusion => "System Fusion",
            Mode::Lockout => "Lockout",
            Mode::Error => "Error",
        }
    }

    /// True for the modes that carry voice traffic
    pub fn is_voice(&self) -> bool {
        matches!(self, Mode::DStar | Mode::Dmr | Mode::Fusion)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A modem data channel
///
/// DMR has one channel per time slot; the other protocols have one each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// D-Star data
    DStar,
    /// DMR time slot 1
    DmrSlot1,
    /// DMR time slot 2
    DmrSlot2,
    /// System Fusion data
    Fusion,
}

impl Channel {
    /// All channels in the fixed order the host polls them
    pub const ALL: [Channel; 4] = [
        Channel::DStar,
        Channel::DmrSlot1,
        Channel::DmrSlot2,
        Channel::Fusion,
    ];

    /// The mode a channel belongs to
    pub fn mode(&self) -> Mode {
        match self {
            Channel::DStar => Mode::DStar,
            Channel::DmrSlot1 | Channel::DmrSlot2 => Mode::Dmr,
            Channel::Fusion => Mode::Fusion,
        }
    }

    /// DMR slot number (1 or 2) for DMR channels
    pub fn dmr_slot(&self) -> Option<u8> {
        match self {
            Channel::DmrSlot1 => Some(1),
            Channel::DmrSlot2 => Some(2),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_modes() {
        assert!(Mode::Fusion.is_voice());
        assert!(Mode::Dmr.is_voice());
        assert!(!Mode::Idle.is_voice());
        assert!(!Mode::Lockout.is_voice());
        assert!(!Mode::Error.is_voice());
    }

    #[test]
    fn test_channel_modes() {
        assert_eq!(Channel::DmrSlot1.mode(), Mode::Dmr);
        assert_eq!(Channel::DmrSlot2.dmr_slot(), Some(2));
        assert_eq!(Channel::Fusion.mode(), Mode::Fusion);
        assert_eq!(Channel::DStar.dmr_slot(), None);
    }
}
