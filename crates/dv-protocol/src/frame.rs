//! Tagged modem frames
//!
//! The modem prefixes every frame with a one-byte tag that says what kind of
//! frame follows. The rest of the frame is protocol specific.
//!
//! ```text
//! [TAG] [protocol bytes ...]
//! ```

use std::fmt;

use crate::error::FrameError;

/// Largest frame the modem can deliver, tag included
pub const MAX_FRAME_LEN: usize = 200;

/// Frame-kind discriminator carried in byte 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTag {
    /// Start-of-transmission header
    Header,
    /// Voice or data frame
    Data,
    /// Modem lost the signal mid-transmission
    Lost,
    /// Explicit end-of-transmission
    EndOfTransmission,
    /// Tag byte this host does not understand
    Unknown(u8),
}

impl FrameTag {
    /// Raw tag byte
    pub fn as_u8(&self) -> u8 {
        match self {
            FrameTag::Header => 0x00,
            FrameTag::Data => 0x01,
            FrameTag::Lost => 0x02,
            FrameTag::EndOfTransmission => 0x03,
            FrameTag::Unknown(b) => *b,
        }
    }
}

impl From<u8> for FrameTag {
    fn from(value: u8) -> Self {
        match value {
            0x00 => FrameTag::Header,
            0x01 => FrameTag::Data,
            0x02 => FrameTag::Lost,
            0x03 => FrameTag::EndOfTransmission,
            other => FrameTag::Unknown(other),
        }
    }
}

/// An owned, fixed-capacity modem frame
///
/// Frames are plain values: cloning one gives an independent copy, so the
/// frame that was received and the frame being retransmitted never alias.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    /// Copy a raw frame (tag included) into a new frame
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.is_empty() {
            return Err(FrameError::Empty);
        }
        if data.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLong {
                len: data.len(),
                max: MAX_FRAME_LEN,
            });
        }

        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[..data.len()].copy_from_slice(data);

        Ok(Self {
            bytes,
            len: data.len(),
        })
    }

    /// Build a frame from a tag and the bytes that follow it
    pub fn new(tag: FrameTag, body: &[u8]) -> Result<Self, FrameError> {
        let len = body.len() + 1;
        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLong {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = tag.as_u8();
        bytes[1..len].copy_from_slice(body);

        Ok(Self { bytes, len })
    }

    /// Build a frame from a tag and a fixed-size body known to fit
    pub fn from_array<const N: usize>(tag: FrameTag, body: &[u8; N]) -> Self {
        const { assert!(N < MAX_FRAME_LEN, "frame body exceeds frame capacity") };

        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = tag.as_u8();
        bytes[1..=N].copy_from_slice(body);

        Self { bytes, len: N + 1 }
    }

    /// A bare signal-lost marker
    pub fn lost() -> Self {
        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = FrameTag::Lost.as_u8();
        Self { bytes, len: 1 }
    }

    /// The frame's tag
    pub fn tag(&self) -> FrameTag {
        FrameTag::from(self.bytes[0])
    }

    /// Replace the frame's tag
    pub fn set_tag(&mut self, tag: FrameTag) {
        self.bytes[0] = tag.as_u8();
    }

    /// Total length including the tag byte
    pub fn len(&self) -> usize {
        self.len
    }

    /// Frames always carry at least a tag
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The whole frame, tag included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Bytes following the tag
    pub fn body(&self) -> &[u8] {
        &self.bytes[1..self.len]
    }

    /// Mutable bytes following the tag
    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[1..self.len]
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.as_bytes()[..self.len.min(16)];
        f.debug_struct("Frame")
            .field("tag", &self.tag())
            .field("len", &self.len)
            .field("head", &format_args!("{:02X?}", shown))
            .finish()
    }
}
