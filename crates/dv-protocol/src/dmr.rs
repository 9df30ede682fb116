//! DMR bursts
//!
//! Each DMR burst travels on one of two time slots. The modem tags the burst
//! and adds a sync byte describing what the burst carries:
//!
//! ```text
//! [TAG] [SYNC] [burst x33]
//! ```
//!
//! - SYNC `0x40 | DT`: data sync, DT is the slot type data type
//! - SYNC `0x20 | n`: voice sync, n is the position in the superframe (0-5)
//!
//! Link control and CSBK bodies are carried already de-interleaved and
//! error-corrected at the start of the burst.

use crate::error::CodecError;
use crate::frame::{Frame, FrameTag};

/// Burst length
pub const BURST_LEN: usize = 33;
/// Burst length as exchanged with the modem
pub const MODEM_FRAME_LEN: usize = BURST_LEN + 2;

/// Sync byte flag: data burst
pub const SYNC_DATA: u8 = 0x40;
/// Sync byte flag: voice burst
pub const SYNC_AUDIO: u8 = 0x20;

/// Data type: voice link control header
pub const DT_VOICE_LC_HEADER: u8 = 0x01;
/// Data type: terminator with link control
pub const DT_TERMINATOR_WITH_LC: u8 = 0x02;
/// Data type: control signalling block
pub const DT_CSBK: u8 = 0x03;
/// Data type: idle burst
pub const DT_IDLE: u8 = 0x09;

/// FLCO: group call
pub const FLCO_GROUP: u8 = 0x00;
/// FLCO: private call
pub const FLCO_USER_USER: u8 = 0x03;

/// CSBK opcode: BS outbound activation (repeater wake-up)
pub const CSBKO_BSDWNACT: u8 = 0x38;

/// What a burst carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstKind {
    /// Voice link control header
    VoiceLcHeader,
    /// Terminator with link control
    TerminatorWithLc,
    /// Control signalling block
    Csbk,
    /// Idle burst
    Idle,
    /// Voice burst at position `n` of the superframe
    Voice { n: u8 },
    /// Other data burst
    Data(u8),
}

/// Classify a DMR modem frame by its sync byte
pub fn burst_kind(frame: &Frame) -> Option<BurstKind> {
    let sync = *frame.body().first()?;

    if sync & SYNC_DATA == SYNC_DATA {
        Some(match sync & 0x0F {
            DT_VOICE_LC_HEADER => BurstKind::VoiceLcHeader,
            DT_TERMINATOR_WITH_LC => BurstKind::TerminatorWithLc,
            DT_CSBK => BurstKind::Csbk,
            DT_IDLE => BurstKind::Idle,
            other => BurstKind::Data(other),
        })
    } else if sync & SYNC_AUDIO == SYNC_AUDIO {
        Some(BurstKind::Voice { n: sync & 0x0F })
    } else {
        None
    }
}

/// The 33 burst bytes of a DMR modem frame
pub fn burst_bytes(frame: &Frame) -> &[u8] {
    frame.body().get(1..).unwrap_or(&[])
}

fn read_id(bytes: &[u8]) -> u32 {
    u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2])
}

fn write_id(bytes: &mut [u8], id: u32) {
    bytes[0] = (id >> 16) as u8;
    bytes[1] = (id >> 8) as u8;
    bytes[2] = id as u8;
}

/// Full link control
///
/// ```text
/// [FLCO] [FID] [OPTIONS] [DST x3] [SRC x3]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkControl {
    /// Full link control opcode
    pub flco: u8,
    /// Feature set ID
    pub fid: u8,
    /// Service options
    pub options: u8,
    /// Destination ID (talkgroup or radio)
    pub dst_id: u32,
    /// Source radio ID
    pub src_id: u32,
}

impl LinkControl {
    /// Encoded length
    pub const LEN: usize = 9;

    /// Decode link control from the start of a burst
    pub fn decode(burst: &[u8]) -> Result<Self, CodecError> {
        if burst.len() < Self::LEN {
            return Err(CodecError::ShortBuffer {
                needed: Self::LEN,
                actual: burst.len(),
            });
        }

        Ok(Self {
            flco: burst[0] & 0x3F,
            fid: burst[1],
            options: burst[2],
            dst_id: read_id(&burst[3..6]),
            src_id: read_id(&burst[6..9]),
        })
    }

    /// Encode link control into the start of a burst
    pub fn encode(&self, burst: &mut [u8; BURST_LEN]) {
        burst[0] = self.flco & 0x3F;
        burst[1] = self.fid;
        burst[2] = self.options;
        write_id(&mut burst[3..6], self.dst_id);
        write_id(&mut burst[6..9], self.src_id);
    }

    /// Whether this is a group call
    pub fn is_group(&self) -> bool {
        self.flco == FLCO_GROUP
    }
}

/// Control signalling block
///
/// ```text
/// [LB|PF|CSBKO] [FID] [data x2] [DST x3] [SRC x3]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Csbk {
    /// CSBK opcode
    pub opcode: u8,
    /// Feature set ID
    pub fid: u8,
    /// Destination ID
    pub dst_id: u32,
    /// Source ID
    pub src_id: u32,
}

impl Csbk {
    /// Encoded length
    pub const LEN: usize = 10;

    /// Decode a CSBK from the start of a burst
    pub fn decode(burst: &[u8]) -> Result<Self, CodecError> {
        if burst.len() < Self::LEN {
            return Err(CodecError::ShortBuffer {
                needed: Self::LEN,
                actual: burst.len(),
            });
        }

        Ok(Self {
            opcode: burst[0] & 0x3F,
            fid: burst[1],
            dst_id: read_id(&burst[4..7]),
            src_id: read_id(&burst[7..10]),
        })
    }

    /// Encode a CSBK into the start of a burst
    pub fn encode(&self, burst: &mut [u8; BURST_LEN]) {
        burst[0] = 0x80 | (self.opcode & 0x3F);
        burst[1] = self.fid;
        write_id(&mut burst[4..7], self.dst_id);
        write_id(&mut burst[7..10], self.src_id);
    }
}

fn data_burst(data_type: u8, burst: &[u8; BURST_LEN]) -> Frame {
    let mut body = [0u8; BURST_LEN + 1];
    body[0] = SYNC_DATA | data_type;
    body[1..].copy_from_slice(burst);
    Frame::from_array(FrameTag::Data, &body)
}

/// Build a voice LC header modem frame
pub fn voice_lc_header_frame(lc: &LinkControl) -> Frame {
    let mut burst = [0u8; BURST_LEN];
    lc.encode(&mut burst);
    data_burst(DT_VOICE_LC_HEADER, &burst)
}

/// Build a terminator with LC modem frame
pub fn terminator_frame(lc: &LinkControl) -> Frame {
    let mut burst = [0u8; BURST_LEN];
    lc.encode(&mut burst);
    data_burst(DT_TERMINATOR_WITH_LC, &burst)
}

/// Build a CSBK modem frame
pub fn csbk_frame(csbk: &Csbk) -> Frame {
    let mut burst = [0u8; BURST_LEN];
    csbk.encode(&mut burst);
    data_burst(DT_CSBK, &burst)
}

/// Build a voice modem frame at superframe position `n`
pub fn voice_frame(n: u8, burst: &[u8; BURST_LEN]) -> Frame {
    let mut body = [0u8; BURST_LEN + 1];
    body[0] = SYNC_AUDIO | (n % 6);
    body[1..].copy_from_slice(burst);
    Frame::from_array(FrameTag::Data, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_classification() {
        let lc = LinkControl {
            flco: FLCO_GROUP,
            dst_id: 91,
            src_id: 2_345_678,
            ..LinkControl::default()
        };

        assert_eq!(
            burst_kind(&voice_lc_header_frame(&lc)),
            Some(BurstKind::VoiceLcHeader)
        );
        assert_eq!(
            burst_kind(&terminator_frame(&lc)),
            Some(BurstKind::TerminatorWithLc)
        );
        assert_eq!(
            burst_kind(&voice_frame(4, &[0; BURST_LEN])),
            Some(BurstKind::Voice { n: 4 })
        );
        assert_eq!(burst_kind(&Frame::lost()), None);
    }

    #[test]
    fn test_link_control_ids() {
        let lc = LinkControl {
            flco: FLCO_USER_USER,
            fid: 0x10,
            options: 0x20,
            dst_id: 0x00_12_34,
            src_id: 0xAB_CD_EF,
        };

        let frame = voice_lc_header_frame(&lc);
        assert_eq!(frame.len(), MODEM_FRAME_LEN);

        let decoded = LinkControl::decode(burst_bytes(&frame)).unwrap();
        assert_eq!(decoded, lc);
        assert!(!decoded.is_group());
    }

    #[test]
    fn test_csbk_wakeup() {
        let csbk = Csbk {
            opcode: CSBKO_BSDWNACT,
            fid: 0,
            dst_id: 1234,
            src_id: 5678,
        };

        let frame = csbk_frame(&csbk);
        assert_eq!(burst_kind(&frame), Some(BurstKind::Csbk));
        assert_eq!(Csbk::decode(burst_bytes(&frame)).unwrap(), csbk);
    }

    #[test]
    fn test_short_burst() {
        assert!(LinkControl::decode(&[0u8; 4]).is_err());
        assert!(Csbk::decode(&[0u8; 9]).is_err());
    }
}
