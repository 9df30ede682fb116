//! Yaesu System Fusion (YSF) frames
//!
//! The modem delivers each 120-byte YSF frame behind two bytes of its own:
//!
//! ```text
//! [TAG] [FLAGS] [SYNC x5] [FICH region x25] [payload x90]
//! ```
//!
//! - FLAGS: bit 0 set when the modem's FICH checksum passed, bits 7-6 hold
//!   the frame information (FI), bits 5-4 the data type (DT)
//! - SYNC: fixed `D4 71 C9 63 4D`
//! - FICH: four field bytes followed by an inverted CRC-CCITT (big-endian);
//!   the Golay/convolutional coding around it is undone by the modem DSP
//! - payload: callsign fields for header, terminator and V/D frames
//!
//! # FICH field layout
//! ```text
//! byte 0: FI(2) CS(2) CM(2) BN(2)
//! byte 1: BT(2) FN(3) FT(3)
//! byte 2: -(1) DEV(1) MR(3) VOIP(1) DT(2)
//! byte 3: SQL(1) SC(7)
//! ```

use std::fmt;

use tracing::debug;

use crate::crc::ccitt_fich;
use crate::error::CodecError;
use crate::frame::{Frame, FrameTag};

/// Length of a YSF frame without the modem's tag and flag bytes
pub const FRAME_LEN: usize = 120;
/// Length of a YSF frame as exchanged with the modem
pub const MODEM_FRAME_LEN: usize = FRAME_LEN + 2;

/// YSF frame sync pattern
pub const SYNC: [u8; 5] = [0xD4, 0x71, 0xC9, 0x63, 0x4D];
/// Offset of the FICH region in a YSF frame
pub const FICH_OFFSET: usize = 5;
/// Raw FICH: four field bytes plus CRC
pub const FICH_LEN: usize = 6;
/// Offset of the payload in a YSF frame
pub const PAYLOAD_OFFSET: usize = 30;
/// Payload length in a YSF frame
pub const PAYLOAD_LEN: usize = FRAME_LEN - PAYLOAD_OFFSET;
/// Length of a callsign field
pub const CALLSIGN_LEN: usize = 10;

/// Modem flag: FICH checksum verified by the modem
pub const FLAG_CKSUM_OK: u8 = 0x01;
/// Modem flag mask: frame information
pub const FLAG_FI_MASK: u8 = 0xC0;
/// Modem flag mask: data type
pub const FLAG_DT_MASK: u8 = 0x30;

/// FI: header frame
pub const FI_HEADER: u8 = 0x00;
/// FI: communications frame
pub const FI_COMMUNICATIONS: u8 = 0x01;
/// FI: terminator frame
pub const FI_TERMINATOR: u8 = 0x02;
/// FI: test frame
pub const FI_TEST: u8 = 0x03;

/// DT: voice/data mode 1
pub const DT_VD_MODE1: u8 = 0x00;
/// DT: data full rate
pub const DT_DATA_FR_MODE: u8 = 0x01;
/// DT: voice/data mode 2
pub const DT_VD_MODE2: u8 = 0x02;
/// DT: voice full rate
pub const DT_VOICE_FR_MODE: u8 = 0x03;

/// MR: direct wave
pub const MR_DIRECT: u8 = 0x00;
/// MR: repeater not busy
pub const MR_NOT_BUSY: u8 = 0x01;
/// MR: repeater busy
pub const MR_BUSY: u8 = 0x02;

/// CM: group/CQ call
pub const CM_GROUP_CQ: u8 = 0x00;
/// CM: radio ID call
pub const CM_RADIO_ID: u8 = 0x01;
/// CM: individual call
pub const CM_INDIVIDUAL: u8 = 0x03;

/// Destination used for group/CQ calls
pub const CQ_DESTINATION: &str = "CQCQCQ";

/// Decoded FICH sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fich {
    /// FI: header, communications, terminator or test
    pub frame_info: u8,
    /// CS: callsign information
    pub callsign_info: u8,
    /// CM: call mode
    pub call_mode: u8,
    /// BN: block number
    pub block_number: u8,
    /// BT: block total
    pub block_total: u8,
    /// FN: frame number within the superframe
    pub frame_number: u8,
    /// FT: frame total
    pub frame_total: u8,
    /// Narrow deviation flag
    pub dev: bool,
    /// MR: message route (busy/not busy marker)
    pub route: u8,
    /// Sent over the internet
    pub voip: bool,
    /// DT: data type
    pub data_type: u8,
    /// Squelch code enabled
    pub sql: bool,
    /// Squelch code
    pub sql_code: u8,
}

impl Fich {
    /// Decode the FICH from a 120-byte YSF frame, verifying the CRC
    pub fn decode(ysf: &[u8]) -> Result<Self, CodecError> {
        let end = FICH_OFFSET + FICH_LEN;
        if ysf.len() < end {
            return Err(CodecError::ShortBuffer {
                needed: end,
                actual: ysf.len(),
            });
        }

        let raw = &ysf[FICH_OFFSET..end];
        let expected = ccitt_fich(&raw[..4]);
        let actual = u16::from_be_bytes([raw[4], raw[5]]);
        if expected != actual {
            debug!("YSF FICH CRC mismatch: {:04X} != {:04X}", expected, actual);
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }

        Ok(Self::from_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Encode the FICH (fields and CRC) into a 120-byte YSF frame
    pub fn encode(&self, ysf: &mut [u8]) -> Result<(), CodecError> {
        let end = FICH_OFFSET + FICH_LEN;
        if ysf.len() < end {
            return Err(CodecError::ShortBuffer {
                needed: end,
                actual: ysf.len(),
            });
        }

        let fields = self.to_bytes();
        let crc = ccitt_fich(&fields).to_be_bytes();

        let raw = &mut ysf[FICH_OFFSET..end];
        raw[..4].copy_from_slice(&fields);
        raw[4..].copy_from_slice(&crc);

        Ok(())
    }

    /// Unpack the four field bytes
    pub fn from_bytes(raw: [u8; 4]) -> Self {
        Self {
            frame_info: (raw[0] >> 6) & 0x03,
            callsign_info: (raw[0] >> 4) & 0x03,
            call_mode: (raw[0] >> 2) & 0x03,
            block_number: raw[0] & 0x03,
            block_total: (raw[1] >> 6) & 0x03,
            frame_number: (raw[1] >> 3) & 0x07,
            frame_total: raw[1] & 0x07,
            dev: raw[2] & 0x40 != 0,
            route: (raw[2] >> 3) & 0x07,
            voip: raw[2] & 0x04 != 0,
            data_type: raw[2] & 0x03,
            sql: raw[3] & 0x80 != 0,
            sql_code: raw[3] & 0x7F,
        }
    }

    /// Pack the four field bytes
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            (self.frame_info & 0x03) << 6
                | (self.callsign_info & 0x03) << 4
                | (self.call_mode & 0x03) << 2
                | (self.block_number & 0x03),
            (self.block_total & 0x03) << 6
                | (self.frame_number & 0x07) << 3
                | (self.frame_total & 0x07),
            u8::from(self.dev) << 6
                | (self.route & 0x07) << 3
                | u8::from(self.voip) << 2
                | (self.data_type & 0x03),
            u8::from(self.sql) << 7 | (self.sql_code & 0x7F),
        ]
    }
}

impl fmt::Display for Fich {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FI={:X} FN={} DT={:X}",
            self.frame_info, self.frame_number, self.data_type
        )
    }
}

/// Callsigns found in a single frame's payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Callsigns {
    /// Calling station
    pub source: Option<String>,
    /// Called station or group
    pub destination: Option<String>,
}

/// Extract whatever callsign fields a frame carries
///
/// Header and terminator frames carry both; V/D communications frames carry
/// the destination in frame 0 and the source in frame 1 of each superframe.
pub fn extract_callsigns(ysf: &[u8], fich: &Fich) -> Callsigns {
    let Some(payload) = ysf.get(PAYLOAD_OFFSET..FRAME_LEN) else {
        return Callsigns::default();
    };

    match fich.frame_info {
        FI_HEADER | FI_TERMINATOR => Callsigns {
            destination: parse_callsign(&payload[..CALLSIGN_LEN]),
            source: parse_callsign(&payload[CALLSIGN_LEN..2 * CALLSIGN_LEN]),
        },
        FI_COMMUNICATIONS if matches!(fich.data_type, DT_VD_MODE1 | DT_VD_MODE2) => {
            let field = parse_callsign(&payload[..CALLSIGN_LEN]);
            match fich.frame_number {
                0 => Callsigns {
                    destination: field,
                    source: None,
                },
                1 => Callsigns {
                    destination: None,
                    source: field,
                },
                _ => Callsigns::default(),
            }
        }
        _ => Callsigns::default(),
    }
}

/// Parse a space-padded callsign field
///
/// Returns `None` for blank fields and fields holding non-printable bytes.
pub fn parse_callsign(field: &[u8]) -> Option<String> {
    let trimmed = match field.iter().rposition(|&b| b != b' ' && b != 0) {
        Some(last) => &field[..=last],
        None => return None,
    };

    if !trimmed.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return None;
    }

    Some(String::from_utf8_lossy(trimmed).into_owned())
}

/// Write a callsign into a field, space padded and truncated to fit
pub fn write_callsign(field: &mut [u8], callsign: &str) {
    field.fill(b' ');
    for (dst, src) in field.iter_mut().zip(callsign.bytes()) {
        *dst = src;
    }
}

/// Write the sync pattern at the start of a YSF frame
pub fn add_sync(ysf: &mut [u8]) {
    if let Some(head) = ysf.get_mut(..SYNC.len()) {
        head.copy_from_slice(&SYNC);
    }
}

/// The 120 YSF bytes following the modem's tag and flag bytes
pub fn ysf_bytes(frame: &Frame) -> &[u8] {
    frame.body().get(1..).unwrap_or(&[])
}

/// Mutable access to the YSF bytes of a frame
pub fn ysf_bytes_mut(frame: &mut Frame) -> &mut [u8] {
    frame.body_mut().get_mut(1..).unwrap_or(&mut [])
}

/// The modem's flag byte
pub fn modem_flags(frame: &Frame) -> u8 {
    frame.body().first().copied().unwrap_or(0)
}

/// Whether the modem verified the FICH checksum
pub fn checksum_ok(frame: &Frame) -> bool {
    modem_flags(frame) & FLAG_CKSUM_OK == FLAG_CKSUM_OK
}

/// Replace the modem's flag byte
pub fn set_modem_flags(frame: &mut Frame, flags: u8) {
    if let Some(b) = frame.body_mut().first_mut() {
        *b = flags;
    }
}

/// Modem flag byte describing a good frame with the given FICH
pub fn flags_for(fich: &Fich) -> u8 {
    FLAG_CKSUM_OK | (fich.frame_info << 6) & FLAG_FI_MASK | (fich.data_type << 4) & FLAG_DT_MASK
}

/// Build a complete modem frame: tag, flags, sync, FICH and payload
///
/// `payload` is copied into the payload area and truncated to fit.
pub fn build_frame(tag: FrameTag, fich: &Fich, payload: &[u8]) -> Frame {
    let mut body = [0u8; MODEM_FRAME_LEN - 1];
    body[0] = flags_for(fich);

    let ysf = &mut body[1..];
    add_sync(ysf);

    let fields = fich.to_bytes();
    let crc = ccitt_fich(&fields).to_be_bytes();
    ysf[FICH_OFFSET..FICH_OFFSET + 4].copy_from_slice(&fields);
    ysf[FICH_OFFSET + 4..FICH_OFFSET + FICH_LEN].copy_from_slice(&crc);

    let n = payload.len().min(PAYLOAD_LEN);
    ysf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + n].copy_from_slice(&payload[..n]);

    Frame::from_array(tag, &body)
}
