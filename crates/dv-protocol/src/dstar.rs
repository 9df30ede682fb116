//! D-Star radio header and frames
//!
//! A D-Star transmission starts with a 41-byte radio header, followed by
//! 12-byte voice frames (9 bytes AMBE, 3 bytes slow data) and an
//! end-of-transmission marker.
//!
//! # Header Format
//! ```text
//! [FLAGS x3] [RPT2 x8] [RPT1 x8] [YOUR x8] [MY x8] [SUFFIX x4] [CRC x2]
//! ```
//!
//! The CRC is the reflected CRC-CCITT of the first 39 bytes, inverted and
//! stored little-endian.

use crate::crc::ccitt_dstar;
use crate::error::CodecError;
use crate::frame::{Frame, FrameTag};

/// Radio header length
pub const HEADER_LEN: usize = 41;
/// Voice frame length
pub const DATA_LEN: usize = 12;
/// Callsign field length
pub const CALLSIGN_LEN: usize = 8;
/// MY callsign suffix length
pub const SUFFIX_LEN: usize = 4;

/// Flag 1 bit: frame relayed by a repeater
pub const FLAG_REPEATER: u8 = 0x40;

/// Decoded D-Star radio header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DStarHeader {
    /// Control flags
    pub flags: [u8; 3],
    /// Destination repeater
    pub rpt2: String,
    /// Departure repeater
    pub rpt1: String,
    /// Called station
    pub your: String,
    /// Calling station
    pub my: String,
    /// Calling station suffix
    pub my_suffix: String,
}

impl DStarHeader {
    /// Decode a header, verifying the CRC
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        if raw.len() < HEADER_LEN {
            return Err(CodecError::ShortBuffer {
                needed: HEADER_LEN,
                actual: raw.len(),
            });
        }

        let expected = ccitt_dstar(&raw[..HEADER_LEN - 2]);
        let actual = u16::from_le_bytes([raw[HEADER_LEN - 2], raw[HEADER_LEN - 1]]);
        if expected != actual {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            flags: [raw[0], raw[1], raw[2]],
            rpt2: field(&raw[3..11]),
            rpt1: field(&raw[11..19]),
            your: field(&raw[19..27]),
            my: field(&raw[27..35]),
            my_suffix: field(&raw[35..39]),
        })
    }

    /// Encode a header, computing the CRC
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut raw = [b' '; HEADER_LEN];
        raw[..3].copy_from_slice(&self.flags);
        put(&mut raw[3..11], &self.rpt2);
        put(&mut raw[11..19], &self.rpt1);
        put(&mut raw[19..27], &self.your);
        put(&mut raw[27..35], &self.my);
        put(&mut raw[35..39], &self.my_suffix);

        let crc = ccitt_dstar(&raw[..HEADER_LEN - 2]).to_le_bytes();
        raw[HEADER_LEN - 2..].copy_from_slice(&crc);
        raw
    }

    /// Whether the header was relayed by a repeater
    pub fn is_repeater(&self) -> bool {
        self.flags[0] & FLAG_REPEATER != 0
    }
}

fn field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

fn put(dst: &mut [u8], value: &str) {
    dst.fill(b' ');
    for (d, s) in dst.iter_mut().zip(value.bytes()) {
        *d = s;
    }
}

/// Build a header modem frame
pub fn header_frame(header: &DStarHeader) -> Frame {
    Frame::from_array(FrameTag::Header, &header.encode())
}

/// Build a voice modem frame
pub fn data_frame(data: &[u8; DATA_LEN]) -> Frame {
    Frame::from_array(FrameTag::Data, data)
}

/// Build an end-of-transmission modem frame
pub fn eot_frame() -> Frame {
    Frame::from_array(FrameTag::EndOfTransmission, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DStarHeader {
        DStarHeader {
            flags: [0x00, 0x00, 0x00],
            rpt2: "GB7XX  G".into(),
            rpt1: "GB7XX  B".into(),
            your: "CQCQCQ".into(),
            my: "G4KLX".into(),
            my_suffix: "ID51".into(),
        }
    }

    #[test]
    fn test_header_encode_decode() {
        let raw = sample().encode();
        let decoded = DStarHeader::decode(&raw).unwrap();
        assert_eq!(decoded, sample());
        assert!(!decoded.is_repeater());
    }

    #[test]
    fn test_header_crc_mismatch() {
        let mut raw = sample().encode();
        raw[30] ^= 0x20;
        assert!(matches!(
            DStarHeader::decode(&raw),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_frame_tags() {
        assert_eq!(header_frame(&sample()).tag(), FrameTag::Header);
        assert_eq!(header_frame(&sample()).len(), HEADER_LEN + 1);
        assert_eq!(data_frame(&[0; DATA_LEN]).tag(), FrameTag::Data);
        assert_eq!(eot_frame().len(), 1);
    }
}
