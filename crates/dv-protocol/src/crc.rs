//! CRC-CCITT variants used by the sub-headers
//!
//! Two flavours appear on the air interfaces:
//!
//! - System Fusion FICH: polynomial 0x1021, initial value 0x0000, result
//!   inverted and stored big-endian
//! - D-Star header: reflected polynomial 0x8408, initial value 0xFFFF,
//!   result inverted and stored little-endian

/// Compute the FICH flavour of CRC-CCITT over `data`
pub fn ccitt_fich(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }

    !crc
}

/// Compute the D-Star flavour of CRC-CCITT over `data`
pub fn ccitt_dstar(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;

    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0x8408;
            } else {
                crc >>= 1;
            }
        }
    }

    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ccitt_fich_known_value() {
        // CRC-16/XMODEM of "123456789" is 0x31C3; this variant inverts it
        assert_eq!(ccitt_fich(b"123456789"), !0x31C3);
    }

    #[test]
    fn test_ccitt_dstar_known_value() {
        // CRC-16/X-25 of "123456789"
        assert_eq!(ccitt_dstar(b"123456789"), 0x906E);
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let data = [0x40, 0x1E, 0x08, 0x00];
        let mut corrupted = data;
        corrupted[1] ^= 0x04;
        assert_ne!(ccitt_fich(&data), ccitt_fich(&corrupted));
        assert_ne!(ccitt_dstar(&data), ccitt_dstar(&corrupted));
    }
}
