//! Traffic generators
//!
//! Each transmitter plays the part of a radio keying up on one protocol and
//! produces the frames the modem would deliver for it.

use dv_protocol::dmr::{self, Csbk, LinkControl, BURST_LEN, CSBKO_BSDWNACT, FLCO_GROUP};
use dv_protocol::dstar::{self, DStarHeader};
use dv_protocol::fusion::{
    self, Fich, CALLSIGN_LEN, CM_GROUP_CQ, CM_INDIVIDUAL, CQ_DESTINATION, DT_VD_MODE2, FICH_OFFSET,
    FI_COMMUNICATIONS, FI_HEADER, FI_TERMINATOR, PAYLOAD_LEN,
};
use dv_protocol::{Frame, FrameTag};

/// Frames in a System Fusion superframe
const SUPERFRAME: u8 = 7;

/// A System Fusion radio in V/D mode 2
#[derive(Debug, Clone)]
pub struct FusionTransmitter {
    source: String,
    destination: String,
    frame_number: u8,
}

impl FusionTransmitter {
    /// Create a transmitter calling `destination` from `source`
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            frame_number: 0,
        }
    }

    fn call_mode(&self) -> u8 {
        if self.destination == CQ_DESTINATION {
            CM_GROUP_CQ
        } else {
            CM_INDIVIDUAL
        }
    }

    fn fich(&self, frame_info: u8, frame_number: u8) -> Fich {
        Fich {
            frame_info,
            call_mode: self.call_mode(),
            frame_number,
            frame_total: SUPERFRAME - 1,
            data_type: DT_VD_MODE2,
            ..Fich::default()
        }
    }

    fn csd1(&self) -> [u8; PAYLOAD_LEN] {
        let mut payload = [0u8; PAYLOAD_LEN];
        fusion::write_callsign(&mut payload[..CALLSIGN_LEN], &self.destination);
        fusion::write_callsign(&mut payload[CALLSIGN_LEN..2 * CALLSIGN_LEN], &self.source);
        payload
    }

    /// Position of the next voice frame in its superframe
    pub fn set_frame_number(&mut self, frame_number: u8) {
        self.frame_number = frame_number % SUPERFRAME;
    }

    /// Header frame; restarts the superframe
    pub fn header(&mut self) -> Frame {
        self.frame_number = 0;
        fusion::build_frame(FrameTag::Data, &self.fich(FI_HEADER, 0), &self.csd1())
    }

    /// Next voice frame
    ///
    /// Frame 0 of each superframe carries the destination, frame 1 the
    /// source.
    pub fn voice(&mut self) -> Frame {
        let n = self.frame_number;
        self.frame_number = (n + 1) % SUPERFRAME;

        let mut payload = [0u8; PAYLOAD_LEN];
        match n {
            0 => fusion::write_callsign(&mut payload[..CALLSIGN_LEN], &self.destination),
            1 => fusion::write_callsign(&mut payload[..CALLSIGN_LEN], &self.source),
            _ => payload[..CALLSIGN_LEN].fill(b'*'),
        }

        fusion::build_frame(FrameTag::Data, &self.fich(FI_COMMUNICATIONS, n), &payload)
    }

    /// Terminator frame
    pub fn terminator(&mut self) -> Frame {
        fusion::build_frame(
            FrameTag::EndOfTransmission,
            &self.fich(FI_TERMINATOR, 0),
            &self.csd1(),
        )
    }

    /// A copy of `frame` whose FICH did not survive the air interface
    pub fn corrupt(frame: &Frame) -> Frame {
        let mut bad = frame.clone();
        let flags = fusion::modem_flags(&bad) & !fusion::FLAG_CKSUM_OK;
        fusion::set_modem_flags(&mut bad, flags);
        if let Some(b) = fusion::ysf_bytes_mut(&mut bad).get_mut(FICH_OFFSET) {
            *b ^= 0xA5;
        }
        bad
    }
}

/// A D-Star radio
#[derive(Debug, Clone)]
pub struct DStarTransmitter {
    header: DStarHeader,
    sequence: u8,
}

impl DStarTransmitter {
    /// Create a transmitter calling `your` from `my` through `repeater`
    pub fn new(my: impl Into<String>, your: impl Into<String>, repeater: &str) -> Self {
        Self {
            header: DStarHeader {
                flags: [0x00; 3],
                rpt2: format!("{:<7}G", repeater),
                rpt1: format!("{:<7}C", repeater),
                your: your.into(),
                my: my.into(),
                my_suffix: String::new(),
            },
            sequence: 0,
        }
    }

    /// Header frame
    pub fn header(&mut self) -> Frame {
        self.sequence = 0;
        dstar::header_frame(&self.header)
    }

    /// Next voice frame
    pub fn voice(&mut self) -> Frame {
        let mut data = [0u8; dstar::DATA_LEN];
        data[..9].fill(0x9E);
        data[9] = self.sequence;
        self.sequence = (self.sequence + 1) % 21;
        dstar::data_frame(&data)
    }

    /// End-of-transmission frame
    pub fn eot(&mut self) -> Frame {
        dstar::eot_frame()
    }
}

/// A DMR radio making a call on one slot
#[derive(Debug, Clone)]
pub struct DmrTransmitter {
    lc: LinkControl,
    n: u8,
}

impl DmrTransmitter {
    /// Create a transmitter making a group call to talkgroup `tg`
    pub fn group(src_id: u32, tg: u32) -> Self {
        Self {
            lc: LinkControl {
                flco: FLCO_GROUP,
                dst_id: tg,
                src_id,
                ..LinkControl::default()
            },
            n: 0,
        }
    }

    /// Voice LC header burst
    pub fn header(&mut self) -> Frame {
        self.n = 0;
        dmr::voice_lc_header_frame(&self.lc)
    }

    /// Next voice burst
    pub fn voice(&mut self) -> Frame {
        let n = self.n;
        self.n = (n + 1) % 6;
        dmr::voice_frame(n, &[0x55; BURST_LEN])
    }

    /// Terminator with LC burst
    pub fn terminator(&mut self) -> Frame {
        dmr::terminator_frame(&self.lc)
    }

    /// Repeater wake-up CSBK addressed to `repeater_id`
    pub fn wakeup(&self, repeater_id: u32) -> Frame {
        dmr::csbk_frame(&Csbk {
            opcode: CSBKO_BSDWNACT,
            fid: 0,
            dst_id: repeater_id,
            src_id: self.lc.src_id,
        })
    }
}
