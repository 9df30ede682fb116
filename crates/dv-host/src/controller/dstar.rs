//! D-Star controller
//!
//! A valid radio header opens the session. Voice frames follow until an
//! end-of-transmission frame or a lost signal. In duplex the header is
//! re-sent with the repeater flag set, and voice frames are queued unchanged.

use std::time::Duration;

use dv_protocol::dstar::{self, DStarHeader, FLAG_REPEATER};
use dv_protocol::{Channel, Frame, FrameTag, Mode};
use tracing::{debug, info};

use super::{EndReason, ProtocolController, RfState, TransmissionSummary};
use crate::config::HostConfig;
use crate::events::CallEvent;
use crate::queue::FrameQueue;
use crate::timer::Timer;

const QUEUE_SIZE: usize = 1000;

/// D-Star frames per second (20 ms each)
const FRAMES_PER_SECOND: f32 = 50.0;

const CHANNELS: &[Channel] = &[Channel::DStar];

/// The D-Star session controller
pub struct DStarController {
    callsign: String,
    duplex: bool,
    self_only: bool,
    blacklist: Vec<String>,
    state: RfState,
    queue: FrameQueue,
    timeout: Timer,
    frames: u32,
    header: Option<DStarHeader>,
    calls: Vec<CallEvent>,
    last: Option<TransmissionSummary>,
}

impl DStarController {
    /// Create a controller for a repeater with the given callsign
    pub fn new(callsign: impl Into<String>, duplex: bool, timeout: Duration) -> Self {
        Self {
            callsign: callsign.into(),
            duplex,
            self_only: false,
            blacklist: Vec::new(),
            state: RfState::Listening,
            queue: FrameQueue::new(QUEUE_SIZE, "D-Star Control"),
            timeout: Timer::new(timeout),
            frames: 0,
            header: None,
            calls: Vec::new(),
            last: None,
        }
    }

    /// Create a controller as described by the host configuration
    pub fn from_config(config: &HostConfig) -> Self {
        let mut controller = Self::new(&config.callsign, config.duplex, config.timeout());
        controller.self_only = config.dstar.self_only;
        controller.blacklist = config.dstar.blacklist.clone();
        controller
    }

    /// Only admit the repeater's own callsign
    pub fn set_self_only(&mut self, self_only: bool) {
        self.self_only = self_only;
    }

    /// Callsigns that are never admitted
    pub fn set_blacklist(&mut self, blacklist: Vec<String>) {
        self.blacklist = blacklist;
    }

    /// Session state
    pub fn state(&self) -> RfState {
        self.state
    }

    /// Header of the current session
    pub fn header(&self) -> Option<&DStarHeader> {
        self.header.as_ref()
    }

    fn seconds(&self) -> f32 {
        self.frames as f32 / FRAMES_PER_SECOND
    }

    fn admit(&self, header: &DStarHeader) -> bool {
        if self.self_only && !header.my.eq_ignore_ascii_case(self.callsign.trim()) {
            info!("D-Star, invalid access attempt from {}", header.my);
            return false;
        }

        if self
            .blacklist
            .iter()
            .any(|b| b.trim().eq_ignore_ascii_case(&header.my))
        {
            info!("D-Star, {} is blacklisted", header.my);
            return false;
        }

        true
    }

    fn write_queue(&mut self, frame: &Frame) {
        if self.timeout.is_running() && self.timeout.has_expired() {
            return;
        }
        let _ = self.queue.push(frame);
    }

    fn open_session(&mut self, header: DStarHeader) {
        self.frames = 0;
        self.timeout.start();
        self.state = RfState::Audio;

        info!(
            "D-Star, received RF header from {}/{} to {}",
            header.my, header.my_suffix, header.your
        );
        self.calls.push(CallEvent::Active {
            mode: Mode::DStar,
            slot: None,
            source: header.my.clone(),
            destination: header.your.clone(),
        });

        if self.duplex {
            let repeated = DStarHeader {
                flags: [
                    header.flags[0] | FLAG_REPEATER,
                    header.flags[1],
                    header.flags[2],
                ],
                ..header.clone()
            };
            self.write_queue(&dstar::header_frame(&repeated));
        }

        self.header = Some(header);
    }

    fn end_session(&mut self, reason: EndReason) {
        let seconds = self.seconds();
        match reason {
            EndReason::EndOfTransmission => {
                info!("D-Star, received RF end of transmission, {:.1} seconds", seconds)
            }
            EndReason::Lost => info!("D-Star, transmission lost, {:.1} seconds", seconds),
        }

        self.last = Some(TransmissionSummary {
            frames: self.frames,
            seconds,
            reason,
        });
        self.state = RfState::Listening;
        self.timeout.stop();
        self.header = None;
        self.calls.push(CallEvent::Cleared {
            mode: Mode::DStar,
            slot: None,
        });
    }
}

impl ProtocolController for DStarController {
    fn mode(&self) -> Mode {
        Mode::DStar
    }

    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn write_modem(&mut self, _channel: Channel, frame: Frame) -> bool {
        match (frame.tag(), self.state) {
            (FrameTag::Lost, RfState::Audio) => {
                self.end_session(EndReason::Lost);
                false
            }
            (FrameTag::Header, RfState::Listening) => {
                let header = match DStarHeader::decode(frame.body()) {
                    Ok(header) => header,
                    Err(e) => {
                        info!("D-Star, invalid header: {}", e);
                        return false;
                    }
                };

                if !self.admit(&header) {
                    return false;
                }

                self.open_session(header);
                true
            }
            (FrameTag::Data, RfState::Audio) => {
                if frame.len() != dstar::DATA_LEN + 1 {
                    debug!("D-Star, ignoring frame of {} bytes", frame.len());
                    return true;
                }
                self.frames += 1;
                if self.duplex {
                    self.write_queue(&frame);
                }
                true
            }
            (FrameTag::EndOfTransmission, RfState::Audio) => {
                if self.duplex {
                    self.write_queue(&dstar::eot_frame());
                }
                self.end_session(EndReason::EndOfTransmission);
                false
            }
            (tag, _) => {
                debug!("D-Star, ignoring {:?} frame in state {:?}", tag, self.state);
                false
            }
        }
    }

    fn read_modem(&mut self, _channel: Channel) -> Option<Frame> {
        self.queue.pop()
    }

    fn clock(&mut self, elapsed: Duration) {
        self.timeout.clock(elapsed);
    }

    fn last_transmission(&self) -> Option<TransmissionSummary> {
        self.last
    }

    fn drain_calls(&mut self) -> Vec<CallEvent> {
        std::mem::take(&mut self.calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_from(my: &str) -> Frame {
        dstar::header_frame(&DStarHeader {
            rpt2: "GB3XX  G".into(),
            rpt1: "GB3XX  C".into(),
            your: "CQCQCQ".into(),
            my: my.into(),
            my_suffix: "ID51".into(),
            ..DStarHeader::default()
        })
    }

    fn voice() -> Frame {
        dstar::data_frame(&[0x11; dstar::DATA_LEN])
    }

    fn write(controller: &mut DStarController, frame: Frame) -> bool {
        controller.write_modem(Channel::DStar, frame)
    }

    #[test]
    fn test_session_lifecycle() {
        let mut ds = DStarController::new("GB3XX", false, Duration::from_secs(180));
        assert!(!write(&mut ds, voice()));

        assert!(write(&mut ds, header_from("G4KLX")));
        assert_eq!(ds.state(), RfState::Audio);
        assert_eq!(ds.header().unwrap().my, "G4KLX");

        for _ in 0..50 {
            assert!(write(&mut ds, voice()));
        }
        assert!(!write(&mut ds, dstar::eot_frame()));

        let summary = ds.last_transmission().unwrap();
        assert_eq!(summary.frames, 50);
        assert_eq!(format!("{:.1}", summary.seconds), "1.0");

        let calls = ds.drain_calls();
        assert_eq!(
            calls,
            vec![
                CallEvent::Active {
                    mode: Mode::DStar,
                    slot: None,
                    source: "G4KLX".into(),
                    destination: "CQCQCQ".into(),
                },
                CallEvent::Cleared {
                    mode: Mode::DStar,
                    slot: None
                },
            ]
        );
    }

    #[test]
    fn test_corrupt_header_rejected() {
        let mut ds = DStarController::new("GB3XX", false, Duration::from_secs(180));
        let mut frame = header_from("G4KLX");
        frame.body_mut()[30] ^= 0x01;
        assert!(!write(&mut ds, frame));
        assert_eq!(ds.state(), RfState::Listening);
    }

    #[test]
    fn test_self_only_and_blacklist() {
        let mut ds = DStarController::new("GB3XX", false, Duration::from_secs(180));
        ds.set_self_only(true);
        assert!(!write(&mut ds, header_from("G4KLX")));
        assert!(write(&mut ds, header_from("GB3XX")));

        let mut ds = DStarController::new("GB3XX", false, Duration::from_secs(180));
        ds.set_blacklist(vec!["M0BAD".into()]);
        assert!(!write(&mut ds, header_from("M0BAD")));
        assert!(write(&mut ds, header_from("M0GOOD")));
    }

    #[test]
    fn test_duplex_repeats_header_with_repeater_flag() {
        let mut ds = DStarController::new("GB3XX", true, Duration::from_secs(180));
        write(&mut ds, header_from("G4KLX"));
        write(&mut ds, voice());
        write(&mut ds, dstar::eot_frame());

        let header = ds.read_modem(Channel::DStar).unwrap();
        assert_eq!(header.tag(), FrameTag::Header);
        assert!(DStarHeader::decode(header.body()).unwrap().is_repeater());
        assert_eq!(ds.read_modem(Channel::DStar).unwrap(), voice());
        assert_eq!(
            ds.read_modem(Channel::DStar).unwrap().tag(),
            FrameTag::EndOfTransmission
        );
        assert!(ds.read_modem(Channel::DStar).is_none());
    }

    #[test]
    fn test_lost_signal() {
        let mut ds = DStarController::new("GB3XX", false, Duration::from_secs(180));
        write(&mut ds, header_from("G4KLX"));
        assert!(!write(&mut ds, Frame::lost()));
        assert_eq!(ds.state(), RfState::Listening);
        assert_eq!(ds.last_transmission().unwrap().reason, EndReason::Lost);
    }
}
