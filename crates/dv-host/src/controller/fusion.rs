//! System Fusion (YSF) controller
//!
//! Handles one RF session at a time:
//!
//! - a checksum-valid DATA frame opens the session (`Listening` -> `Audio`)
//! - each admitted frame has its sync rewritten and its FICH decoded; when the
//!   FICH is unreadable the last good one is reused with FI forced to
//!   "communications"
//! - source and destination callsigns are learned as they turn up (late
//!   entry) and the display is told whenever one of them becomes known
//! - in duplex, every frame is re-encoded with the busy marker and queued for
//!   retransmission; with the parrot enabled, a not-busy copy is recorded for
//!   replay after the session
//! - an EOT frame or a signal-lost marker closes the session
//!
//! Once the session timeout has expired, frames are still admitted (the
//! channel stays owned) but nothing more is queued or recorded.

use std::time::Duration;

use dv_protocol::fusion::{
    self, extract_callsigns, Fich, CM_GROUP_CQ, CQ_DESTINATION, FI_COMMUNICATIONS,
    MODEM_FRAME_LEN, MR_BUSY, MR_NOT_BUSY,
};
use dv_protocol::{Channel, Frame, FrameTag, Mode};
use tracing::{debug, error, info, warn};

use super::{EndReason, ProtocolController, RfState, TransmissionSummary, UNKNOWN_CALLSIGN};
use crate::capture::{CaptureSink, FileCaptureSink, NullCapture};
use crate::config::HostConfig;
use crate::events::CallEvent;
use crate::parrot::ParrotRecorder;
use crate::queue::FrameQueue;
use crate::timer::Timer;

/// Retransmission queue size in bytes
const QUEUE_SIZE: usize = 1000;

/// YSF frames per second of audio
const FRAMES_PER_SECOND: f32 = 10.0;

const CHANNELS: &[Channel] = &[Channel::Fusion];

/// The System Fusion session controller
pub struct FusionController {
    duplex: bool,
    state: RfState,
    queue: FrameQueue,
    timeout: Timer,
    frames: u32,
    fich: Fich,
    source: Option<String>,
    destination: Option<String>,
    parrot: Option<ParrotRecorder>,
    capture: Box<dyn CaptureSink>,
    calls: Vec<CallEvent>,
    last: Option<TransmissionSummary>,
}

impl FusionController {
    /// Create a controller with no parrot and no capture
    pub fn new(duplex: bool, timeout: Duration) -> Self {
        Self {
            duplex,
            state: RfState::Listening,
            queue: FrameQueue::new(QUEUE_SIZE, "YSF Control"),
            timeout: Timer::new(timeout),
            frames: 0,
            fich: Fich::default(),
            source: None,
            destination: None,
            parrot: None,
            capture: Box::new(NullCapture),
            calls: Vec::new(),
            last: None,
        }
    }

    /// Create a controller as described by the host configuration
    pub fn from_config(config: &HostConfig) -> Self {
        let mut controller = Self::new(config.duplex, config.timeout());

        if config.fusion.parrot {
            controller = controller.with_parrot(ParrotRecorder::for_timeout(
                config.timeout(),
                config.fusion.parrot_delay(),
            ));
        }

        if let Some(dir) = &config.fusion.capture_dir {
            controller = controller.with_capture(Box::new(FileCaptureSink::new(dir, "YSF")));
        }

        controller
    }

    /// Record each session and replay it afterwards
    pub fn with_parrot(mut self, parrot: ParrotRecorder) -> Self {
        self.parrot = Some(parrot);
        self
    }

    /// Send every received frame to `sink`
    pub fn with_capture(mut self, sink: Box<dyn CaptureSink>) -> Self {
        self.capture = sink;
        self
    }

    /// Session state
    pub fn state(&self) -> RfState {
        self.state
    }

    /// Frames counted in the current session
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Calling station, once known
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Called station or group, once known
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Last FICH decoded (or reconstructed)
    pub fn fich(&self) -> &Fich {
        &self.fich
    }

    fn seconds(&self) -> f32 {
        self.frames as f32 / FRAMES_PER_SECOND
    }

    fn open_session(&mut self) {
        self.frames = 0;
        self.timeout.start();
        self.source = None;
        self.destination = None;
        self.state = RfState::Audio;

        if let Err(e) = self.capture.open() {
            error!("YSF, unable to open capture: {}", e);
        }
    }

    fn end_session(&mut self, reason: EndReason, seconds: f32) {
        self.last = Some(TransmissionSummary {
            frames: self.frames,
            seconds,
            reason,
        });

        self.state = RfState::Listening;
        self.timeout.stop();
        self.source = None;
        self.destination = None;
        self.calls.push(CallEvent::Cleared {
            mode: Mode::Fusion,
            slot: None,
        });
        self.capture.close();
    }

    /// Copy of `frame` carrying the current FICH with the given route marker
    fn outbound(&self, frame: &Frame, tag: FrameTag, route: u8) -> Frame {
        let mut out = frame.clone();
        let fich = Fich { route, ..self.fich };
        if let Err(e) = fich.encode(fusion::ysf_bytes_mut(&mut out)) {
            debug!("YSF, unable to encode FICH: {}", e);
        }
        out.set_tag(tag);
        fusion::set_modem_flags(&mut out, 0x00);
        out
    }

    fn retransmit(&mut self, frame: &Frame, tag: FrameTag) {
        let route = if self.duplex { MR_BUSY } else { MR_NOT_BUSY };
        let out = self.outbound(frame, tag, route);

        if self.duplex {
            self.write_queue(&out);
        }

        if self.parrot.is_some() {
            if self.duplex {
                let recorded = self.outbound(frame, tag, MR_NOT_BUSY);
                self.write_parrot(&recorded);
            } else {
                self.write_parrot(&out);
            }
        }

        // Captures hold the re-encoded FICH, as it went out on air
        if let Err(e) = self.capture.write(fusion::ysf_bytes(&out)) {
            error!("YSF, unable to write capture: {}", e);
        }
    }

    fn timed_out(&self) -> bool {
        self.timeout.is_running() && self.timeout.has_expired()
    }

    fn write_queue(&mut self, frame: &Frame) {
        if self.timed_out() {
            return;
        }

        // Overflow is already logged by the queue
        let _ = self.queue.push(frame);
    }

    fn write_parrot(&mut self, frame: &Frame) {
        let timed_out = self.timed_out();

        let Some(parrot) = self.parrot.as_mut() else {
            return;
        };

        if !timed_out && !parrot.write(frame) {
            warn!("YSF, parrot buffer full");
        }

        // Close the recording even when the EOT itself was not recorded
        if frame.tag() == FrameTag::EndOfTransmission {
            parrot.end();
        }
    }

    fn end_of_transmission(&mut self, mut frame: Frame) {
        fusion::add_sync(fusion::ysf_bytes_mut(&mut frame));

        match Fich::decode(fusion::ysf_bytes(&frame)) {
            Ok(fich) => self.fich = fich,
            Err(e) => debug!("YSF, EOT FICH unreadable: {}", e),
        }
        info!("YSF, EOT, {}", self.fich);

        let calls = extract_callsigns(fusion::ysf_bytes(&frame), &self.fich);
        debug!(
            "YSF, EOT payload source={:?} destination={:?}",
            calls.source, calls.destination
        );

        // The terminator itself carries no audio
        let seconds = self.seconds();

        self.retransmit(&frame, FrameTag::EndOfTransmission);

        info!("YSF, received RF end of transmission, {:.1} seconds", seconds);
        self.end_session(EndReason::EndOfTransmission, seconds);
    }

    fn communications(&mut self, mut frame: Frame, valid: bool) {
        fusion::add_sync(fusion::ysf_bytes_mut(&mut frame));

        let decoded = if valid {
            Fich::decode(fusion::ysf_bytes(&frame)).ok()
        } else {
            None
        };

        match decoded {
            Some(fich) => {
                self.fich = fich;
                debug!("YSF, Valid FICH, {}", fich);
                self.learn_callsigns(&frame);
            }
            None => {
                info!("YSF, invalid FICH");
                self.fich.frame_info = FI_COMMUNICATIONS;
            }
        }

        self.frames += 1;
        self.retransmit(&frame, FrameTag::Data);
    }

    fn learn_callsigns(&mut self, frame: &Frame) {
        let mut change = false;

        if self.fich.call_mode == CM_GROUP_CQ && self.destination.is_none() {
            self.destination = Some(CQ_DESTINATION.to_string());
            change = true;
        }

        let found = extract_callsigns(fusion::ysf_bytes(frame), &self.fich);

        if self.source.is_none() && found.source.is_some() {
            self.source = found.source;
            change = true;
        }

        if self.destination.is_none() && found.destination.is_some() {
            self.destination = found.destination;
            change = true;
        }

        if change {
            self.calls.push(CallEvent::Active {
                mode: Mode::Fusion,
                slot: None,
                source: self.source.as_deref().unwrap_or(UNKNOWN_CALLSIGN).to_string(),
                destination: self
                    .destination
                    .as_deref()
                    .unwrap_or(UNKNOWN_CALLSIGN)
                    .to_string(),
            });
        }
    }
}

impl ProtocolController for FusionController {
    fn mode(&self) -> Mode {
        Mode::Fusion
    }

    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn write_modem(&mut self, _channel: Channel, frame: Frame) -> bool {
        let tag = frame.tag();

        if tag == FrameTag::Lost {
            if self.state == RfState::Audio {
                let seconds = self.seconds();
                info!("YSF, transmission lost, {:.1} seconds", seconds);

                if let Some(parrot) = self.parrot.as_mut() {
                    parrot.end();
                }

                self.end_session(EndReason::Lost, seconds);
            }
            return false;
        }

        if !matches!(tag, FrameTag::Data | FrameTag::EndOfTransmission) {
            debug!("YSF, ignoring frame tagged {:?}", tag);
            return false;
        }

        if frame.len() < MODEM_FRAME_LEN {
            debug!("YSF, ignoring short frame of {} bytes", frame.len());
            return false;
        }

        let valid = fusion::checksum_ok(&frame);

        if tag == FrameTag::Data && valid && self.state == RfState::Listening {
            self.open_session();
        }

        if self.state != RfState::Audio {
            return false;
        }

        if tag == FrameTag::EndOfTransmission {
            self.end_of_transmission(frame);
            return false;
        }

        self.communications(frame, valid);
        true
    }

    fn read_modem(&mut self, _channel: Channel) -> Option<Frame> {
        self.queue.pop()
    }

    fn clock(&mut self, elapsed: Duration) {
        self.timeout.clock(elapsed);

        let Some(parrot) = self.parrot.as_mut() else {
            return;
        };
        parrot.clock(elapsed);

        if self.queue.has_space_for(MODEM_FRAME_LEN) && parrot.has_data() {
            if let Some(frame) = parrot.read() {
                self.write_queue(&frame);
            }
        }
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
    use dv_protocol::fusion::{
        build_frame, write_callsign, CALLSIGN_LEN, DT_VD_MODE2, FI_HEADER, FI_TERMINATOR,
        PAYLOAD_LEN,
    };

    fn fich(frame_info: u8, frame_number: u8) -> Fich {
        Fich {
            frame_info,
            call_mode: CM_GROUP_CQ,
            frame_number,
            frame_total: 6,
            data_type: DT_VD_MODE2,
            ..Fich::default()
        }
    }

    fn data(frame_number: u8) -> Frame {
        build_frame(
            FrameTag::Data,
            &fich(FI_COMMUNICATIONS, frame_number),
            &[0u8; PAYLOAD_LEN],
        )
    }

    fn corrupted() -> Frame {
        let mut frame = data(2);
        fusion::set_modem_flags(&mut frame, 0x00);
        fusion::ysf_bytes_mut(&mut frame)[fusion::FICH_OFFSET] ^= 0xFF;
        frame
    }

    fn eot() -> Frame {
        build_frame(
            FrameTag::EndOfTransmission,
            &fich(FI_TERMINATOR, 0),
            &[0u8; PAYLOAD_LEN],
        )
    }

    fn header_from(source: &str) -> Frame {
        let mut payload = [0u8; PAYLOAD_LEN];
        write_callsign(&mut payload[..CALLSIGN_LEN], "ALL");
        write_callsign(&mut payload[CALLSIGN_LEN..2 * CALLSIGN_LEN], source);
        let fich = Fich {
            call_mode: fusion::CM_RADIO_ID,
            ..fich(FI_HEADER, 0)
        };
        build_frame(FrameTag::Data, &fich, &payload)
    }

    fn write(controller: &mut FusionController, frame: Frame) -> bool {
        controller.write_modem(Channel::Fusion, frame)
    }

    #[test]
    fn test_valid_frame_opens_session() {
        let mut ysf = FusionController::new(false, Duration::from_secs(180));
        assert!(write(&mut ysf, data(0)));
        assert_eq!(ysf.state(), RfState::Audio);
        assert_eq!(ysf.frames(), 1);
        assert_eq!(ysf.destination(), Some(CQ_DESTINATION));
        assert_eq!(ysf.source(), None);

        assert_eq!(
            ysf.drain_calls(),
            vec![CallEvent::Active {
                mode: Mode::Fusion,
                slot: None,
                source: "??????".into(),
                destination: "CQCQCQ".into(),
            }]
        );
    }

    #[test]
    fn test_invalid_frame_does_not_open_session() {
        let mut ysf = FusionController::new(true, Duration::from_secs(180));
        assert!(!write(&mut ysf, corrupted()));
        assert!(!write(&mut ysf, eot()));
        assert_eq!(ysf.state(), RfState::Listening);
        assert!(ysf.read_modem(Channel::Fusion).is_none());
    }

    #[test]
    fn test_eot_summary_counts_audio_frames() {
        let mut ysf = FusionController::new(false, Duration::from_secs(180));
        for n in 0..10 {
            assert!(write(&mut ysf, data(n % 6)));
        }
        assert_eq!(ysf.frames(), 10);

        assert!(!write(&mut ysf, eot()));
        assert_eq!(ysf.state(), RfState::Listening);

        let summary = ysf.last_transmission().unwrap();
        assert_eq!(summary.reason, EndReason::EndOfTransmission);
        assert_eq!(summary.frames, 10);
        assert_eq!(format!("{:.1}", summary.seconds), "1.0");

        let calls = ysf.drain_calls();
        assert_eq!(
            calls.last(),
            Some(&CallEvent::Cleared {
                mode: Mode::Fusion,
                slot: None
            })
        );
    }

    #[test]
    fn test_lost_closes_session() {
        let mut ysf = FusionController::new(false, Duration::from_secs(180));
        assert!(!write(&mut ysf, Frame::lost()));
        assert!(ysf.last_transmission().is_none());

        write(&mut ysf, data(0));
        write(&mut ysf, data(1));
        write(&mut ysf, data(2));
        assert!(!write(&mut ysf, Frame::lost()));

        assert_eq!(ysf.state(), RfState::Listening);
        let summary = ysf.last_transmission().unwrap();
        assert_eq!(summary.reason, EndReason::Lost);
        assert_eq!(format!("{:.1}", summary.seconds), "0.3");
    }

    #[test]
    fn test_invalid_fich_reuses_last_with_communications_fi() {
        let mut ysf = FusionController::new(true, Duration::from_secs(180));
        write(&mut ysf, header_from("G4KLX"));
        assert_eq!(ysf.fich().frame_info, FI_HEADER);

        assert!(write(&mut ysf, corrupted()));
        assert_eq!(ysf.fich().frame_info, FI_COMMUNICATIONS);
        assert_eq!(ysf.fich().call_mode, fusion::CM_RADIO_ID);
        assert_eq!(ysf.frames(), 2);

        // Second queued frame carries the reconstructed FICH
        ysf.read_modem(Channel::Fusion).unwrap();
        let out = ysf.read_modem(Channel::Fusion).unwrap();
        let decoded = Fich::decode(fusion::ysf_bytes(&out)).unwrap();
        assert_eq!(decoded.frame_info, FI_COMMUNICATIONS);
        assert_eq!(decoded.route, MR_BUSY);
    }

    #[test]
    fn test_duplex_retransmits_with_busy_marker() {
        let mut ysf = FusionController::new(true, Duration::from_secs(180));
        let input = data(3);
        write(&mut ysf, input.clone());

        let out = ysf.read_modem(Channel::Fusion).unwrap();
        assert_eq!(out.tag(), FrameTag::Data);
        assert_eq!(fusion::modem_flags(&out), 0x00);
        assert_eq!(&fusion::ysf_bytes(&out)[..5], &fusion::SYNC);

        let fich = Fich::decode(fusion::ysf_bytes(&out)).unwrap();
        assert_eq!(fich.route, MR_BUSY);
        assert_eq!(fich.frame_number, 3);

        // Payload passes through untouched
        assert_eq!(
            &fusion::ysf_bytes(&out)[fusion::PAYLOAD_OFFSET..],
            &fusion::ysf_bytes(&input)[fusion::PAYLOAD_OFFSET..]
        );
    }

    #[test]
    fn test_simplex_queues_nothing() {
        let mut ysf = FusionController::new(false, Duration::from_secs(180));
        write(&mut ysf, data(0));
        assert!(ysf.read_modem(Channel::Fusion).is_none());
    }

    #[test]
    fn test_late_entry_source() {
        let mut ysf = FusionController::new(false, Duration::from_secs(180));
        write(&mut ysf, data(0));
        ysf.drain_calls();

        let mut payload = [0u8; PAYLOAD_LEN];
        write_callsign(&mut payload[..CALLSIGN_LEN], "M0ABC");
        let fn1 = build_frame(FrameTag::Data, &fich(FI_COMMUNICATIONS, 1), &payload);
        write(&mut ysf, fn1.clone());
        assert_eq!(ysf.source(), Some("M0ABC"));

        let calls = ysf.drain_calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            CallEvent::Active { source, destination, .. }
                if source == "M0ABC" && destination == "CQCQCQ"
        ));

        // Already known: no further change reported
        write(&mut ysf, fn1);
        assert!(ysf.drain_calls().is_empty());
    }

    #[test]
    fn test_timeout_suppresses_queueing_but_still_admits() {
        let mut ysf = FusionController::new(true, Duration::from_secs(1));
        write(&mut ysf, data(0));
        assert!(ysf.read_modem(Channel::Fusion).is_some());

        ysf.clock(Duration::from_secs(2));
        assert!(write(&mut ysf, data(1)));
        assert!(ysf.read_modem(Channel::Fusion).is_none());
        assert_eq!(ysf.frames(), 2);
    }

    #[test]
    fn test_parrot_replays_after_hold_off() {
        let mut ysf = FusionController::new(false, Duration::from_secs(180))
            .with_parrot(ParrotRecorder::new(100, Duration::from_secs(2)));

        for n in 0..3 {
            write(&mut ysf, data(n));
        }
        write(&mut ysf, eot());
        assert!(ysf.read_modem(Channel::Fusion).is_none());

        ysf.clock(Duration::from_millis(1500));
        assert!(ysf.read_modem(Channel::Fusion).is_none());

        let mut replayed = Vec::new();
        for _ in 0..10 {
            ysf.clock(Duration::from_millis(500));
            while let Some(frame) = ysf.read_modem(Channel::Fusion) {
                replayed.push(frame);
            }
        }

        assert_eq!(replayed.len(), 4);
        assert_eq!(replayed[3].tag(), FrameTag::EndOfTransmission);
        for frame in &replayed {
            let fich = Fich::decode(fusion::ysf_bytes(frame)).unwrap();
            assert_eq!(fich.route, MR_NOT_BUSY);
        }
    }

    fn drain_replay(ysf: &mut FusionController) -> Vec<Frame> {
        let mut replayed = Vec::new();
        for _ in 0..20 {
            ysf.clock(Duration::from_millis(10));
            while let Some(frame) = ysf.read_modem(Channel::Fusion) {
                replayed.push(frame);
            }
        }
        replayed
    }

    #[test]
    fn test_parrot_closes_timed_out_recording() {
        let mut ysf = FusionController::new(false, Duration::from_secs(1))
            .with_parrot(ParrotRecorder::new(100, Duration::ZERO));

        for n in 0..3 {
            write(&mut ysf, data(n));
        }
        ysf.clock(Duration::from_secs(2));
        write(&mut ysf, eot());
        assert_eq!(ysf.state(), RfState::Listening);

        let first = drain_replay(&mut ysf);
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|f| f.tag() == FrameTag::Data));

        write(&mut ysf, data(0));
        write(&mut ysf, data(1));
        write(&mut ysf, eot());

        let second = drain_replay(&mut ysf);
        assert_eq!(second.len(), 3);
        assert_eq!(second[2].tag(), FrameTag::EndOfTransmission);
    }

    #[test]
    fn test_short_and_unknown_frames_ignored() {
        let mut ysf = FusionController::new(true, Duration::from_secs(180));
        let short = Frame::new(FrameTag::Data, &[fusion::FLAG_CKSUM_OK; 10]).unwrap();
        assert!(!write(&mut ysf, short));

        let mut header = data(0);
        header.set_tag(FrameTag::Header);
        assert!(!write(&mut ysf, header));
        assert_eq!(ysf.state(), RfState::Listening);
    }

    #[derive(Default, Clone)]
    struct MemoryCapture {
        log: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
        frames: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
    }

    impl CaptureSink for MemoryCapture {
        fn open(&mut self) -> Result<(), crate::HostError> {
            self.log.borrow_mut().push("open".into());
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<(), crate::HostError> {
            self.log.borrow_mut().push(format!("write {}", data.len()));
            self.frames.borrow_mut().push(data.to_vec());
            Ok(())
        }

        fn close(&mut self) {
            self.log.borrow_mut().push("close".into());
        }
    }

    #[test]
    fn test_capture_sink_sees_session() {
        let capture = MemoryCapture::default();
        let log = capture.log.clone();

        let mut ysf = FusionController::new(false, Duration::from_secs(180))
            .with_capture(Box::new(capture));
        write(&mut ysf, data(0));
        write(&mut ysf, eot());

        assert_eq!(
            *log.borrow(),
            vec!["open", "write 120", "write 120", "close"]
        );
    }

    #[test]
    fn test_capture_holds_retransmitted_fich() {
        let capture = MemoryCapture::default();
        let frames = capture.frames.clone();

        let mut ysf = FusionController::new(true, Duration::from_secs(180))
            .with_capture(Box::new(capture));
        write(&mut ysf, data(0));
        let sent = ysf.read_modem(Channel::Fusion).unwrap();

        let captured = frames.borrow();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].as_slice(), fusion::ysf_bytes(&sent));
        let fich = Fich::decode(&captured[0]).unwrap();
        assert_eq!(fich.route, MR_BUSY);
    }
}
