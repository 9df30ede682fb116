//! DMR controller
//!
//! DMR carries two independent calls, one per time slot. Each slot has its
//! own session state, timeout and retransmission queue; the controller routes
//! by channel.
//!
//! A voice LC header opens a slot's session and a terminator with LC closes
//! it. Voice and data bursts in between are admitted. In duplex, admitted
//! bursts are queued for retransmission on the same slot.

use std::time::Duration;

use dv_protocol::dmr::{self, BurstKind, Csbk, LinkControl, CSBKO_BSDWNACT};
use dv_protocol::{Channel, Frame, FrameTag, Mode};
use tracing::{debug, info};

use super::{EndReason, ProtocolController, RfState, TransmissionSummary};
use crate::config::HostConfig;
use crate::events::CallEvent;
use crate::queue::FrameQueue;
use crate::timer::Timer;

const QUEUE_SIZE: usize = 5000;

/// Voice bursts per second on one slot (60 ms each)
const BURSTS_PER_SECOND: f32 = 16.667;

const CHANNELS: &[Channel] = &[Channel::DmrSlot1, Channel::DmrSlot2];

#[derive(Debug)]
struct Slot {
    number: u8,
    state: RfState,
    queue: FrameQueue,
    timeout: Timer,
    frames: u32,
    lc: Option<LinkControl>,
    last: Option<TransmissionSummary>,
}

impl Slot {
    fn new(number: u8, timeout: Duration) -> Self {
        Self {
            number,
            state: RfState::Listening,
            queue: FrameQueue::new(QUEUE_SIZE, format!("DMR Slot {}", number)),
            timeout: Timer::new(timeout),
            frames: 0,
            lc: None,
            last: None,
        }
    }

    fn write_queue(&mut self, frame: &Frame) {
        if self.timeout.is_running() && self.timeout.has_expired() {
            return;
        }
        let _ = self.queue.push(frame);
    }
}

/// The DMR session controller (both slots)
pub struct DmrController {
    id: u32,
    duplex: bool,
    self_only: bool,
    blacklist: Vec<u32>,
    slots: [Slot; 2],
    calls: Vec<CallEvent>,
    last: Option<TransmissionSummary>,
}

impl DmrController {
    /// Create a controller for a repeater with the given radio ID
    pub fn new(id: u32, duplex: bool, timeout: Duration) -> Self {
        Self {
            id,
            duplex,
            self_only: false,
            blacklist: Vec::new(),
            slots: [Slot::new(1, timeout), Slot::new(2, timeout)],
            calls: Vec::new(),
            last: None,
        }
    }

    /// Create a controller as described by the host configuration
    pub fn from_config(config: &HostConfig) -> Self {
        let mut controller = Self::new(config.dmr.id, config.duplex, config.timeout());
        controller.self_only = config.dmr.self_only;
        controller.blacklist = config.dmr.blacklist.clone();
        controller
    }

    /// Only admit the repeater's own ID
    pub fn set_self_only(&mut self, self_only: bool) {
        self.self_only = self_only;
    }

    /// Radio IDs that are never admitted
    pub fn set_blacklist(&mut self, blacklist: Vec<u32>) {
        self.blacklist = blacklist;
    }

    /// Session state of a slot (1 or 2)
    pub fn state(&self, slot: u8) -> Option<RfState> {
        self.slot(slot).map(|s| s.state)
    }

    /// Link control of a slot's current call
    pub fn link_control(&self, slot: u8) -> Option<LinkControl> {
        self.slot(slot).and_then(|s| s.lc)
    }

    /// Summary of a slot's most recent completed call
    pub fn slot_transmission(&self, slot: u8) -> Option<TransmissionSummary> {
        self.slot(slot).and_then(|s| s.last)
    }

    fn slot(&self, slot: u8) -> Option<&Slot> {
        self.slots.get(usize::from(slot).checked_sub(1)?)
    }

    fn index(channel: Channel) -> Option<usize> {
        channel.dmr_slot().map(|n| usize::from(n) - 1)
    }

    fn admit(&self, src_id: u32) -> bool {
        if self.self_only && src_id != self.id {
            info!("DMR, invalid access attempt from {}", src_id);
            return false;
        }

        if self.blacklist.contains(&src_id) {
            info!("DMR, {} is blacklisted", src_id);
            return false;
        }

        true
    }

    fn open_session(&mut self, index: usize, lc: LinkControl, frame: &Frame) {
        let duplex = self.duplex;
        let slot = &mut self.slots[index];
        slot.frames = 0;
        slot.timeout.start();
        slot.state = RfState::Audio;
        slot.lc = Some(lc);

        let destination = if lc.is_group() {
            format!("TG {}", lc.dst_id)
        } else {
            lc.dst_id.to_string()
        };
        info!(
            "DMR Slot {}, received RF voice header from {} to {}",
            slot.number, lc.src_id, destination
        );

        if duplex {
            slot.write_queue(frame);
        }

        self.calls.push(CallEvent::Active {
            mode: Mode::Dmr,
            slot: Some(slot.number),
            source: lc.src_id.to_string(),
            destination,
        });
    }

    fn end_session(&mut self, index: usize, reason: EndReason) {
        let slot = &mut self.slots[index];
        let seconds = slot.frames as f32 / BURSTS_PER_SECOND;
        match reason {
            EndReason::EndOfTransmission => info!(
                "DMR Slot {}, received RF end of voice transmission, {:.1} seconds",
                slot.number, seconds
            ),
            EndReason::Lost => info!(
                "DMR Slot {}, transmission lost, {:.1} seconds",
                slot.number, seconds
            ),
        }

        let summary = TransmissionSummary {
            frames: slot.frames,
            seconds,
            reason,
        };
        slot.last = Some(summary);
        self.last = Some(summary);
        slot.state = RfState::Listening;
        slot.timeout.stop();
        slot.lc = None;

        self.calls.push(CallEvent::Cleared {
            mode: Mode::Dmr,
            slot: Some(slot.number),
        });
    }
}

impl ProtocolController for DmrController {
    fn mode(&self) -> Mode {
        Mode::Dmr
    }

    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn write_modem(&mut self, channel: Channel, frame: Frame) -> bool {
        let Some(index) = Self::index(channel) else {
            return false;
        };
        let state = self.slots[index].state;

        if frame.tag() == FrameTag::Lost {
            if state == RfState::Audio {
                self.end_session(index, EndReason::Lost);
            }
            return false;
        }

        let Some(kind) = dmr::burst_kind(&frame) else {
            debug!("DMR Slot {}, unrecognised burst", index + 1);
            return false;
        };

        match (kind, state) {
            (BurstKind::VoiceLcHeader, RfState::Listening) => {
                let lc = match LinkControl::decode(dmr::burst_bytes(&frame)) {
                    Ok(lc) => lc,
                    Err(e) => {
                        debug!("DMR Slot {}, unable to decode LC: {}", index + 1, e);
                        return false;
                    }
                };

                if !self.admit(lc.src_id) {
                    return false;
                }

                self.open_session(index, lc, &frame);
                true
            }
            (BurstKind::TerminatorWithLc, RfState::Audio) => {
                if self.duplex {
                    self.slots[index].write_queue(&frame);
                }
                self.end_session(index, EndReason::EndOfTransmission);
                false
            }
            (BurstKind::Voice { .. }, RfState::Audio) => {
                let slot = &mut self.slots[index];
                slot.frames += 1;
                if self.duplex {
                    slot.write_queue(&frame);
                }
                true
            }
            (_, RfState::Audio) => {
                if self.duplex {
                    self.slots[index].write_queue(&frame);
                }
                true
            }
            (kind, RfState::Listening) => {
                debug!("DMR Slot {}, ignoring {:?} while listening", index + 1, kind);
                false
            }
        }
    }

    fn read_modem(&mut self, channel: Channel) -> Option<Frame> {
        self.slots[Self::index(channel)?].queue.pop()
    }

    fn process_wakeup(&mut self, channel: Channel, frame: &Frame) -> bool {
        if Self::index(channel).is_none() || dmr::burst_kind(frame) != Some(BurstKind::Csbk) {
            return false;
        }

        let Ok(csbk) = Csbk::decode(dmr::burst_bytes(frame)) else {
            return false;
        };
        if csbk.opcode != CSBKO_BSDWNACT {
            return false;
        }

        if !self.admit(csbk.src_id) {
            return false;
        }

        info!("DMR, received RF wakeup from {}", csbk.src_id);
        true
    }

    fn clock(&mut self, elapsed: Duration) {
        for slot in &mut self.slots {
            slot.timeout.clock(elapsed);
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
    use dv_protocol::dmr::{BURST_LEN, FLCO_GROUP};

    fn lc(src_id: u32) -> LinkControl {
        LinkControl {
            flco: FLCO_GROUP,
            dst_id: 91,
            src_id,
            ..LinkControl::default()
        }
    }

    fn wakeup(src_id: u32) -> Frame {
        dmr::csbk_frame(&Csbk {
            opcode: CSBKO_BSDWNACT,
            fid: 0,
            dst_id: 1234,
            src_id,
        })
    }

    #[test]
    fn test_slots_are_independent() {
        let mut ctrl = DmrController::new(1234, false, Duration::from_secs(180));

        assert!(ctrl.write_modem(Channel::DmrSlot1, dmr::voice_lc_header_frame(&lc(100))));
        assert_eq!(ctrl.state(1), Some(RfState::Audio));
        assert_eq!(ctrl.state(2), Some(RfState::Listening));

        assert!(ctrl.write_modem(Channel::DmrSlot2, dmr::voice_lc_header_frame(&lc(200))));
        assert_eq!(ctrl.link_control(2).unwrap().src_id, 200);

        for n in 0..17 {
            assert!(ctrl.write_modem(Channel::DmrSlot1, dmr::voice_frame(n, &[0; BURST_LEN])));
        }
        assert!(!ctrl.write_modem(Channel::DmrSlot1, dmr::terminator_frame(&lc(100))));
        assert_eq!(ctrl.state(1), Some(RfState::Listening));
        assert_eq!(ctrl.state(2), Some(RfState::Audio));
        assert_eq!(ctrl.slot_transmission(1).unwrap().frames, 17);

        let calls = ctrl.drain_calls();
        assert_eq!(
            calls[0],
            CallEvent::Active {
                mode: Mode::Dmr,
                slot: Some(1),
                source: "100".into(),
                destination: "TG 91".into(),
            }
        );
        assert_eq!(
            calls.last(),
            Some(&CallEvent::Cleared {
                mode: Mode::Dmr,
                slot: Some(1)
            })
        );
    }

    #[test]
    fn test_voice_without_header_ignored() {
        let mut ctrl = DmrController::new(1234, true, Duration::from_secs(180));
        assert!(!ctrl.write_modem(Channel::DmrSlot1, dmr::voice_frame(0, &[0; BURST_LEN])));
        assert!(ctrl.read_modem(Channel::DmrSlot1).is_none());
    }

    #[test]
    fn test_duplex_queues_per_slot() {
        let mut ctrl = DmrController::new(1234, true, Duration::from_secs(180));
        ctrl.write_modem(Channel::DmrSlot2, dmr::voice_lc_header_frame(&lc(100)));
        ctrl.write_modem(Channel::DmrSlot2, dmr::voice_frame(0, &[0; BURST_LEN]));

        assert!(ctrl.read_modem(Channel::DmrSlot1).is_none());
        assert_eq!(
            dmr::burst_kind(&ctrl.read_modem(Channel::DmrSlot2).unwrap()),
            Some(BurstKind::VoiceLcHeader)
        );
        assert!(ctrl.read_modem(Channel::DmrSlot2).is_some());
        assert!(ctrl.read_modem(Channel::DStar).is_none());
    }

    #[test]
    fn test_wakeup_filters() {
        let mut ctrl = DmrController::new(1234, true, Duration::from_secs(180));
        assert!(ctrl.process_wakeup(Channel::DmrSlot1, &wakeup(5678)));
        assert!(!ctrl.process_wakeup(Channel::DmrSlot1, &dmr::voice_lc_header_frame(&lc(5678))));
        assert!(!ctrl.process_wakeup(Channel::Fusion, &wakeup(5678)));

        ctrl.set_blacklist(vec![5678]);
        assert!(!ctrl.process_wakeup(Channel::DmrSlot1, &wakeup(5678)));

        ctrl.set_self_only(true);
        assert!(ctrl.process_wakeup(Channel::DmrSlot1, &wakeup(1234)));
        assert!(!ctrl.write_modem(Channel::DmrSlot1, dmr::voice_lc_header_frame(&lc(42))));
    }

    #[test]
    fn test_lost_on_slot() {
        let mut ctrl = DmrController::new(1234, false, Duration::from_secs(180));
        ctrl.write_modem(Channel::DmrSlot1, dmr::voice_lc_header_frame(&lc(100)));
        assert!(!ctrl.write_modem(Channel::DmrSlot1, Frame::lost()));
        assert_eq!(
            ctrl.slot_transmission(1).unwrap().reason,
            EndReason::Lost
        );
    }
}
