//! Protocol controllers
//!
//! One controller per voice protocol owns that protocol's session state. The
//! arbiter hands it every frame received on its channels, asks it for frames
//! to transmit, and advances its timers. A controller never changes the
//! host's mode itself: it answers whether a frame was admitted and the
//! arbiter decides.
//!
//! All controllers follow the same pattern:
//!
//! - `Listening` until a frame opens a session, then `Audio`
//! - a session timeout timer started when the session opens; once it has
//!   expired nothing more is queued for retransmission
//! - in duplex, admitted frames are rewritten and queued for the modem
//! - call activity is reported through [`ProtocolController::drain_calls`]

pub mod dmr;
pub mod dstar;
pub mod fusion;

use std::time::Duration;

use dv_protocol::{Channel, Frame, Mode};

use crate::events::CallEvent;

pub use dmr::DmrController;
pub use dstar::DStarController;
pub use fusion::FusionController;

/// Callsign shown while a field has not been received yet
pub const UNKNOWN_CALLSIGN: &str = "??????";

/// Per-session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RfState {
    /// Waiting for a transmission to start
    #[default]
    Listening,
    /// Inside a transmission
    Audio,
}

/// How a transmission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Explicit end-of-transmission frame
    EndOfTransmission,
    /// Modem lost the signal
    Lost,
}

/// Summary of the last completed transmission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionSummary {
    /// Frames of audio received
    pub frames: u32,
    /// Audio duration in seconds
    pub seconds: f32,
    /// How the transmission ended
    pub reason: EndReason,
}

/// A voice protocol's session logic
pub trait ProtocolController {
    /// Mode this controller serves
    fn mode(&self) -> Mode;

    /// Modem channels routed to this controller
    fn channels(&self) -> &'static [Channel];

    /// Offer a received frame; returns whether it was admitted
    fn write_modem(&mut self, channel: Channel, frame: Frame) -> bool;

    /// Next frame queued for transmission on `channel`
    fn read_modem(&mut self, channel: Channel) -> Option<Frame>;

    /// Whether `frame` is a wake-up request that may key the transmitter
    fn process_wakeup(&mut self, _channel: Channel, _frame: &Frame) -> bool {
        false
    }

    /// Advance timers
    fn clock(&mut self, elapsed: Duration);

    /// Summary of the most recent completed transmission
    fn last_transmission(&self) -> Option<TransmissionSummary>;

    /// Take the call activity reported since the last drain
    fn drain_calls(&mut self) -> Vec<CallEvent>;
}
