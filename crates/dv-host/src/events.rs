//! Events emitted by the host
//!
//! Controllers report call activity as [`CallEvent`]s. The arbiter forwards
//! those to the display and republishes them, together with its own mode
//! changes, as [`HostEvent`]s for anyone observing the loop.

use dv_protocol::{Channel, Mode};

/// Call activity reported by a protocol controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// A call became active, or its callsigns became known
    Active {
        /// Protocol carrying the call
        mode: Mode,
        /// DMR time slot (1 or 2)
        slot: Option<u8>,
        /// Calling station
        source: String,
        /// Called station or group
        destination: String,
    },

    /// The call ended
    Cleared {
        /// Protocol carrying the call
        mode: Mode,
        /// DMR time slot (1 or 2)
        slot: Option<u8>,
    },
}

/// Everything the arbiter reports to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The arbiter changed mode
    ModeChanged {
        /// Previous mode
        from: Mode,
        /// New mode
        to: Mode,
    },

    /// Traffic for a protocol arrived while another one owned the channel
    ContentionRejected {
        /// Channel the traffic arrived on
        channel: Channel,
        /// Mode that owns the channel
        active: Mode,
    },

    /// A DMR beacon transmission started
    BeaconStarted,

    /// A DMR beacon transmission ended
    BeaconEnded,

    /// DMR duplex transmission was started
    TransmitStart,

    /// DMR duplex transmission was stopped
    TransmitStop,

    /// Call activity
    Call(CallEvent),
}
