//! Collaborators the host drives
//!
//! The modem, the network backends and the status display are injected into
//! the [`ModeArbiter`](crate::ModeArbiter) as trait objects. The arbiter only
//! ever calls them from the control loop, so none of them needs to be `Send`.

use std::time::Duration;

use dv_protocol::{Channel, Frame, Mode};

use crate::error::HostError;

/// The modem transport
pub trait Modem {
    /// Open the transport
    fn open(&mut self) -> Result<(), HostError>;

    /// Take the next frame the modem received on `channel`
    fn read(&mut self, channel: Channel) -> Option<Frame>;

    /// Whether the modem can accept another frame on `channel`
    fn has_space(&self, channel: Channel) -> bool;

    /// Queue a frame for transmission on `channel`
    fn write(&mut self, channel: Channel, frame: &Frame);

    /// Hardware lockout (for example an external inhibit line)
    fn has_lockout(&self) -> bool;

    /// Internal modem fault
    fn has_error(&self) -> bool;

    /// Whether the transmitter is keyed
    fn has_tx(&self) -> bool;

    /// Switch the modem's operating mode
    fn set_mode(&mut self, mode: Mode);

    /// Start or stop DMR duplex transmission
    fn write_dmr_start(&mut self, tx: bool);

    /// Advance the transport
    fn clock(&mut self, elapsed: Duration);

    /// Close the transport
    fn close(&mut self);
}

/// A network backend serving one protocol
pub trait Network {
    /// Open the backend
    fn open(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    /// Allow or suppress traffic
    fn enable(&mut self, enabled: bool);

    /// Whether the network asks for a beacon transmission
    fn wants_beacon(&mut self) -> bool {
        false
    }

    /// Advance the backend
    fn clock(&mut self, elapsed: Duration);

    /// Close the backend
    fn close(&mut self);
}

/// Status display
pub trait Display {
    /// Open the display
    fn open(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    /// Show the idle screen
    fn set_idle(&mut self);

    /// Show the lockout screen
    fn set_lockout(&mut self);

    /// Show an error
    fn set_error(&mut self, text: &str);

    /// Show an active D-Star call
    fn write_dstar(&mut self, my: &str, your: &str);

    /// Clear the D-Star call
    fn clear_dstar(&mut self);

    /// Show an active DMR call on a slot
    fn write_dmr(&mut self, slot: u8, source: &str, destination: &str);

    /// Clear the DMR call on a slot
    fn clear_dmr(&mut self, slot: u8);

    /// Show an active System Fusion call
    fn write_fusion(&mut self, source: &str, destination: &str);

    /// Clear the System Fusion call
    fn clear_fusion(&mut self);

    /// Close the display
    fn close(&mut self) {}
}

/// A display that shows nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn set_idle(&mut self) {}
    fn set_lockout(&mut self) {}
    fn set_error(&mut self, _text: &str) {}
    fn write_dstar(&mut self, _my: &str, _your: &str) {}
    fn clear_dstar(&mut self) {}
    fn write_dmr(&mut self, _slot: u8, _source: &str, _destination: &str) {}
    fn clear_dmr(&mut self, _slot: u8) {}
    fn write_fusion(&mut self, _source: &str, _destination: &str) {}
    fn clear_fusion(&mut self) {}
}
