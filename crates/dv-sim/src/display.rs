//! Display that records what it was asked to show

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dv_host::Display;

/// One display update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Idle screen
    Idle,
    /// Lockout screen
    Lockout,
    /// Error screen
    Error(String),
    /// D-Star call
    DStar {
        /// Calling station
        my: String,
        /// Called station
        your: String,
    },
    /// D-Star call cleared
    ClearDStar,
    /// DMR call
    Dmr {
        /// Time slot
        slot: u8,
        /// Source ID
        source: String,
        /// Destination
        destination: String,
    },
    /// DMR call cleared
    ClearDmr(u8),
    /// System Fusion call
    Fusion {
        /// Calling station
        source: String,
        /// Called station or group
        destination: String,
    },
    /// System Fusion call cleared
    ClearFusion,
    /// Display closed
    Closed,
}

type Shared = Arc<Mutex<Vec<DisplayEvent>>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Vec<DisplayEvent>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A display that records every update
#[derive(Debug)]
pub struct RecordingDisplay {
    events: Shared,
}

impl RecordingDisplay {
    /// Create a display and its handle
    pub fn new() -> (Self, DisplayHandle) {
        let events = Shared::default();
        (
            Self {
                events: events.clone(),
            },
            DisplayHandle { events },
        )
    }

    fn record(&self, event: DisplayEvent) {
        lock(&self.events).push(event);
    }
}

impl Display for RecordingDisplay {
    fn set_idle(&mut self) {
        self.record(DisplayEvent::Idle);
    }

    fn set_lockout(&mut self) {
        self.record(DisplayEvent::Lockout);
    }

    fn set_error(&mut self, text: &str) {
        self.record(DisplayEvent::Error(text.to_string()));
    }

    fn write_dstar(&mut self, my: &str, your: &str) {
        self.record(DisplayEvent::DStar {
            my: my.to_string(),
            your: your.to_string(),
        });
    }

    fn clear_dstar(&mut self) {
        self.record(DisplayEvent::ClearDStar);
    }

    fn write_dmr(&mut self, slot: u8, source: &str, destination: &str) {
        self.record(DisplayEvent::Dmr {
            slot,
            source: source.to_string(),
            destination: destination.to_string(),
        });
    }

    fn clear_dmr(&mut self, slot: u8) {
        self.record(DisplayEvent::ClearDmr(slot));
    }

    fn write_fusion(&mut self, source: &str, destination: &str) {
        self.record(DisplayEvent::Fusion {
            source: source.to_string(),
            destination: destination.to_string(),
        });
    }

    fn clear_fusion(&mut self) {
        self.record(DisplayEvent::ClearFusion);
    }

    fn close(&mut self) {
        self.record(DisplayEvent::Closed);
    }
}

/// Reads what a [`RecordingDisplay`] was asked to show
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    events: Shared,
}

impl DisplayHandle {
    /// Every update, oldest first
    pub fn events(&self) -> Vec<DisplayEvent> {
        lock(&self.events).clone()
    }

    /// Take the updates, leaving the log empty
    pub fn take_events(&self) -> Vec<DisplayEvent> {
        std::mem::take(&mut *lock(&self.events))
    }

    /// The most recent update
    pub fn last(&self) -> Option<DisplayEvent> {
        lock(&self.events).last().cloned()
    }
}
