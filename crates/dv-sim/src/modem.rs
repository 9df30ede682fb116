//! Virtual modem
//!
//! Stands in for the multi-mode modem. Inbound frames are injected through a
//! [`ModemHandle`]; frames the host writes sit in a bounded per-channel
//! transmit buffer that drains on every clock tick, and end up in a log the
//! handle can inspect.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dv_host::{HostError, Modem};
use dv_protocol::{Channel, Frame, Mode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for a virtual modem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualModemConfig {
    /// Frames each channel's transmit buffer holds
    pub tx_capacity: usize,
    /// Fail to open
    pub fail_open: bool,
}

impl Default for VirtualModemConfig {
    fn default() -> Self {
        Self {
            tx_capacity: 10,
            fail_open: false,
        }
    }
}

#[derive(Debug, Default)]
struct ModemState {
    open: bool,
    inbound: HashMap<Channel, VecDeque<Frame>>,
    pending: HashMap<Channel, VecDeque<Frame>>,
    transmitted: Vec<(Channel, Frame)>,
    modes: Vec<Mode>,
    dmr_starts: Vec<bool>,
    lockout: bool,
    error: bool,
    tx: bool,
    clocked: Duration,
}

type Shared = Arc<Mutex<ModemState>>;

fn lock(shared: &Shared) -> MutexGuard<'_, ModemState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A simulated modem
#[derive(Debug)]
pub struct VirtualModem {
    config: VirtualModemConfig,
    state: Shared,
}

impl VirtualModem {
    /// Create a modem with default settings and its handle
    pub fn new() -> (Self, ModemHandle) {
        Self::with_config(VirtualModemConfig::default())
    }

    /// Create a modem from configuration and its handle
    pub fn with_config(config: VirtualModemConfig) -> (Self, ModemHandle) {
        let state = Shared::default();
        let handle = ModemHandle {
            state: state.clone(),
        };
        (Self { config, state }, handle)
    }
}

impl Modem for VirtualModem {
    fn open(&mut self) -> Result<(), HostError> {
        if self.config.fail_open {
            return Err(HostError::ModemOpen("virtual modem configured to fail".into()));
        }
        lock(&self.state).open = true;
        debug!("Virtual modem opened");
        Ok(())
    }

    fn read(&mut self, channel: Channel) -> Option<Frame> {
        lock(&self.state).inbound.get_mut(&channel)?.pop_front()
    }

    fn has_space(&self, channel: Channel) -> bool {
        let state = lock(&self.state);
        state.pending.get(&channel).map_or(0, VecDeque::len) < self.config.tx_capacity
    }

    fn write(&mut self, channel: Channel, frame: &Frame) {
        lock(&self.state)
            .pending
            .entry(channel)
            .or_default()
            .push_back(frame.clone());
    }

    fn has_lockout(&self) -> bool {
        lock(&self.state).lockout
    }

    fn has_error(&self) -> bool {
        lock(&self.state).error
    }

    fn has_tx(&self) -> bool {
        lock(&self.state).tx
    }

    fn set_mode(&mut self, mode: Mode) {
        lock(&self.state).modes.push(mode);
    }

    fn write_dmr_start(&mut self, tx: bool) {
        let mut state = lock(&self.state);
        state.dmr_starts.push(tx);
        state.tx = tx;
    }

    fn clock(&mut self, elapsed: Duration) {
        let mut state = lock(&self.state);
        state.clocked += elapsed;

        let ModemState {
            pending,
            transmitted,
            ..
        } = &mut *state;
        for channel in Channel::ALL {
            if let Some(queue) = pending.get_mut(&channel) {
                transmitted.extend(queue.drain(..).map(|frame| (channel, frame)));
            }
        }
    }

    fn close(&mut self) {
        lock(&self.state).open = false;
        debug!("Virtual modem closed");
    }
}

/// Controls and observes a [`VirtualModem`]
#[derive(Debug, Clone)]
pub struct ModemHandle {
    state: Shared,
}

impl ModemHandle {
    /// Queue a frame as if the modem had received it
    pub fn inject(&self, channel: Channel, frame: Frame) {
        lock(&self.state)
            .inbound
            .entry(channel)
            .or_default()
            .push_back(frame);
    }

    /// Queue several frames on one channel
    pub fn inject_all(&self, channel: Channel, frames: impl IntoIterator<Item = Frame>) {
        let mut state = lock(&self.state);
        let queue = state.inbound.entry(channel).or_default();
        queue.extend(frames);
    }

    /// Frames injected but not yet read by the host
    pub fn inbound_pending(&self) -> usize {
        lock(&self.state).inbound.values().map(VecDeque::len).sum()
    }

    /// Raise or clear the lockout flag
    pub fn set_lockout(&self, lockout: bool) {
        lock(&self.state).lockout = lockout;
    }

    /// Raise or clear the error flag
    pub fn set_error(&self, error: bool) {
        lock(&self.state).error = error;
    }

    /// Force the transmitter state
    pub fn set_tx(&self, tx: bool) {
        lock(&self.state).tx = tx;
    }

    /// Frames the modem has transmitted, oldest first
    pub fn transmitted(&self) -> Vec<(Channel, Frame)> {
        lock(&self.state).transmitted.clone()
    }

    /// Take the transmitted frames, leaving the log empty
    pub fn take_transmitted(&self) -> Vec<(Channel, Frame)> {
        std::mem::take(&mut lock(&self.state).transmitted)
    }

    /// Every mode the host has set, oldest first
    pub fn modes(&self) -> Vec<Mode> {
        lock(&self.state).modes.clone()
    }

    /// Every DMR transmit start/stop request, oldest first
    pub fn dmr_starts(&self) -> Vec<bool> {
        lock(&self.state).dmr_starts.clone()
    }

    /// Whether the transmitter is keyed
    pub fn tx(&self) -> bool {
        lock(&self.state).tx
    }

    /// Whether the modem is open
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Total time the modem has been clocked
    pub fn clocked(&self) -> Duration {
        lock(&self.state).clocked
    }
}
