//! Mode arbitration and the control loop
//!
//! The [`ModeArbiter`] owns the shared RF channel. At most one voice protocol
//! holds it at a time; traffic for any other protocol is rejected until the
//! channel falls back to idle.
//!
//! Each loop iteration runs the same fixed sequence:
//!
//! 1. sample the modem's lockout and error flags
//! 2. read inbound frames (D-Star, DMR slot 1, DMR slot 2, System Fusion)
//! 3. return to idle if the mode-hang timer expired
//! 4. move queued outbound frames to the modem while it has space
//! 5. start a DMR beacon if the network asks for one
//! 6. advance the modem, the mode-hang timer, the controllers, the networks,
//!    the beacon timer and the DMR transmit-hang timer, in that order
//!
//! Everything is driven from one task; collaborators are never called
//! concurrently.

use std::time::{Duration, Instant};

use dv_protocol::{Channel, Frame, Mode};
use tracing::{info, warn};

use crate::collab::{Display, Modem, Network, NullDisplay};
use crate::config::HostConfig;
use crate::controller::{
    DStarController, DmrController, FusionController, ProtocolController, TransmissionSummary,
};
use crate::error::HostError;
use crate::events::{CallEvent, HostEvent};
use crate::shutdown::{RunState, ShutdownSignal};
use crate::timer::Timer;

struct NetworkSlot {
    mode: Mode,
    network: Box<dyn Network>,
}

/// The mode arbiter
pub struct ModeArbiter {
    config: HostConfig,
    modem: Box<dyn Modem>,
    display: Box<dyn Display>,
    networks: Vec<NetworkSlot>,
    controllers: Vec<Box<dyn ProtocolController>>,
    mode: Mode,
    mode_timer: Timer,
    beacon_timer: Timer,
    dmr_tx_timer: Timer,
    dmr_transmitting: bool,
    event_buffer: Vec<HostEvent>,
}

impl ModeArbiter {
    /// Create an arbiter with a controller for every enabled protocol
    pub fn new(config: HostConfig, modem: Box<dyn Modem>, display: Box<dyn Display>) -> Self {
        let mut arbiter = Self::bare(config, modem, display);

        if arbiter.config.dstar.enabled {
            let controller = DStarController::from_config(&arbiter.config);
            arbiter.add_controller(Box::new(controller));
        }
        if arbiter.config.dmr.enabled {
            let controller = DmrController::from_config(&arbiter.config);
            arbiter.add_controller(Box::new(controller));
        }
        if arbiter.config.fusion.enabled {
            let controller = FusionController::from_config(&arbiter.config);
            arbiter.add_controller(Box::new(controller));
        }

        arbiter
    }

    /// Create an arbiter with no controllers
    pub fn bare(config: HostConfig, modem: Box<dyn Modem>, display: Box<dyn Display>) -> Self {
        Self {
            mode_timer: Timer::new(config.mode_hang()),
            beacon_timer: Timer::new(config.dmr.beacon_duration()),
            dmr_tx_timer: Timer::new(config.dmr.tx_hang()),
            config,
            modem,
            display,
            networks: Vec::new(),
            controllers: Vec::new(),
            mode: Mode::Idle,
            dmr_transmitting: false,
            event_buffer: Vec::new(),
        }
    }

    /// Register a controller, replacing any existing one for the same mode
    pub fn add_controller(&mut self, controller: Box<dyn ProtocolController>) {
        let mode = controller.mode();
        self.controllers.retain(|c| c.mode() != mode);
        self.controllers.push(controller);
    }

    /// Register the network backend for a protocol
    pub fn add_network(&mut self, mode: Mode, network: Box<dyn Network>) {
        self.networks.push(NetworkSlot { mode, network });
    }

    /// Open the collaborators and enter idle
    ///
    /// A display that fails to open is replaced by one that shows nothing.
    pub fn open(&mut self) -> Result<(), HostError> {
        self.config.log_parameters();

        self.modem.open()?;

        if let Err(e) = self.display.open() {
            warn!("Display unavailable, continuing without it: {}", e);
            self.display = Box::new(NullDisplay);
        }

        for slot in &mut self.networks {
            slot.network.open()?;
            slot.network.enable(true);
        }

        self.set_mode(Mode::Idle);
        Ok(())
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Configuration the arbiter was built with
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    /// Time left on the mode-hang timer
    pub fn mode_hang_remaining(&self) -> Duration {
        self.mode_timer.remaining()
    }

    /// Summary of the last transmission handled by a protocol's controller
    pub fn last_transmission(&self, mode: Mode) -> Option<TransmissionSummary> {
        self.controllers
            .iter()
            .find(|c| c.mode() == mode)
            .and_then(|c| c.last_transmission())
    }

    /// Whether a DMR beacon is on air
    pub fn beacon_active(&self) -> bool {
        self.beacon_timer.is_running()
    }

    /// Change mode, with all of its side effects
    pub fn set_mode(&mut self, mode: Mode) {
        self.change_mode(mode, false);
    }

    /// Change mode; a quiet change is not logged and does not start the
    /// mode-hang timer
    fn change_mode(&mut self, mode: Mode, quiet: bool) {
        let from = self.mode;

        match mode {
            Mode::DStar | Mode::Dmr | Mode::Fusion => {
                if !quiet {
                    info!("Mode set to {}", mode);
                }
                self.enable_networks(|m| m == mode);
                self.modem.set_mode(mode);
                if mode == Mode::Dmr && self.config.duplex {
                    self.dmr_transmit(true);
                }
                self.mode = mode;
                if !quiet {
                    self.mode_timer.start();
                }
            }
            Mode::Lockout | Mode::Error => {
                if mode == Mode::Lockout {
                    info!("Mode set to Lockout");
                } else {
                    info!("Mode set to Error");
                }
                self.enable_networks(|_| false);
                self.stop_dmr_transmit();
                if mode == Mode::Lockout {
                    self.modem.set_mode(Mode::Idle);
                    self.display.set_lockout();
                } else {
                    self.display.set_error("MODEM");
                }
                self.mode = mode;
                self.mode_timer.stop();
            }
            Mode::Idle => {
                if !quiet {
                    info!("Mode set to Idle");
                }
                self.enable_networks(|_| true);
                self.stop_dmr_transmit();
                self.modem.set_mode(Mode::Idle);
                self.display.set_idle();
                self.mode = Mode::Idle;
                self.mode_timer.stop();
            }
        }

        if from != self.mode {
            self.event_buffer.push(HostEvent::ModeChanged {
                from,
                to: self.mode,
            });
        }
    }

    fn enable_networks(&mut self, enabled: impl Fn(Mode) -> bool) {
        for slot in &mut self.networks {
            slot.network.enable(enabled(slot.mode));
        }
    }

    fn dmr_transmit(&mut self, tx: bool) {
        self.modem.write_dmr_start(tx);
        if tx {
            self.dmr_tx_timer.start();
        } else {
            self.dmr_tx_timer.stop();
        }

        if tx != self.dmr_transmitting {
            self.dmr_transmitting = tx;
            self.event_buffer.push(if tx {
                HostEvent::TransmitStart
            } else {
                HostEvent::TransmitStop
            });
        }
    }

    /// Key down the DMR transmitter when leaving DMR in duplex
    fn stop_dmr_transmit(&mut self) {
        if self.mode == Mode::Dmr && self.config.duplex && self.modem.has_tx() {
            self.dmr_transmit(false);
        }
    }

    fn controller_index(&self, channel: Channel) -> Option<usize> {
        self.controllers
            .iter()
            .position(|c| c.channels().contains(&channel))
    }

    /// Forward a controller's call activity to the display and observers
    fn flush_calls(&mut self, index: usize) {
        for call in self.controllers[index].drain_calls() {
            match &call {
                CallEvent::Active {
                    mode,
                    slot,
                    source,
                    destination,
                } => match mode {
                    Mode::DStar => self.display.write_dstar(source, destination),
                    Mode::Dmr => self
                        .display
                        .write_dmr(slot.unwrap_or(1), source, destination),
                    Mode::Fusion => self.display.write_fusion(source, destination),
                    _ => {}
                },
                CallEvent::Cleared { mode, slot } => match mode {
                    Mode::DStar => self.display.clear_dstar(),
                    Mode::Dmr => self.display.clear_dmr(slot.unwrap_or(1)),
                    Mode::Fusion => self.display.clear_fusion(),
                    _ => {}
                },
            }
            self.event_buffer.push(HostEvent::Call(call));
        }
    }

    fn reject(&mut self, channel: Channel) {
        if self.mode == Mode::Lockout {
            return;
        }
        warn!(
            "{} modem data received when in mode {}",
            channel.mode(),
            self.mode
        );
        self.event_buffer.push(HostEvent::ContentionRejected {
            channel,
            active: self.mode,
        });
    }

    fn inbound(&mut self, index: usize, channel: Channel, frame: Frame) {
        let mode = channel.mode();

        if self.mode == Mode::Idle {
            if self.controllers[index].write_modem(channel, frame) {
                self.set_mode(mode);
            }
        } else if self.mode == mode {
            self.controllers[index].write_modem(channel, frame);
            self.mode_timer.start();
        } else {
            self.reject(channel);
        }
    }

    fn inbound_dmr(&mut self, index: usize, channel: Channel, frame: Frame) {
        let duplex = self.config.duplex;

        if self.mode == Mode::Idle {
            if duplex {
                if self.controllers[index].process_wakeup(channel, &frame) {
                    self.set_mode(Mode::Dmr);
                    self.beacon_timer.stop();
                }
            } else {
                self.set_mode(Mode::Dmr);
                self.controllers[index].write_modem(channel, frame);
                self.beacon_timer.stop();
            }
        } else if self.mode == Mode::Dmr {
            if duplex && !self.modem.has_tx() {
                if self.controllers[index].process_wakeup(channel, &frame) {
                    self.dmr_transmit(true);
                }
            } else {
                self.controllers[index].write_modem(channel, frame);
                self.beacon_timer.stop();
                self.mode_timer.start();
                if duplex {
                    self.dmr_tx_timer.start();
                }
            }
        } else {
            self.reject(channel);
        }
    }

    fn outbound(&mut self, index: usize, channel: Channel, frame: Frame) {
        let mode = channel.mode();

        if self.mode == Mode::Idle {
            self.set_mode(mode);
        }

        if self.mode == mode {
            if mode == Mode::Dmr && self.config.duplex {
                self.dmr_transmit(true);
            }
            self.modem.write(channel, &frame);
            if mode == Mode::Dmr {
                self.beacon_timer.stop();
            }
            self.mode_timer.start();
        } else if self.mode != Mode::Lockout {
            warn!("{} data received when in mode {}", mode, self.mode);
            self.event_buffer.push(HostEvent::ContentionRejected {
                channel,
                active: self.mode,
            });
        }
    }

    fn check_beacon(&mut self) {
        let mut wanted = false;
        for slot in &mut self.networks {
            if slot.mode == Mode::Dmr && slot.network.wants_beacon() {
                wanted = true;
            }
        }

        let enabled = self.config.dmr.enabled && self.config.dmr.beacons;
        if wanted && enabled && self.mode == Mode::Idle {
            self.change_mode(Mode::Dmr, true);
            self.beacon_timer.start();
            self.event_buffer.push(HostEvent::BeaconStarted);
        }
    }

    /// Run one loop iteration; `elapsed` is the time since the previous one
    pub fn step(&mut self, elapsed: Duration) {
        if self.modem.has_lockout() && self.mode != Mode::Lockout {
            self.set_mode(Mode::Lockout);
        } else if !self.modem.has_lockout() && self.mode == Mode::Lockout {
            self.set_mode(Mode::Idle);
        }

        if self.modem.has_error() && self.mode != Mode::Error {
            self.set_mode(Mode::Error);
        } else if !self.modem.has_error() && self.mode == Mode::Error {
            self.set_mode(Mode::Idle);
        }

        for channel in Channel::ALL {
            let Some(frame) = self.modem.read(channel) else {
                continue;
            };
            let Some(index) = self.controller_index(channel) else {
                continue;
            };

            if channel.mode() == Mode::Dmr {
                self.inbound_dmr(index, channel, frame);
            } else {
                self.inbound(index, channel, frame);
            }
            self.flush_calls(index);
        }

        if self.mode_timer.is_running() && self.mode_timer.has_expired() {
            self.set_mode(Mode::Idle);
        }

        for channel in Channel::ALL {
            let Some(index) = self.controller_index(channel) else {
                continue;
            };
            if !self.modem.has_space(channel) {
                continue;
            }
            if let Some(frame) = self.controllers[index].read_modem(channel) {
                self.outbound(index, channel, frame);
            }
        }

        self.check_beacon();

        self.modem.clock(elapsed);
        self.mode_timer.clock(elapsed);

        for index in 0..self.controllers.len() {
            self.controllers[index].clock(elapsed);
            self.flush_calls(index);
        }

        for slot in &mut self.networks {
            slot.network.clock(elapsed);
        }

        self.beacon_timer.clock(elapsed);
        if self.beacon_timer.is_running() && self.beacon_timer.has_expired() {
            self.change_mode(Mode::Idle, true);
            self.beacon_timer.stop();
            self.event_buffer.push(HostEvent::BeaconEnded);
        }

        self.dmr_tx_timer.clock(elapsed);
        if self.dmr_tx_timer.is_running() && self.dmr_tx_timer.has_expired() {
            self.dmr_transmit(false);
        }
    }

    /// Run the loop until `shutdown` asks it to stop, then close down
    ///
    /// An iteration that finishes faster than the configured loop floor
    /// sleeps out the remainder.
    pub async fn run(&mut self, mut shutdown: ShutdownSignal) -> RunState {
        let floor = self.config.loop_floor();
        let mut last = Instant::now();

        while shutdown.is_running() {
            let start = Instant::now();
            let elapsed = start.duration_since(last);
            last = start;

            self.step(elapsed);

            let busy = start.elapsed();
            if busy < floor {
                tokio::select! {
                    _ = tokio::time::sleep(floor - busy) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        let state = shutdown.state();
        self.close();
        state
    }

    /// Return to idle and close every collaborator
    pub fn close(&mut self) {
        self.set_mode(Mode::Idle);

        self.modem.close();
        self.display.close();
        for slot in &mut self.networks {
            slot.network.close();
        }

        info!("Gateway host stopped");
    }
}
