//! Digital-voice simulation library
//!
//! This crate provides stand-ins for the hardware and services the gateway
//! host talks to, so the host can be exercised without a modem:
//!
//! - **VirtualModem**: scriptable inbound frames, bounded transmit buffers,
//!   lockout/error/transmit flags and a record of everything written
//! - **VirtualNetwork**: records enable/disable calls and can ask for beacons
//! - **RecordingDisplay**: records every display update
//! - **Transmitters**: generate protocol-accurate D-Star, DMR and System
//!   Fusion traffic
//!
//! Each simulated collaborator comes with a handle that stays with the test
//! (or the driving task) while the collaborator itself is boxed into the
//! host.
//!
//! # Example
//!
//! ```rust
//! use dv_host::{Channel, HostConfig, Mode, ModeArbiter};
//! use dv_sim::{FusionTransmitter, RecordingDisplay, VirtualModem};
//! use std::time::Duration;
//!
//! let (modem, modem_io) = VirtualModem::new();
//! let (display, _display_io) = RecordingDisplay::new();
//! let mut arbiter = ModeArbiter::new(HostConfig::default(), Box::new(modem), Box::new(display));
//! arbiter.open().unwrap();
//!
//! let mut radio = FusionTransmitter::new("G4KLX", "CQCQCQ");
//! modem_io.inject(Channel::Fusion, radio.header());
//! arbiter.step(Duration::from_millis(5));
//!
//! assert_eq!(arbiter.mode(), Mode::Fusion);
//! ```

pub mod display;
pub mod modem;
pub mod network;
pub mod traffic;

pub use display::{DisplayEvent, DisplayHandle, RecordingDisplay};
pub use modem::{ModemHandle, VirtualModem, VirtualModemConfig};
pub use network::{NetworkHandle, VirtualNetwork};
pub use traffic::{DStarTransmitter, DmrTransmitter, FusionTransmitter};
