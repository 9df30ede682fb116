//! Multi-mode digital-voice gateway host
//!
//! This crate provides the engine that shares a single half-duplex RF
//! channel between several digital-voice protocols (D-Star, DMR and System
//! Fusion) driven through one multi-mode modem.
//!
//! # Architecture
//!
//! The [`ModeArbiter`] runs a fixed-order control loop. On every iteration it
//! reads frames from the modem, offers each one to the controller for its
//! protocol, moves frames the controllers want transmitted back to the modem,
//! and advances every timer by the time the iteration took.
//!
//! - **Arbitration**: the first admitted frame of a protocol claims the channel
//!   while the host is idle; traffic for other protocols is rejected until the
//!   mode-hang timer returns the channel to idle
//! - **Controllers**: one [`ProtocolController`] per protocol holds that
//!   protocol's session state, retransmission queue and timeout
//! - **Collaborators**: the modem, network backends, display and capture
//!   sinks are trait objects injected by the caller
//!
//! # Example
//!
//! ```rust,no_run
//! use dv_host::{shutdown_channel, HostConfig, ModeArbiter, Modem, NullDisplay};
//!
//! # async fn run(modem: Box<dyn Modem>) -> Result<(), dv_host::HostError> {
//! let (handle, signal) = shutdown_channel();
//! let mut arbiter = ModeArbiter::new(HostConfig::default(), modem, Box::new(NullDisplay));
//! arbiter.open()?;
//!
//! // Another task calls handle.stop() to end the loop
//! let state = arbiter.run(signal).await;
//! # drop(handle);
//! # let _ = state;
//! # Ok(())
//! # }
//! ```

pub mod arbiter;
pub mod capture;
pub mod collab;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod parrot;
pub mod queue;
pub mod shutdown;
pub mod timer;

pub use arbiter::ModeArbiter;
pub use capture::{CaptureSink, FileCaptureSink, NullCapture};
pub use collab::{Display, Modem, Network, NullDisplay};
pub use config::{DStarConfig, DmrConfig, FusionConfig, HostConfig, NetworkConfig};
pub use controller::{
    DStarController, DmrController, EndReason, FusionController, ProtocolController, RfState,
    TransmissionSummary,
};
pub use error::{HostError, QueueError};
pub use events::{CallEvent, HostEvent};
pub use parrot::ParrotRecorder;
pub use queue::FrameQueue;
pub use shutdown::{shutdown_channel, RunState, ShutdownHandle, ShutdownSignal};
pub use timer::Timer;

pub use dv_protocol::{Channel, Frame, FrameTag, Mode};
