//! Virtual network backend

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dv_host::Network;

#[derive(Debug, Default)]
struct NetworkState {
    enables: Vec<bool>,
    beacon_requested: bool,
    clocked: Duration,
    closed: bool,
}

type Shared = Arc<Mutex<NetworkState>>;

fn lock(shared: &Shared) -> MutexGuard<'_, NetworkState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A simulated network backend
#[derive(Debug)]
pub struct VirtualNetwork {
    state: Shared,
}

impl VirtualNetwork {
    /// Create a network and its handle
    pub fn new() -> (Self, NetworkHandle) {
        let state = Shared::default();
        (
            Self {
                state: state.clone(),
            },
            NetworkHandle { state },
        )
    }
}

impl Network for VirtualNetwork {
    fn enable(&mut self, enabled: bool) {
        lock(&self.state).enables.push(enabled);
    }

    fn wants_beacon(&mut self) -> bool {
        std::mem::take(&mut lock(&self.state).beacon_requested)
    }

    fn clock(&mut self, elapsed: Duration) {
        lock(&self.state).clocked += elapsed;
    }

    fn close(&mut self) {
        lock(&self.state).closed = true;
    }
}

/// Controls and observes a [`VirtualNetwork`]
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    state: Shared,
}

impl NetworkHandle {
    /// Ask for one beacon
    pub fn request_beacon(&self) {
        lock(&self.state).beacon_requested = true;
    }

    /// Whether the most recent enable call allowed traffic
    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enables.last().copied().unwrap_or(false)
    }

    /// Every enable/disable call, oldest first
    pub fn enables(&self) -> Vec<bool> {
        lock(&self.state).enables.clone()
    }

    /// Total time the network has been clocked
    pub fn clocked(&self) -> Duration {
        lock(&self.state).clocked
    }

    /// Whether the network was closed
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beacon_request_is_consumed() {
        let (mut network, io) = VirtualNetwork::new();
        assert!(!network.wants_beacon());

        io.request_beacon();
        assert!(network.wants_beacon());
        assert!(!network.wants_beacon());
    }

    #[test]
    fn test_enable_history() {
        let (mut network, io) = VirtualNetwork::new();
        assert!(!io.is_enabled());
        network.enable(true);
        network.enable(false);
        assert_eq!(io.enables(), vec![true, false]);
        assert!(!io.is_enabled());
    }
}
