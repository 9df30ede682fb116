//! Run/stop/restart signalling between the supervisor and the control loop

use tokio::sync::watch;

/// What the control loop should be doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Keep running
    #[default]
    Running,
    /// Leave the loop and exit
    Stop,
    /// Leave the loop and start again
    Restart,
}

/// Create a connected handle/signal pair
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(RunState::Running);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Requests a stop or restart
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<RunState>,
}

impl ShutdownHandle {
    /// Ask the loop to exit
    pub fn stop(&self) {
        self.tx.send_replace(RunState::Stop);
    }

    /// Ask the loop to exit and be restarted
    pub fn restart(&self) {
        self.tx.send_replace(RunState::Restart);
    }

    /// Another signal observing this handle
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observed by the control loop between iterations
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<RunState>,
}

impl ShutdownSignal {
    /// Current request
    pub fn state(&self) -> RunState {
        *self.rx.borrow()
    }

    /// Whether the loop should keep going
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Wait for the next request
    ///
    /// Never completes once the handle is gone.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_and_restart_are_observed() {
        let (handle, signal) = shutdown_channel();
        assert!(signal.is_running());

        handle.restart();
        assert_eq!(signal.state(), RunState::Restart);

        handle.stop();
        assert_eq!(signal.state(), RunState::Stop);
        assert!(!handle.subscribe().is_running());
    }

    #[tokio::test]
    async fn test_changed_wakes_waiter() {
        let (handle, mut signal) = shutdown_channel();
        let waiter = async move {
            signal.changed().await;
            signal.state()
        };
        handle.stop();
        assert_eq!(waiter.await, RunState::Stop);
    }
}
