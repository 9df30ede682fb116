//! Supervisor: runs the host until told to exit
//!
//! SIGHUP stops the host, re-reads the settings and starts it again.
//! SIGTERM and SIGINT stop it for good.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use dv_host::{shutdown_channel, Mode, ModeArbiter, RunState, ShutdownHandle, ShutdownSignal};
use dv_protocol::Channel;
use dv_sim::{FusionTransmitter, ModemHandle, VirtualModem, VirtualNetwork};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::display::LogDisplay;
use crate::settings::{DemoTraffic, Settings};

/// Run the host, restarting it on SIGHUP, until SIGTERM or SIGINT
pub async fn run(settings_path: Option<PathBuf>) -> anyhow::Result<()> {
    loop {
        let settings = Settings::load(settings_path.as_deref());

        let (handle, signal) = shutdown_channel();
        let signals = tokio::spawn(async move {
            if let Err(e) = watch_signals(handle).await {
                error!("Unable to install signal handlers: {}", e);
            }
        });

        let state = run_once(&settings, signal).await;
        signals.abort();

        match state? {
            RunState::Restart => continue,
            RunState::Stop | RunState::Running => break,
        }
    }

    info!("dvgate-{} has stopped", env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// One lifetime of the host
async fn run_once(settings: &Settings, signal: ShutdownSignal) -> anyhow::Result<RunState> {
    let (modem, modem_io) = VirtualModem::with_config(settings.modem.clone());
    let mut arbiter =
        ModeArbiter::new(settings.host.clone(), Box::new(modem), Box::new(LogDisplay));

    if settings.host.network.dstar {
        let (network, _io) = VirtualNetwork::new();
        arbiter.add_network(Mode::DStar, Box::new(network));
    }
    if settings.host.network.dmr {
        let (network, _io) = VirtualNetwork::new();
        arbiter.add_network(Mode::Dmr, Box::new(network));
    }

    arbiter.open().context("failed to start the gateway host")?;

    let traffic = spawn_demo_traffic(
        &settings.demo_traffic,
        settings.host.fusion.enabled,
        modem_io,
    );

    let state = arbiter.run(signal).await;

    if let Some(task) = traffic {
        task.abort();
    }

    Ok(state)
}

#[cfg(unix)]
async fn watch_signals(handle: ShutdownHandle) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = term.recv() => {
            info!("Caught SIGTERM, exiting");
            handle.stop();
        }
        _ = int.recv() => {
            info!("Caught SIGINT, exiting");
            handle.stop();
        }
        _ = hup.recv() => {
            info!("Caught SIGHUP, restarting");
            handle.restart();
        }
    }

    Ok(())
}

#[cfg(not(unix))]
async fn watch_signals(handle: ShutdownHandle) -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Caught Ctrl-C, exiting");
    handle.stop();
    Ok(())
}

/// Key up a simulated System Fusion radio at a fixed interval
fn spawn_demo_traffic(
    demo: &DemoTraffic,
    fusion_enabled: bool,
    modem: ModemHandle,
) -> Option<JoinHandle<()>> {
    if !demo.enabled || !fusion_enabled {
        return None;
    }

    let demo = demo.clone();
    Some(tokio::spawn(async move {
        let mut radio = FusionTransmitter::new(demo.callsign, "CQCQCQ");
        let frame_interval = Duration::from_millis(100);

        loop {
            tokio::time::sleep(Duration::from_secs(demo.interval_secs.max(1))).await;

            modem.inject(Channel::Fusion, radio.header());
            for _ in 0..demo.frames {
                tokio::time::sleep(frame_interval).await;
                modem.inject(Channel::Fusion, radio.voice());
            }
            tokio::time::sleep(frame_interval).await;
            modem.inject(Channel::Fusion, radio.terminator());
        }
    }))
}
