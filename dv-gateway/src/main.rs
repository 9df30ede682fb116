//! Multi-mode digital-voice gateway
//!
//! Runs the gateway host against a simulated modem. The settings file is
//! taken from the first argument, or from the XDG config directory.

mod display;
mod settings;
mod supervisor;

use std::path::PathBuf;

use settings::Settings;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dvgate=info,dv_protocol=info,dv_host=info,dv_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("dvgate-{} is starting", env!("CARGO_PKG_VERSION"));

    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let settings_path = Settings::resolve_path(explicit.as_deref());

    match &settings_path {
        Some(path) if !path.exists() => {
            match Settings::default().save(path) {
                Ok(()) => info!("Wrote default settings to {}", path.display()),
                Err(e) => warn!("{:#}", e),
            }
        }
        Some(path) => info!("Using settings from {}", path.display()),
        None => warn!("No settings location, using defaults"),
    }

    supervisor::run(settings_path).await
}
