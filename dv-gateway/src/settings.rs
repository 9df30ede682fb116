//! Gateway settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use dv_host::HostConfig;
use dv_sim::VirtualModemConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Everything the gateway reads at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Host configuration
    #[serde(default)]
    pub host: HostConfig,
    /// Simulated modem
    #[serde(default)]
    pub modem: VirtualModemConfig,
    /// Periodically key up a simulated System Fusion radio
    #[serde(default)]
    pub demo_traffic: DemoTraffic,
}

/// Simulated traffic fed into the modem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoTraffic {
    /// Whether to generate traffic
    pub enabled: bool,
    /// Callsign of the simulated radio
    pub callsign: String,
    /// Seconds between transmissions
    pub interval_secs: u64,
    /// Voice frames per transmission
    pub frames: u32,
}

impl Default for DemoTraffic {
    fn default() -> Self {
        Self {
            enabled: true,
            callsign: "N0CALL".to_string(),
            interval_secs: 30,
            frames: 50,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for dvgate
    /// Uses $XDG_CONFIG_HOME/dvgate, falls back to ~/.config/dvgate
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("dvgate"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("dvgate"))
    }

    /// Settings file to use: the explicit one, or the default location
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| Self::config_dir().map(|p| p.join("settings.json")))
    }

    /// Load settings; a missing or unreadable file gives the defaults
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Ignoring invalid settings in {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Save settings to `path`
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("dvgate-settings-missing.json");
        assert_eq!(Settings::load(Some(&path)), Settings::default());
        assert_eq!(Settings::load(None), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("dvgate-settings-{}", std::process::id()));
        let path = dir.join("settings.json");

        let mut settings = Settings::default();
        settings.host.callsign = "G4KLX".into();
        settings.host.fusion.parrot = true;
        settings.demo_traffic.enabled = false;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(Some(&path)), settings);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("dvgate-corrupt-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(Some(&path)), Settings::default());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/etc/dvgate.json");
        assert_eq!(
            Settings::resolve_path(Some(explicit)),
            Some(PathBuf::from("/etc/dvgate.json"))
        );
    }
}
