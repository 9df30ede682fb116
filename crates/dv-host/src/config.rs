//! Host configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Top-level host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Station callsign
    pub callsign: String,
    /// Full-duplex repeater (retransmits what it hears)
    pub duplex: bool,
    /// Idle gap before a voice mode returns to idle (seconds)
    pub mode_hang_secs: u64,
    /// Maximum length of a single transmission (seconds, 0 disables)
    pub timeout_secs: u64,
    /// Minimum duration of one loop iteration (ms)
    pub loop_floor_ms: u64,
    /// D-Star settings
    pub dstar: DStarConfig,
    /// DMR settings
    pub dmr: DmrConfig,
    /// System Fusion settings
    pub fusion: FusionConfig,
    /// Network uplinks
    pub network: NetworkConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            callsign: String::new(),
            duplex: true,
            mode_hang_secs: 10,
            timeout_secs: 180,
            loop_floor_ms: 5,
            dstar: DStarConfig::default(),
            dmr: DmrConfig::default(),
            fusion: FusionConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl HostConfig {
    /// Mode-hang duration
    pub fn mode_hang(&self) -> Duration {
        Duration::from_secs(self.mode_hang_secs)
    }

    /// Session timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Loop floor
    pub fn loop_floor(&self) -> Duration {
        Duration::from_millis(self.loop_floor_ms)
    }

    /// Log every parameter block
    pub fn log_parameters(&self) {
        info!("General Parameters");
        info!("    Callsign: {}", self.callsign);
        info!("    Duplex: {}", yes_no(self.duplex));
        info!("    Timeout: {}s", self.timeout_secs);
        info!("    Mode Hang: {}s", self.mode_hang_secs);

        if self.dstar.enabled {
            info!("D-Star Parameters");
            info!("    Module: {}", self.dstar.module);
            info!("    Self Only: {}", yes_no(self.dstar.self_only));
            if !self.dstar.blacklist.is_empty() {
                info!("    Blacklist: {}", self.dstar.blacklist.len());
            }
        }

        if self.dmr.enabled {
            info!("DMR Parameters");
            info!("    Id: {}", self.dmr.id);
            info!("    Color Code: {}", self.dmr.color_code);
            info!("    Self Only: {}", yes_no(self.dmr.self_only));
            if !self.dmr.blacklist.is_empty() {
                info!("    Blacklist: {}", self.dmr.blacklist.len());
            }
            info!("    TX Hang: {}s", self.dmr.tx_hang_secs);
            info!("    Beacons: {}", enabled(self.dmr.beacons));
        }

        if self.fusion.enabled {
            info!("System Fusion Parameters");
            info!("    Parrot: {}", enabled(self.fusion.parrot));
            if self.fusion.parrot {
                info!("    Parrot Delay: {}ms", self.fusion.parrot_delay_ms);
            }
            if let Some(dir) = &self.fusion.capture_dir {
                info!("    Capture Directory: {}", dir.display());
            }
        }

        if self.network.dstar || self.network.dmr {
            info!("Network Parameters");
            info!("    D-Star: {}", enabled(self.network.dstar));
            info!("    DMR: {}", enabled(self.network.dmr));
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn enabled(value: bool) -> &'static str {
    if value {
        "enabled"
    } else {
        "disabled"
    }
}

/// D-Star settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DStarConfig {
    /// Whether D-Star is handled at all
    pub enabled: bool,
    /// Repeater module letter
    pub module: String,
    /// Only admit transmissions from the station callsign
    pub self_only: bool,
    /// Callsigns that are never admitted
    pub blacklist: Vec<String>,
}

impl Default for DStarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            module: "C".into(),
            self_only: false,
            blacklist: Vec::new(),
        }
    }
}

/// DMR settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmrConfig {
    /// Whether DMR is handled at all
    pub enabled: bool,
    /// Repeater radio ID
    pub id: u32,
    /// Color code
    pub color_code: u8,
    /// Only admit transmissions from the repeater ID
    pub self_only: bool,
    /// Radio IDs that are never admitted
    pub blacklist: Vec<u32>,
    /// Key up when the network asks for a beacon
    pub beacons: bool,
    /// Length of a beacon transmission (seconds)
    pub beacon_secs: u64,
    /// Time the transmitter stays keyed after the last frame (seconds)
    pub tx_hang_secs: u64,
}

impl Default for DmrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id: 0,
            color_code: 1,
            self_only: false,
            blacklist: Vec::new(),
            beacons: false,
            beacon_secs: 4,
            tx_hang_secs: 4,
        }
    }
}

impl DmrConfig {
    /// Beacon duration
    pub fn beacon_duration(&self) -> Duration {
        Duration::from_secs(self.beacon_secs)
    }

    /// Transmit hang duration
    pub fn tx_hang(&self) -> Duration {
        Duration::from_secs(self.tx_hang_secs)
    }
}

/// System Fusion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Whether System Fusion is handled at all
    pub enabled: bool,
    /// Echo every transmission back after it ends
    pub parrot: bool,
    /// Pause between the end of a transmission and its echo (ms)
    pub parrot_delay_ms: u64,
    /// Directory receiving capture files, none disables capture
    pub capture_dir: Option<PathBuf>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parrot: false,
            parrot_delay_ms: 2000,
            capture_dir: None,
        }
    }
}

impl FusionConfig {
    /// Parrot hold-off
    pub fn parrot_delay(&self) -> Duration {
        Duration::from_millis(self.parrot_delay_ms)
    }
}

/// Network uplinks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// D-Star network
    pub dstar: bool,
    /// DMR network
    pub dmr: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert!(config.duplex);
        assert_eq!(config.mode_hang(), Duration::from_secs(10));
        assert_eq!(config.loop_floor(), Duration::from_millis(5));
        assert_eq!(config.dmr.beacon_duration(), Duration::from_secs(4));
        assert_eq!(config.fusion.parrot_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "callsign": "G4KLX", "fusion": { "parrot": true } }"#;
        let config: HostConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.callsign, "G4KLX");
        assert!(config.fusion.parrot);
        assert!(config.fusion.enabled);
        assert_eq!(config.timeout_secs, 180);
    }
}
