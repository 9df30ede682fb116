//! Display that writes to the log

use dv_host::Display;
use tracing::info;

/// Reports display updates as log lines
#[derive(Debug, Default)]
pub struct LogDisplay;

impl Display for LogDisplay {
    fn set_idle(&mut self) {
        info!("Display: idle");
    }

    fn set_lockout(&mut self) {
        info!("Display: lockout");
    }

    fn set_error(&mut self, text: &str) {
        info!("Display: error {}", text);
    }

    fn write_dstar(&mut self, my: &str, your: &str) {
        info!("Display: D-Star {} -> {}", my, your);
    }

    fn clear_dstar(&mut self) {}

    fn write_dmr(&mut self, slot: u8, source: &str, destination: &str) {
        info!("Display: DMR slot {} {} -> {}", slot, source, destination);
    }

    fn clear_dmr(&mut self, _slot: u8) {}

    fn write_fusion(&mut self, source: &str, destination: &str) {
        info!("Display: System Fusion {} -> {}", source, destination);
    }

    fn clear_fusion(&mut self) {}
}
