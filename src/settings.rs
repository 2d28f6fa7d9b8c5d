use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

// the scanning toggle is owned by an external store (browser storage in the
// original); the orchestrator only ever reads it at the start of a cycle
pub trait SettingsStore: Send + Sync {
    fn scanning_enabled(&self) -> Result<bool, SettingsError>;
    fn set_scanning_enabled(&self, enabled: bool) -> Result<(), SettingsError>;
}

pub struct MemorySettings {
    enabled: AtomicBool,
}

impl MemorySettings {
    pub fn new(enabled: bool) -> Self {
        MemorySettings {
            enabled: AtomicBool::new(enabled),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn scanning_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.enabled.load(Ordering::Relaxed))
    }

    fn set_scanning_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn toggle_round_trips() {
        let settings = MemorySettings::new(true);
        assert!(settings.scanning_enabled().unwrap());
        settings.set_scanning_enabled(false).unwrap();
        assert!(!settings.scanning_enabled().unwrap());
    }
}
