//! Controller configuration.

use crate::error::ConfigError;
use crate::gate::VersionGate;
use crate::registry::{MAX_NET_ID, MIN_NET_ID, NetIdAllocator};

/// Settings fixed at controller construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub version_gate: VersionGate,
    pub net_id_min: u32,
    pub net_id_max: u32,
}

impl ControllerConfig {
    pub fn new(version_gate: VersionGate) -> Self {
        Self {
            version_gate,
            ..Self::default()
        }
    }

    pub fn with_net_id_range(mut self, min: u32, max: u32) -> Self {
        self.net_id_min = min;
        self.net_id_max = max;
        self
    }

    /// Checks the netId window the same way controller construction does.
    pub fn validate(&self) -> Result<(), ConfigError> {
        NetIdAllocator::new(self.net_id_min, self.net_id_max).map(|_| ())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            version_gate: VersionGate::new(true),
            net_id_min: MIN_NET_ID,
            net_id_max: MAX_NET_ID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.version_gate.allowlist_supported());
    }

    #[test]
    fn test_invalid_ranges() {
        let zero = ControllerConfig::default().with_net_id_range(0, 10);
        assert_eq!(zero.validate(), Err(ConfigError::ZeroNetId));

        let empty = ControllerConfig::default().with_net_id_range(20, 10);
        assert_eq!(
            empty.validate(),
            Err(ConfigError::EmptyNetIdRange { min: 20, max: 10 })
        );
    }

    #[test]
    fn test_single_id_window_is_valid() {
        let config = ControllerConfig::new(VersionGate::new(false)).with_net_id_range(42, 42);
        assert!(config.validate().is_ok());
        assert!(!config.version_gate.allowlist_supported());
    }
}
