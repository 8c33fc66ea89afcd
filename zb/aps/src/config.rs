//! APS configuration

use zb_core::{ExtAddr, Key, UNKNOWN_EXT_ADDR};

/// Well-known default trust center link key ("ZigBeeAlliance09")
pub const DEFAULT_TC_LINK_KEY: Key = *b"ZigBeeAlliance09";

/// Runtime parameters of the APS layer.
#[derive(Debug, Clone)]
pub struct ApsConfig {
    /// Only keys sent by this device are accepted; unknown accepts any
    pub trust_center_addr: ExtAddr,
    /// Preconfigured link key shared with the trust center
    pub tc_link_key: Key,
    /// Relay network keys addressed to our children
    pub relay_keys_to_children: bool,
}

impl Default for ApsConfig {
    fn default() -> Self {
        Self {
            trust_center_addr: UNKNOWN_EXT_ADDR,
            tc_link_key: DEFAULT_TC_LINK_KEY,
            relay_keys_to_children: true,
        }
    }
}

impl ApsConfig {
    pub fn builder() -> ApsConfigBuilder {
        ApsConfigBuilder::default()
    }
}

/// Builder for [`ApsConfig`].
#[derive(Debug, Clone, Default)]
pub struct ApsConfigBuilder {
    config: ApsConfig,
}

impl ApsConfigBuilder {
    pub fn trust_center_addr(mut self, addr: ExtAddr) -> Self {
        self.config.trust_center_addr = addr;
        self
    }

    pub fn tc_link_key(mut self, key: Key) -> Self {
        self.config.tc_link_key = key;
        self
    }

    pub fn relay_keys_to_children(mut self, relay: bool) -> Self {
        self.config.relay_keys_to_children = relay;
        self
    }

    pub fn build(self) -> ApsConfig {
        self.config
    }
}
