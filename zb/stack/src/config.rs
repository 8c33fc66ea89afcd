//! Stack configuration

use zb_aps::ApsConfig;
use zb_core::{DeviceType, ExtAddr, Key, Millis};
use zb_nwk::NwkConfig;

/// Configuration for the whole stack.
///
/// Carries the per-layer configurations and runtime options like the idle
/// callback.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub name: &'static str,
    pub ext_addr: ExtAddr,
    pub nwk: NwkConfig,
    pub aps: ApsConfig,
    /// Called when a dispatch pass finds nothing to do
    pub idle_callback: Option<fn()>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: "ZB",
            ext_addr: 0,
            nwk: NwkConfig::default(),
            aps: ApsConfig::default(),
            idle_callback: None,
        }
    }
}

impl StackConfig {
    /// Creates a new stack configuration builder.
    pub fn builder() -> StackConfigBuilder {
        StackConfigBuilder::default()
    }
}

/// Builder for [`StackConfig`].
#[derive(Debug, Clone, Default)]
pub struct StackConfigBuilder {
    config: StackConfig,
}

impl StackConfigBuilder {
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the IEEE address of the device.
    pub fn ext_addr(mut self, ext_addr: ExtAddr) -> Self {
        self.config.ext_addr = ext_addr;
        self
    }

    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.config.nwk.device_type = device_type;
        self
    }

    pub fn rx_on_when_idle(mut self, on: bool) -> Self {
        self.config.nwk.rx_on_when_idle = on;
        self
    }

    pub fn max_join_attempts(mut self, attempts: u8) -> Self {
        self.config.nwk.max_join_attempts = attempts.max(1);
        self
    }

    pub fn report_timeout(mut self, timeout: Millis) -> Self {
        self.config.nwk.report_timeout = timeout;
        self
    }

    pub fn leave_request_allowed(mut self, allowed: bool) -> Self {
        self.config.nwk.leave_request_allowed = allowed;
        self
    }

    pub fn tc_link_key(mut self, key: Key) -> Self {
        self.config.aps.tc_link_key = key;
        self
    }

    /// Replaces the network layer configuration.
    pub fn nwk(mut self, nwk: NwkConfig) -> Self {
        self.config.nwk = nwk;
        self
    }

    /// Replaces the APS configuration.
    pub fn aps(mut self, aps: ApsConfig) -> Self {
        self.config.aps = aps;
        self
    }

    /// Sets the idle callback function.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    /// Builds the stack configuration.
    pub fn build(self) -> StackConfig {
        self.config
    }
}
