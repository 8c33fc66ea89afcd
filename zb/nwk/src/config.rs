//! Network layer configuration

use zb_core::{DeviceType, Millis, ShortAddr, COORDINATOR_ADDR};

/// All 2.4 GHz channels (11..=26)
pub const ALL_CHANNELS: u32 = 0x07FF_F800;

/// Runtime parameters of the network layer.
#[derive(Debug, Clone)]
pub struct NwkConfig {
    pub device_type: DeviceType,
    pub rx_on_when_idle: bool,
    /// Join attempts before the final failure is confirmed
    pub max_join_attempts: u8,
    /// Delay before polling the parent for a rejoin response
    pub mac_latency: Millis,
    pub report_scan_channels: u32,
    pub report_scan_duration: u8,
    /// Quiet period after a PAN ID conflict report
    pub report_timeout: Millis,
    /// Accept leave requests from other devices
    pub leave_request_allowed: bool,
    pub manager_addr: ShortAddr,
    pub stack_profile: u8,
    pub max_depth: u8,
    pub transaction_persistence_time: u16,
}

impl Default for NwkConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Router,
            rx_on_when_idle: true,
            max_join_attempts: 3,
            mac_latency: Millis::new(100),
            report_scan_channels: ALL_CHANNELS,
            report_scan_duration: 3,
            report_timeout: Millis::from_secs(60),
            leave_request_allowed: true,
            manager_addr: COORDINATOR_ADDR,
            stack_profile: 2,
            max_depth: 15,
            transaction_persistence_time: 0x01F4,
        }
    }
}

impl NwkConfig {
    pub fn builder() -> NwkConfigBuilder {
        NwkConfigBuilder::default()
    }
}

/// Builder for [`NwkConfig`].
#[derive(Debug, Clone, Default)]
pub struct NwkConfigBuilder {
    config: NwkConfig,
}

impl NwkConfigBuilder {
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.config.device_type = device_type;
        self
    }

    pub fn rx_on_when_idle(mut self, on: bool) -> Self {
        self.config.rx_on_when_idle = on;
        self
    }

    pub fn max_join_attempts(mut self, attempts: u8) -> Self {
        self.config.max_join_attempts = attempts.max(1);
        self
    }

    pub fn mac_latency(mut self, latency: Millis) -> Self {
        self.config.mac_latency = latency;
        self
    }

    /// Channel mask and per-channel duration of the conflict scan
    pub fn report_scan(mut self, channels: u32, duration: u8) -> Self {
        self.config.report_scan_channels = channels;
        self.config.report_scan_duration = duration;
        self
    }

    pub fn report_timeout(mut self, timeout: Millis) -> Self {
        self.config.report_timeout = timeout;
        self
    }

    pub fn leave_request_allowed(mut self, allowed: bool) -> Self {
        self.config.leave_request_allowed = allowed;
        self
    }

    pub fn manager_addr(mut self, addr: ShortAddr) -> Self {
        self.config.manager_addr = addr;
        self
    }

    pub fn max_depth(mut self, depth: u8) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn build(self) -> NwkConfig {
        self.config
    }
}
