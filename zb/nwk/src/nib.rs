//! Network information base

use zb_core::{
    CapabilityInfo, DeviceType, ExtAddr, ExtPanId, PanId, ShortAddr, NO_SHORT_ADDR,
};

use crate::frame::{BeaconPayload, PROTOCOL_VERSION};

#[derive(Debug, Clone)]
pub struct Nib {
    pub device_type: DeviceType,
    pub ext_addr: ExtAddr,
    pub short_addr: ShortAddr,
    pub pan_id: PanId,
    pub ext_pan_id: ExtPanId,
    pub channel: u8,
    pub depth: u8,
    pub parent_short: ShortAddr,
    pub parent_ext: ExtAddr,
    pub update_id: u8,
    pub stack_profile: u8,
    pub rx_on_when_idle: bool,
    pub router_capacity: bool,
    pub end_device_capacity: bool,
    pub joined: bool,
    seq: u8,
}

impl Nib {
    pub fn new(device_type: DeviceType, ext_addr: ExtAddr, rx_on_when_idle: bool) -> Self {
        Self {
            device_type,
            ext_addr,
            short_addr: NO_SHORT_ADDR,
            pan_id: 0xFFFF,
            ext_pan_id: 0,
            channel: 0,
            depth: 0,
            parent_short: NO_SHORT_ADDR,
            parent_ext: 0,
            update_id: 0,
            stack_profile: 2,
            rx_on_when_idle: rx_on_when_idle || device_type.is_router_capable(),
            router_capacity: device_type.is_router_capable(),
            end_device_capacity: device_type.is_router_capable(),
            joined: false,
            seq: 0,
        }
    }

    /// Next NWK sequence number
    pub fn next_seq(&mut self) -> u8 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    pub fn capability(&self) -> CapabilityInfo {
        CapabilityInfo::for_device(self.device_type, self.rx_on_when_idle)
    }

    pub fn beacon_payload(&self) -> BeaconPayload {
        BeaconPayload {
            stack_profile: self.stack_profile,
            protocol_version: PROTOCOL_VERSION,
            router_capacity: self.router_capacity,
            device_depth: self.depth,
            end_device_capacity: self.end_device_capacity,
            ext_pan_id: self.ext_pan_id,
            update_id: self.update_id,
        }
    }

    /// Forget the network; the device identity and role stay
    pub fn leave_network(&mut self) {
        *self = Self {
            seq: self.seq,
            ..Self::new(self.device_type, self.ext_addr, self.rx_on_when_idle)
        };
    }
}
