//! Address and device vocabulary shared by the layers

use bitflags::bitflags;

/// 16-bit network (short) address
pub type ShortAddr = u16;
/// 64-bit IEEE (extended) address
pub type ExtAddr = u64;
/// 16-bit PAN identifier
pub type PanId = u16;
/// 64-bit extended PAN identifier
pub type ExtPanId = u64;
/// 128-bit symmetric key
pub type Key = [u8; 16];
/// Network key sequence number
pub type KeySeqNum = u8;

/// Broadcast to all devices
pub const BROADCAST_ALL: ShortAddr = 0xFFFF;
/// Broadcast to devices with the receiver on when idle
pub const BROADCAST_RX_ON_WHEN_IDLE: ShortAddr = 0xFFFD;
/// Broadcast to routers and the coordinator
pub const BROADCAST_ROUTERS: ShortAddr = 0xFFFC;
/// Short address of the coordinator
pub const COORDINATOR_ADDR: ShortAddr = 0x0000;
/// No short address assigned
pub const NO_SHORT_ADDR: ShortAddr = 0xFFFE;
/// Extended address not known
pub const UNKNOWN_EXT_ADDR: ExtAddr = 0;

/// Returns `true` for the broadcast range 0xFFF8..=0xFFFF.
pub const fn is_broadcast(addr: ShortAddr) -> bool {
    addr >= 0xFFF8
}

/// Logical device type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
}

impl DeviceType {
    /// Routers and the coordinator may accept children
    pub const fn is_router_capable(self) -> bool {
        !matches!(self, DeviceType::EndDevice)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceType {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            DeviceType::Coordinator => defmt::write!(fmt, "Coordinator"),
            DeviceType::Router => defmt::write!(fmt, "Router"),
            DeviceType::EndDevice => defmt::write!(fmt, "EndDevice"),
        }
    }
}

bitflags! {
    /// MAC capability information octet
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CapabilityInfo: u8 {
        const ALTERNATE_PAN_COORDINATOR = 1 << 0;
        const FULL_FUNCTION_DEVICE = 1 << 1;
        const MAINS_POWERED = 1 << 2;
        const RX_ON_WHEN_IDLE = 1 << 3;
        const SECURITY_CAPABLE = 1 << 6;
        const ALLOCATE_ADDRESS = 1 << 7;
    }
}

impl CapabilityInfo {
    /// Capability octet a device of `device_type` advertises when joining
    pub fn for_device(device_type: DeviceType, rx_on_when_idle: bool) -> Self {
        let mut caps = CapabilityInfo::ALLOCATE_ADDRESS;
        if device_type.is_router_capable() {
            caps |= CapabilityInfo::FULL_FUNCTION_DEVICE | CapabilityInfo::MAINS_POWERED;
        }
        if rx_on_when_idle || device_type.is_router_capable() {
            caps |= CapabilityInfo::RX_ON_WHEN_IDLE;
        }
        caps
    }
}

/// Little-endian field helpers used by the frame codecs.
pub mod le {
    use crate::{ZbError, ZbResult};

    pub fn u16_at(buf: &[u8], at: usize) -> ZbResult<u16> {
        let bytes = buf.get(at..at + 2).ok_or(ZbError::InvalidLength)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32_at(buf: &[u8], at: usize) -> ZbResult<u32> {
        let bytes = buf.get(at..at + 4).ok_or(ZbError::InvalidLength)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw))
    }

    pub fn u64_at(buf: &[u8], at: usize) -> ZbResult<u64> {
        let bytes = buf.get(at..at + 8).ok_or(ZbError::InvalidLength)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }
}
