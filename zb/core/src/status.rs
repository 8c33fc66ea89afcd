//! Protocol status codes carried on confirmations
//!
//! Numeric values follow IEEE 802.15.4 for the MAC and ZigBee PRO for
//! NWK and APS so that they can be traced on the air
//! and in logs without translation.

use core::fmt;

/// IEEE 802.15.4 MAC status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MacStatus {
    Success = 0x00,
    PanAtCapacity = 0x01,
    PanAccessDenied = 0x02,
    BeaconLoss = 0xE0,
    ChannelAccessFailure = 0xE1,
    Denied = 0xE2,
    InvalidParameter = 0xE8,
    NoAck = 0xE9,
    NoBeacon = 0xEA,
    NoData = 0xEB,
    NoShortAddress = 0xEC,
    TransactionExpired = 0xF0,
    TransactionOverflow = 0xF1,
    UnsupportedAttribute = 0xF4,
}

impl MacStatus {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0x00 => MacStatus::Success,
            0x01 => MacStatus::PanAtCapacity,
            0x02 => MacStatus::PanAccessDenied,
            0xE0 => MacStatus::BeaconLoss,
            0xE1 => MacStatus::ChannelAccessFailure,
            0xE2 => MacStatus::Denied,
            0xE8 => MacStatus::InvalidParameter,
            0xE9 => MacStatus::NoAck,
            0xEA => MacStatus::NoBeacon,
            0xEB => MacStatus::NoData,
            0xEC => MacStatus::NoShortAddress,
            0xF0 => MacStatus::TransactionExpired,
            0xF1 => MacStatus::TransactionOverflow,
            0xF4 => MacStatus::UnsupportedAttribute,
            _ => return None,
        };
        Some(status)
    }

    pub const fn is_success(self) -> bool {
        matches!(self, MacStatus::Success)
    }
}

/// NWK layer status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NwkStatus {
    Success,
    InvalidParameter,
    InvalidRequest,
    NotPermitted,
    StartupFailure,
    AlreadyPresent,
    NeighborTableFull,
    UnknownDevice,
    UnsupportedAttribute,
    NoNetworks,
    NoKey,
    BadCcmOutput,
    /// Failure reported by the MAC and passed through unchanged
    Mac(MacStatus),
}

impl NwkStatus {
    pub const fn code(self) -> u8 {
        match self {
            NwkStatus::Success => 0x00,
            NwkStatus::InvalidParameter => 0xC1,
            NwkStatus::InvalidRequest => 0xC2,
            NwkStatus::NotPermitted => 0xC3,
            NwkStatus::StartupFailure => 0xC4,
            NwkStatus::AlreadyPresent => 0xC5,
            NwkStatus::NeighborTableFull => 0xC7,
            NwkStatus::UnknownDevice => 0xC8,
            NwkStatus::UnsupportedAttribute => 0xC9,
            NwkStatus::NoNetworks => 0xCA,
            NwkStatus::NoKey => 0xCD,
            NwkStatus::BadCcmOutput => 0xCE,
            NwkStatus::Mac(status) => status.code(),
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, NwkStatus::Success | NwkStatus::Mac(MacStatus::Success))
    }
}

impl From<MacStatus> for NwkStatus {
    fn from(status: MacStatus) -> Self {
        match status {
            MacStatus::Success => NwkStatus::Success,
            other => NwkStatus::Mac(other),
        }
    }
}

/// APS layer status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApsStatus {
    Success = 0x00,
    AsduTooLong = 0xA0,
    IllegalRequest = 0xA3,
    InvalidParameter = 0xA6,
    NoAck = 0xA7,
    NotSupported = 0xAB,
    SecurityFail = 0xAD,
    UnsupportedAttribute = 0xB0,
}

impl ApsStatus {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MacStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAC 0x{:02x}", self.code())
    }
}

impl fmt::Display for NwkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NWK 0x{:02x}", self.code())
    }
}

impl fmt::Display for ApsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "APS 0x{:02x}", self.code())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MacStatus {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "MAC({=u8:#x})", self.code());
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NwkStatus {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "NWK({=u8:#x})", self.code());
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ApsStatus {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "APS({=u8:#x})", self.code());
    }
}
