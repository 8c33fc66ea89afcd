//! IEEE 802.15.4 MAC primitives as seen from the network layer
//!
//! Requests go down through [`MacService::request`], tagged with the
//! [`MacUser`] that issued them. The MAC driver answers every request with
//! exactly one [`MacConfirm`] carrying the same tag, delivered through
//! `Nwk::mac_confirm`. Beacons received during a scan arrive separately as
//! [`BeaconNotify`] indications.

use heapless::Vec;
use zb_core::{CapabilityInfo, ExtAddr, MacStatus, PanId, ShortAddr};

use crate::frame::{BeaconPayload, MAX_FRAME_LEN};

/// Outgoing MAC frame payload
pub type MacFrame = Vec<u8, MAX_FRAME_LEN>;

/// Network layer client waiting for a MAC confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacUser {
    Join,
    Leave,
    Report,
    /// Commands answered by the layer itself
    Command,
    /// NWK data request, tagged with the caller's handle
    Data(u8),
}

/// Writable MAC PIB attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacAttribute {
    Channel(u8),
    PanId(PanId),
    ShortAddress(ShortAddr),
    CoordShortAddress(ShortAddr),
    CoordExtAddress(ExtAddr),
    ExtAddress(ExtAddr),
    BeaconPayload(Vec<u8, { crate::frame::BEACON_PAYLOAD_LEN }>),
    BeaconPayloadLength(u8),
    RxOnWhenIdle(bool),
    TransactionPersistenceTime(u16),
}

/// Readable MAC PIB attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAttributeId {
    ResponseWaitTime,
}

/// Scan type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Active,
    EnergyDetect,
}

/// Request primitives issued by the network layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacPrimitive {
    Reset {
        set_default_pib: bool,
    },
    Set(MacAttribute),
    Get(MacAttributeId),
    RxEnable {
        on: bool,
    },
    Associate {
        channel: u8,
        pan_id: PanId,
        coord_short: ShortAddr,
        capability: CapabilityInfo,
    },
    Poll {
        coord_short: ShortAddr,
    },
    Scan {
        scan_type: ScanType,
        channels: u32,
        duration: u8,
    },
    Data {
        dst: ShortAddr,
        frame: MacFrame,
        ack: bool,
    },
}

impl MacPrimitive {
    /// `true` when `kind` is the confirmation this primitive waits for
    pub fn answered_by(&self, kind: &MacConfirmKind) -> bool {
        matches!(
            (self, kind),
            (MacPrimitive::Reset { .. }, MacConfirmKind::Reset)
                | (MacPrimitive::Set(_), MacConfirmKind::Set)
                | (MacPrimitive::Get(_), MacConfirmKind::Get(_))
                | (MacPrimitive::RxEnable { .. }, MacConfirmKind::RxEnable)
                | (MacPrimitive::Associate { .. }, MacConfirmKind::Associate { .. })
                | (MacPrimitive::Poll { .. }, MacConfirmKind::Poll)
                | (MacPrimitive::Scan { .. }, MacConfirmKind::Scan)
                | (MacPrimitive::Data { .. }, MacConfirmKind::Data)
        )
    }
}

/// Primitive-specific confirmation results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacConfirmKind {
    Reset,
    Set,
    /// MLME-GET result, already converted to milliseconds where it is a time
    Get(u32),
    RxEnable,
    Associate { short_addr: ShortAddr },
    Poll,
    Scan,
    Data,
}

/// Confirmation of a [`MacPrimitive`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacConfirm {
    pub status: MacStatus,
    pub kind: MacConfirmKind,
}

impl MacConfirm {
    pub const fn new(status: MacStatus, kind: MacConfirmKind) -> Self {
        Self { status, kind }
    }

    pub const fn success(kind: MacConfirmKind) -> Self {
        Self::new(MacStatus::Success, kind)
    }
}

/// MLME-BEACON-NOTIFY.indication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconNotify {
    pub channel: u8,
    pub pan_id: PanId,
    pub coord_short: ShortAddr,
    pub coord_ext: ExtAddr,
    pub lqi: u8,
    pub permit_join: bool,
    pub payload: BeaconPayload,
}

/// Downward MAC interface implemented by the radio driver.
pub trait MacService {
    /// Queue a primitive; the driver confirms it later with the same `user`
    fn request(&mut self, user: MacUser, primitive: MacPrimitive);
}
