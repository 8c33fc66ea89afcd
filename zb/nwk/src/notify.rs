//! Requests accepted from and notifications raised to the upper layer

use heapless::Vec;
use zb_core::{ExtAddr, ExtPanId, NwkStatus, PanId, ShortAddr};

use crate::frame::{MAX_FRAME_LEN, MAX_REPORT_PANID};

/// How the device enters the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinMethod {
    Association,
    Rejoin,
}

/// NLME-JOIN.request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlmeJoinReq {
    /// Network to join; zero accepts any
    pub ext_pan_id: ExtPanId,
    pub method: JoinMethod,
    /// Channels to scan when no candidate parent is known; zero disables scanning
    pub scan_channels: u32,
    pub scan_duration: u8,
}

/// NLME-JOIN.confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinConf {
    pub status: NwkStatus,
    pub method: JoinMethod,
    pub short_addr: ShortAddr,
    pub pan_id: PanId,
    pub ext_pan_id: ExtPanId,
    pub channel: u8,
}

/// NLME-LEAVE.request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NlmeLeaveReq {
    /// Device to remove; zero or the own address means this device
    pub device: ExtAddr,
    pub remove_children: bool,
    pub rejoin: bool,
}

/// NLME-LEAVE.confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeaveConf {
    pub device: ExtAddr,
    pub status: NwkStatus,
    pub rejoin: bool,
    /// The leave was requested by another device
    pub remote: bool,
}

/// NLME-LEAVE.indication for a neighbor that left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeaveInd {
    pub device: ExtAddr,
    pub rejoin: bool,
}

/// PAN ID conflict report received by the network manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportInd {
    pub src: ShortAddr,
    pub ext_pan_id: ExtPanId,
    pub pan_ids: Vec<PanId, MAX_REPORT_PANID>,
}

/// NLDE-DATA.indication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInd {
    pub src: ShortAddr,
    pub src_ext: Option<ExtAddr>,
    pub dst: ShortAddr,
    pub lqi: u8,
    pub payload: Vec<u8, MAX_FRAME_LEN>,
}

/// Everything the network layer reports upward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NwkNotify {
    JoinConf(JoinConf),
    LeaveConf(LeaveConf),
    LeaveInd(LeaveInd),
    ReportInd(ReportInd),
    DataInd(DataInd),
    DataConf { handle: u8, status: NwkStatus },
}
