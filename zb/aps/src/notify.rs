//! Frames exchanged with the network layer and notifications raised upward

use zb_core::{ApsStatus, ExtAddr, KeySeqNum, ShortAddr};

use crate::frame::ApsFrame;
use crate::state::ApsControlReq;

/// APS frame to hand to NLDE-DATA.request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApsDataReq {
    pub dst: ShortAddr,
    pub frame: ApsFrame,
}

/// APS command frame received from the network layer.
///
/// Handlers may rewrite `frame` in place and move it into the outgoing
/// queue; they report that by returning `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApsCommandInd {
    pub src: ShortAddr,
    pub src_ext: Option<ExtAddr>,
    pub frame: ApsFrame,
}

impl ApsCommandInd {
    pub fn new(src: ShortAddr, src_ext: Option<ExtAddr>, frame: ApsFrame) -> Self {
        Self { src, src_ext, frame }
    }
}

/// Everything the APS layer reports upward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApsNotify {
    ControlConf {
        request: ApsControlReq,
        status: ApsStatus,
    },
    /// APSME-TRANSPORT-KEY.confirm
    TransportKeyConf { dst: ExtAddr, status: ApsStatus },
    /// APSME-TRANSPORT-KEY.indication: a network key was installed
    TransportKeyInd { src: ExtAddr, key_seq: KeySeqNum },
    /// A secured command failed to authenticate
    SecurityFailure { src: ShortAddr, status: ApsStatus },
}
