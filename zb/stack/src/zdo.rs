//! Leave-network orchestration
//!
//! Leaving takes two layers: the network layer announces the departure and
//! resets the MAC, then the APS layer is stopped. A local request walks
//! `NwkLeave -> ApsStop -> Idle` and ends with one
//! [`ZdoNotify::LeaveNetworkConf`]. A leave the network asked for walks
//! `Remote -> Idle` and ends with [`ZdoNotify::NetworkLeft`].

use zb_aps::{Aps, ApsControlReq};
use zb_core::{ExtAddr, NwkStatus, ZbError, ZbResult, UNKNOWN_EXT_ADDR};
use zb_nwk::{LeaveConf, MacService, NlmeLeaveReq, Nwk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ZdoLeaveState {
    Idle,
    /// Waiting for NLME-LEAVE.confirm
    NwkLeave,
    /// Waiting for the APS stop confirmation
    ApsStop,
    /// Stopping APS after a leave requested by another device
    Remote,
}

/// ZDO leave-network request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZdoLeaveReq {
    pub rejoin: bool,
    pub remove_children: bool,
}

/// Notifications raised by the ZDO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ZdoNotify {
    LeaveNetworkConf { status: NwkStatus },
    /// Another device made us leave
    NetworkLeft { rejoin: bool },
}

#[derive(Debug)]
pub struct Zdo {
    state: ZdoLeaveState,
    status: NwkStatus,
    rejoin: bool,
}

impl Zdo {
    pub const fn new() -> Self {
        Self {
            state: ZdoLeaveState::Idle,
            status: NwkStatus::Success,
            rejoin: false,
        }
    }

    pub fn state(&self) -> ZdoLeaveState {
        self.state
    }

    pub fn leave_network_req<M: MacService>(
        &mut self,
        nwk: &mut Nwk<M>,
        request: ZdoLeaveReq,
    ) -> ZbResult<()> {
        if self.state != ZdoLeaveState::Idle {
            return Err(ZbError::Busy);
        }
        nwk.leave_req(NlmeLeaveReq {
            device: UNKNOWN_EXT_ADDR,
            remove_children: request.remove_children,
            rejoin: request.rejoin,
        })?;
        self.rejoin = request.rejoin;
        self.state = ZdoLeaveState::NwkLeave;
        log::debug!("zdo: leaving network");
        Ok(())
    }

    /// NLME-LEAVE.confirm from the network layer
    pub fn leave_conf(&mut self, aps: &mut Aps, conf: &LeaveConf, own_ext: ExtAddr) -> Option<ZdoNotify> {
        let ours = conf.device == own_ext || conf.device == UNKNOWN_EXT_ADDR;
        if !ours {
            return None;
        }
        match self.state {
            ZdoLeaveState::NwkLeave if conf.status.is_success() => {
                self.stop_aps(aps, conf.status, ZdoLeaveState::ApsStop)
            }
            ZdoLeaveState::NwkLeave => {
                self.status = conf.status;
                Some(self.finish())
            }
            ZdoLeaveState::Idle if conf.remote => {
                self.rejoin = conf.rejoin;
                self.stop_aps(aps, conf.status, ZdoLeaveState::Remote)
            }
            _ => None,
        }
    }

    fn stop_aps(&mut self, aps: &mut Aps, status: NwkStatus, next: ZdoLeaveState) -> Option<ZdoNotify> {
        self.status = status;
        self.state = next;
        match aps.control_req(ApsControlReq::Stop) {
            Ok(()) => None,
            Err(err) => {
                log::warn!("zdo: APS stop not queued: {}", err);
                Some(self.finish())
            }
        }
    }

    /// APS control confirmation
    pub fn aps_control_conf(&mut self, request: ApsControlReq) -> Option<ZdoNotify> {
        match (request, self.state) {
            (ApsControlReq::Stop, ZdoLeaveState::ApsStop | ZdoLeaveState::Remote) => Some(self.finish()),
            _ => None,
        }
    }

    fn finish(&mut self) -> ZdoNotify {
        let notify = match self.state {
            ZdoLeaveState::Remote => ZdoNotify::NetworkLeft { rejoin: self.rejoin },
            _ => ZdoNotify::LeaveNetworkConf { status: self.status },
        };
        log::info!("zdo: {:?}", notify);
        self.state = ZdoLeaveState::Idle;
        notify
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Zdo {
    fn default() -> Self {
        Self::new()
    }
}
