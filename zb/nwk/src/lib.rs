#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # ZigBee Network Layer
//!
//! Join, leave and PAN ID conflict reporting on top of an IEEE 802.15.4 MAC.
//!
//! Each function is a component with its own state machine. Components are
//! driven through [`Nwk`]:
//!
//! - upper-layer requests are queued and start the component task
//! - [`Nwk::task_handler`] runs one posted component step
//! - MAC confirmations and indications are routed back to the component
//!   that issued the request
//! - [`Nwk::tick`] advances component timers
//!
//! Results flow up as [`NwkNotify`] values taken with
//! [`Nwk::take_notification`].
//!
//! ## Roles
//!
//! The `router`, `end-device` and `coordinator` features select what the
//! build can do. A coordinator-only build carries [`join::JoinDisabled`]
//! instead of the join state machine, and without `panid-conflict` the
//! report component is [`report::ReportDisabled`].

pub mod config;
pub mod context;
pub mod frame;
pub mod join;
pub mod leave;
pub mod mac;
pub mod neighbor;
pub mod nib;
pub mod notify;
pub mod report;

pub use config::*;
pub use context::{Component, NwkContext};
pub use frame::*;
pub use join::{JoinService, JoinState};
pub use leave::LeaveState;
pub use mac::*;
pub use neighbor::*;
pub use nib::*;
pub use notify::*;
pub use report::{ReportService, ReportState};

#[cfg(test)]
mod tests;

use heapless::Vec;
use zb_core::{is_broadcast, ExtAddr, NwkStatus, ShortAddr, ZbError, ZbResult};

use context::{JOIN_TASK, LEAVE_TASK, REPORT_TASK};
use leave::LeaveReq;

#[cfg(any(feature = "router", feature = "end-device"))]
pub type JoinComponent = join::JoinReq;
#[cfg(not(any(feature = "router", feature = "end-device")))]
pub type JoinComponent = join::JoinDisabled;

#[cfg(feature = "panid-conflict")]
pub type ReportComponent = report::ReportCommandReq;
#[cfg(not(feature = "panid-conflict"))]
pub type ReportComponent = report::ReportDisabled;

/// The network layer
pub struct Nwk<M: MacService> {
    ctx: NwkContext<M>,
    join: JoinComponent,
    leave: LeaveReq,
    report: ReportComponent,
}

impl<M: MacService> Nwk<M> {
    pub fn new(mac: M, config: NwkConfig, ext_addr: ExtAddr) -> Self {
        let mut nib = Nib::new(config.device_type, ext_addr, config.rx_on_when_idle);
        nib.stack_profile = config.stack_profile;
        log::info!("nwk: {:?} {:016x}", config.device_type, ext_addr);
        Self {
            ctx: NwkContext::new(mac, config, nib),
            join: JoinComponent::default(),
            leave: LeaveReq::new(),
            report: ReportComponent::default(),
        }
    }

    /// NLME-JOIN.request
    pub fn join_req(&mut self, request: NlmeJoinReq) -> ZbResult<()> {
        self.join.request(&mut self.ctx, request)
    }

    /// NLME-LEAVE.request
    pub fn leave_req(&mut self, request: NlmeLeaveReq) -> ZbResult<()> {
        self.leave.request(&mut self.ctx, request)
    }

    /// Ask a device that claims to be our child, but is not in the
    /// neighbor table, to leave and rejoin
    pub fn leave_unknown_child(&mut self, short_addr: ShortAddr) -> ZbResult<()> {
        self.leave.leave_unknown_child(&mut self.ctx, short_addr)
    }

    /// NLDE-DATA.request
    ///
    /// Frames go straight to neighbors and broadcasts, everything else to
    /// the parent.
    pub fn data_req(&mut self, dst: ShortAddr, payload: &[u8], handle: u8) -> ZbResult<()> {
        if !self.ctx.nib.joined {
            return Err(ZbError::NotPermitted);
        }
        let radius = self.ctx.config.max_depth.saturating_mul(2);
        let seq = self.ctx.nib.next_seq();
        let header = frame::NwkHeader::data(dst, self.ctx.nib.short_addr, radius, seq)
            .with_src_ext(self.ctx.nib.ext_addr);
        let frame = header.encode(payload)?;
        let next_hop = if is_broadcast(dst) || self.ctx.neighbors.find_short(dst).is_some() {
            dst
        } else {
            self.ctx.nib.parent_short
        };
        self.ctx.request(
            MacUser::Data(handle),
            MacPrimitive::Data {
                dst: next_hop,
                frame,
                ack: !is_broadcast(next_hop),
            },
        );
        Ok(())
    }

    /// Confirmation from the MAC for a request issued by `user`
    pub fn mac_confirm(&mut self, user: MacUser, confirm: MacConfirm) {
        match user {
            MacUser::Join => self.join.mac_confirm(&mut self.ctx, confirm),
            MacUser::Leave => self.leave.mac_confirm(&mut self.ctx, confirm),
            MacUser::Report => self.report.mac_confirm(&mut self.ctx, confirm),
            MacUser::Command => log::trace!("nwk: command sent: {}", confirm.status),
            MacUser::Data(handle) => self.ctx.notify(NwkNotify::DataConf {
                handle,
                status: confirm.status.into(),
            }),
        }
    }

    /// MLME-BEACON-NOTIFY.indication
    pub fn beacon_notify(&mut self, beacon: &BeaconNotify) {
        if !self.ctx.neighbors.update_from_beacon(beacon) {
            log::debug!("nwk: neighbor table full, beacon from {:016x} ignored", beacon.coord_ext);
        }
        ReportService::<M>::beacon_ind(&mut self.report, beacon);
        self.report.detect_pan_id_conflict(&mut self.ctx, beacon);
    }

    /// MCPS-DATA.indication carrying a NWK frame
    pub fn mac_data_ind(&mut self, frame: &[u8], lqi: u8) {
        let (header, at) = match frame::NwkHeader::decode(frame) {
            Ok(decoded) => decoded,
            Err(err) => {
                log::debug!("nwk: frame dropped: {}", err);
                return;
            }
        };
        let nib = &self.ctx.nib;
        let for_us = header.dst == nib.short_addr
            || header.dst_ext == Some(nib.ext_addr)
            || is_broadcast(header.dst);
        let payload = &frame[at..];

        match header.frame_type {
            FrameType::Data => {
                if !for_us {
                    return;
                }
                let mut data = Vec::new();
                if data.extend_from_slice(payload).is_err() {
                    return;
                }
                self.ctx.notify(NwkNotify::DataInd(DataInd {
                    src: header.src,
                    src_ext: header.src_ext,
                    dst: header.dst,
                    lqi,
                    payload: data,
                }));
            }
            FrameType::Command => match NwkCommand::decode(payload) {
                Ok(NwkCommand::Leave(options)) => {
                    self.leave.frame_ind(&mut self.ctx, &header, options)
                }
                Ok(NwkCommand::RejoinResponse { short_addr, status }) if for_us => {
                    self.join
                        .rejoin_response_ind(&mut self.ctx, &header, short_addr, status)
                }
                Ok(NwkCommand::RejoinRequest(_)) if for_us => self.rejoin_request_ind(&header),
                Ok(NwkCommand::Report(report)) if for_us => {
                    self.report.frame_ind(&mut self.ctx, &header, report)
                }
                Ok(_) => {}
                Err(err) => log::debug!("nwk: command dropped: {}", err),
            },
        }
    }

    /// Answer a rejoin request from a device that keeps its address
    fn rejoin_request_ind(&mut self, header: &frame::NwkHeader) {
        let ctx = &mut self.ctx;
        if !cfg!(feature = "child-management")
            || !ctx.nib.joined
            || !ctx.nib.device_type.is_router_capable()
        {
            return;
        }
        let Some(src_ext) = header.src_ext else {
            return;
        };
        let device_type = ctx
            .neighbors
            .find_ext(src_ext)
            .map_or(zb_core::DeviceType::EndDevice, |n| n.device_type);
        let status = if ctx
            .neighbors
            .upsert(Neighbor::child(src_ext, header.src, device_type))
        {
            0
        } else {
            NwkStatus::NeighborTableFull.code()
        };
        let seq = ctx.nib.next_seq();
        let response = frame::NwkHeader::command(header.src, ctx.nib.short_addr, 1, seq)
            .with_dst_ext(src_ext)
            .with_src_ext(ctx.nib.ext_addr);
        let command = NwkCommand::RejoinResponse {
            short_addr: header.src,
            status,
        };
        if let Err(err) = ctx.send_command(MacUser::Command, header.src, &response, &command) {
            log::warn!("nwk: rejoin response not sent: {}", err);
        }
    }

    /// Advance component timers
    pub fn tick(&mut self, elapsed: u32) {
        self.join.tick(&mut self.ctx, elapsed);
        self.leave.tick(&mut self.ctx, elapsed);
        self.report.tick(&mut self.ctx, elapsed);
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.ctx.tasks.is_empty()
    }

    /// Run the highest priority posted component task.
    ///
    /// Returns `false` when nothing was posted.
    pub fn task_handler(&mut self) -> bool {
        let Some(id) = self.ctx.tasks.take_next() else {
            return false;
        };
        match id {
            JOIN_TASK => self.join.task_handler(&mut self.ctx),
            LEAVE_TASK => self.leave.task_handler(&mut self.ctx),
            REPORT_TASK => self.report.task_handler(&mut self.ctx),
            _ => log::warn!("nwk: unknown task {}", id),
        }
        true
    }

    pub fn take_notification(&mut self) -> Option<NwkNotify> {
        self.ctx.take_notification()
    }

    /// Return every component to Idle and drop queued requests.
    ///
    /// The NIB and neighbor table are kept.
    pub fn reset(&mut self) {
        log::info!("nwk: reset");
        Component::<M>::reset(&mut self.join);
        Component::<M>::reset(&mut self.leave);
        Component::<M>::reset(&mut self.report);
        self.ctx.clear();
    }

    pub fn is_idle(&self) -> bool {
        Component::<M>::is_idle(&self.join)
            && Component::<M>::is_idle(&self.leave)
            && Component::<M>::is_idle(&self.report)
            && !self.has_pending_tasks()
    }

    pub fn join(&self) -> &JoinComponent {
        &self.join
    }

    pub fn leave(&self) -> &LeaveReq {
        &self.leave
    }

    pub fn report(&self) -> &ReportComponent {
        &self.report
    }

    pub fn nib(&self) -> &Nib {
        &self.ctx.nib
    }

    pub fn nib_mut(&mut self) -> &mut Nib {
        &mut self.ctx.nib
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.ctx.neighbors
    }

    pub fn neighbors_mut(&mut self) -> &mut NeighborTable {
        &mut self.ctx.neighbors
    }

    pub fn config(&self) -> &NwkConfig {
        &self.ctx.config
    }

    pub fn mac(&self) -> &M {
        &self.ctx.mac
    }

    pub fn mac_mut(&mut self) -> &mut M {
        &mut self.ctx.mac
    }
}
