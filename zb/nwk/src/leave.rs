//! Leave
//!
//! Self leave: SelfSendCmd → SelfWaitConfirm → SelfResetMac → Confirm.
//! Known child: ChildSendCmd → ChildWaitConfirm → Confirm.
//! Unknown child: UnknownChild → UnknownChildWaitConfirm → Confirm.
//!
//! Requests are served one at a time from the queue, starting in Begin.
//! A self leave with remove-children first walks every child through
//! ChildSendCmd/ChildWaitConfirm. A leave request received from the
//! network while idle skips Begin and goes straight to SelfSendCmd.

use zb_core::codes::NWK_LEAVE_BAD_STATE;
use zb_core::{
    sys_fatal, ExtAddr, NwkStatus, RequestQueue, ShortAddr, ZbError, ZbResult,
    BROADCAST_RX_ON_WHEN_IDLE,
};

use crate::context::{Component, NwkContext, LEAVE_TASK};
use crate::frame::{LeaveOptions, NwkCommand, NwkHeader};
use crate::mac::{MacConfirm, MacPrimitive, MacService, MacUser};
use crate::neighbor::Relationship;
use crate::notify::{LeaveConf, LeaveInd, NlmeLeaveReq, NwkNotify};

pub const LEAVE_QUEUE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LeaveState {
    Idle = 0xE6,
    Begin = 0x11,
    SelfSendCmd = 0x12,
    SelfWaitConfirm = 0x13,
    SelfResetMac = 0x14,
    ChildSendCmd = 0x15,
    ChildWaitConfirm = 0x16,
    UnknownChild = 0x17,
    UnknownChildWaitConfirm = 0x18,
    Confirm = 0x19,
}

/// Queued leave operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaveJob {
    Local(NlmeLeaveReq),
    /// Leave requested by another device or forced by the parent leaving
    Remote { rejoin: bool, remove_children: bool },
    UnknownChild { short_addr: ShortAddr },
}

/// Parameters of the operation in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaveParam {
    None,
    MacReset { set_default_pib: bool },
    Child {
        ext_addr: ExtAddr,
        short_addr: ShortAddr,
        tx_options: LeaveOptions,
    },
}

#[derive(Debug)]
pub struct LeaveReq {
    queue: RequestQueue<LeaveJob, LEAVE_QUEUE_LEN>,
    state: LeaveState,
    param: LeaveParam,
    status: NwkStatus,
    /// Children removed while leaving with remove-children
    leave_child_count: u8,
    cascade: bool,
}

impl LeaveReq {
    pub const fn new() -> Self {
        Self {
            queue: RequestQueue::new(),
            state: LeaveState::Idle,
            param: LeaveParam::None,
            status: NwkStatus::Success,
            leave_child_count: 0,
            cascade: false,
        }
    }

    pub fn state(&self) -> LeaveState {
        self.state
    }

    pub fn leave_child_count(&self) -> u8 {
        self.leave_child_count
    }

    /// Queue an NLME-LEAVE.request
    pub fn request<M: MacService>(
        &mut self,
        ctx: &mut NwkContext<M>,
        request: NlmeLeaveReq,
    ) -> ZbResult<()> {
        self.queue.post(LeaveJob::Local(request))?;
        self.kick(ctx);
        Ok(())
    }

    /// Ask a child that is not in the neighbor table to leave and rejoin
    pub fn leave_unknown_child<M: MacService>(
        &mut self,
        ctx: &mut NwkContext<M>,
        short_addr: ShortAddr,
    ) -> ZbResult<()> {
        if !cfg!(feature = "child-management") || !ctx.nib.device_type.is_router_capable() {
            return Err(ZbError::NotPermitted);
        }
        self.queue.post(LeaveJob::UnknownChild { short_addr })?;
        self.kick(ctx);
        Ok(())
    }

    /// Received leave command
    pub fn frame_ind<M: MacService>(
        &mut self,
        ctx: &mut NwkContext<M>,
        header: &NwkHeader,
        options: LeaveOptions,
    ) {
        if !ctx.nib.joined {
            return;
        }
        let rejoin = options.contains(LeaveOptions::REJOIN);
        let src_ext = header
            .src_ext
            .or_else(|| ctx.neighbors.find_short(header.src).map(|n| n.ext_addr));

        if options.contains(LeaveOptions::REQUEST) {
            let for_us = header.dst == ctx.nib.short_addr
                || header.dst_ext == Some(ctx.nib.ext_addr)
                || zb_core::is_broadcast(header.dst);
            if !for_us {
                return;
            }
            let from_parent = header.src == ctx.nib.parent_short;
            if !ctx.config.leave_request_allowed && !from_parent {
                log::warn!("leave: request from 0x{:04x} refused", header.src);
                return;
            }
            log::info!("leave: requested by 0x{:04x} rejoin={}", header.src, rejoin);
            self.remote_leave(ctx, rejoin, options.contains(LeaveOptions::REMOVE_CHILDREN));
            return;
        }

        // announcement from a device that has left
        let Some(device) = src_ext else {
            return;
        };
        if device == ctx.nib.parent_ext {
            if options.contains(LeaveOptions::REMOVE_CHILDREN) {
                log::info!("leave: parent left with remove-children");
                self.remote_leave(ctx, rejoin, false);
            } else {
                ctx.neighbors.set_relationship(device, Relationship::None);
            }
            return;
        }
        if ctx.neighbors.remove(device).is_some() {
            ctx.notify(NwkNotify::LeaveInd(LeaveInd { device, rejoin }));
        }
    }

    fn remote_leave<M: MacService>(
        &mut self,
        ctx: &mut NwkContext<M>,
        rejoin: bool,
        remove_children: bool,
    ) {
        let job = LeaveJob::Remote {
            rejoin,
            remove_children,
        };
        let already = self.queue.iter().any(|j| matches!(j, LeaveJob::Remote { .. }));
        if already {
            return;
        }
        if self.state == LeaveState::Idle && self.queue.is_empty() {
            if self.queue.post(job).is_err() {
                return;
            }
            if remove_children && self.has_children(ctx) {
                self.enter(ctx, LeaveState::Begin);
            } else {
                self.start_self_leave(ctx, rejoin, remove_children);
            }
        } else if self.queue.post_next(job).is_err() {
            // the job in progress keeps the head until it is confirmed
            log::warn!("leave: busy, indication dropped");
        }
    }

    fn kick<M: MacService>(&mut self, ctx: &mut NwkContext<M>) {
        if self.state == LeaveState::Idle {
            self.enter(ctx, LeaveState::Begin);
        }
    }

    fn enter<M: MacService>(&mut self, ctx: &mut NwkContext<M>, state: LeaveState) {
        log::debug!("leave: {:?} -> {:?}", self.state, state);
        self.state = state;
        ctx.post_task(LEAVE_TASK);
    }

    fn wait(&mut self, state: LeaveState) {
        log::debug!("leave: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn has_children<M: MacService>(&self, ctx: &NwkContext<M>) -> bool {
        ctx.nib.device_type.is_router_capable() && ctx.neighbors.child_count() > 0
    }

    fn start_self_leave<M: MacService>(
        &mut self,
        ctx: &mut NwkContext<M>,
        rejoin: bool,
        remove_children: bool,
    ) {
        let mut options = LeaveOptions::empty();
        options.set(LeaveOptions::REJOIN, rejoin);
        options.set(LeaveOptions::REMOVE_CHILDREN, remove_children);
        self.param = LeaveParam::Child {
            ext_addr: ctx.nib.ext_addr,
            short_addr: BROADCAST_RX_ON_WHEN_IDLE,
            tx_options: options,
        };
        self.enter(ctx, LeaveState::SelfSendCmd);
    }

    /// Next child of a remove-children cascade, or the self leave when done
    fn next_cascade_step<M: MacService>(&mut self, ctx: &mut NwkContext<M>, rejoin: bool) {
        match ctx.neighbors.first_child().copied() {
            Some(child) => {
                self.param = LeaveParam::Child {
                    ext_addr: child.ext_addr,
                    short_addr: child.short_addr,
                    tx_options: LeaveOptions::REQUEST,
                };
                self.enter(ctx, LeaveState::ChildSendCmd);
            }
            None => {
                self.cascade = false;
                self.start_self_leave(ctx, rejoin, true);
            }
        }
    }

    fn head_rejoin(&self) -> bool {
        match self.queue.head() {
            Some(LeaveJob::Local(request)) => request.rejoin,
            Some(LeaveJob::Remote { rejoin, .. }) => *rejoin,
            _ => false,
        }
    }

    fn begin<M: MacService>(&mut self, ctx: &mut NwkContext<M>) {
        let Some(job) = self.queue.head().copied() else {
            self.wait(LeaveState::Idle);
            return;
        };
        self.status = NwkStatus::Success;
        self.leave_child_count = 0;
        self.param = LeaveParam::None;

        let (rejoin, remove_children, device) = match job {
            LeaveJob::Local(request) => (request.rejoin, request.remove_children, request.device),
            LeaveJob::Remote {
                rejoin,
                remove_children,
            } => (rejoin, remove_children, 0),
            LeaveJob::UnknownChild { short_addr } => {
                self.param = LeaveParam::Child {
                    ext_addr: 0,
                    short_addr,
                    tx_options: LeaveOptions::REQUEST | LeaveOptions::REJOIN,
                };
                self.enter(ctx, LeaveState::UnknownChild);
                return;
            }
        };

        if !ctx.nib.joined {
            self.status = NwkStatus::InvalidRequest;
            self.enter(ctx, LeaveState::Confirm);
            return;
        }

        if device == 0 || device == ctx.nib.ext_addr {
            if remove_children && self.has_children(ctx) {
                self.cascade = true;
                self.next_cascade_step(ctx, rejoin);
            } else {
                self.start_self_leave(ctx, rejoin, remove_children);
            }
            return;
        }

        if !ctx.nib.device_type.is_router_capable() {
            self.status = NwkStatus::NotPermitted;
            self.enter(ctx, LeaveState::Confirm);
            return;
        }
        match ctx.neighbors.find_ext(device).copied() {
            Some(child) if child.relationship == Relationship::Child => {
                let mut tx_options = LeaveOptions::REQUEST;
                tx_options.set(LeaveOptions::REJOIN, rejoin);
                tx_options.set(LeaveOptions::REMOVE_CHILDREN, remove_children);
                self.param = LeaveParam::Child {
                    ext_addr: child.ext_addr,
                    short_addr: child.short_addr,
                    tx_options,
                };
                self.enter(ctx, LeaveState::ChildSendCmd);
            }
            _ => {
                self.status = NwkStatus::UnknownDevice;
                self.enter(ctx, LeaveState::Confirm);
            }
        }
    }

    fn send<M: MacService>(&mut self, ctx: &mut NwkContext<M>, with_dst_ext: bool) -> ZbResult<()> {
        let LeaveParam::Child {
            ext_addr,
            short_addr,
            tx_options,
        } = self.param
        else {
            return Err(ZbError::InvalidParameter);
        };
        let seq = ctx.nib.next_seq();
        let mut header = NwkHeader::command(short_addr, ctx.nib.short_addr, 1, seq)
            .with_src_ext(ctx.nib.ext_addr);
        if with_dst_ext {
            header = header.with_dst_ext(ext_addr);
        }
        ctx.send_command(MacUser::Leave, short_addr, &header, &NwkCommand::Leave(tx_options))
    }

    fn finish<M: MacService>(&mut self, ctx: &mut NwkContext<M>) {
        let job = self.queue.remove_head().ok();
        match (job, self.param) {
            (Some(LeaveJob::UnknownChild { short_addr }), _) => {
                log::debug!("leave: unknown child 0x{:04x} done: {:?}", short_addr, self.status);
            }
            (Some(LeaveJob::Local(request)), LeaveParam::Child { ext_addr, .. })
                if ext_addr != ctx.nib.ext_addr =>
            {
                ctx.notify(NwkNotify::LeaveConf(LeaveConf {
                    device: ext_addr,
                    status: self.status,
                    rejoin: request.rejoin,
                    remote: false,
                }));
            }
            (Some(job), LeaveParam::MacReset { .. }) => {
                let (rejoin, remote) = match job {
                    LeaveJob::Local(request) => (request.rejoin, false),
                    LeaveJob::Remote { rejoin, .. } => (rejoin, true),
                    LeaveJob::UnknownChild { .. } => (false, false),
                };
                let device = ctx.nib.ext_addr;
                ctx.nib.leave_network();
                ctx.neighbors.clear();
                log::info!("leave: left network, {} children removed", self.leave_child_count);
                ctx.notify(NwkNotify::LeaveConf(LeaveConf {
                    device,
                    status: self.status,
                    rejoin,
                    remote,
                }));
            }
            (Some(LeaveJob::Local(request)), _) => {
                ctx.notify(NwkNotify::LeaveConf(LeaveConf {
                    device: request.device,
                    status: self.status,
                    rejoin: request.rejoin,
                    remote: false,
                }));
            }
            (Some(LeaveJob::Remote { .. }), _) | (None, _) => {}
        }

        self.param = LeaveParam::None;
        self.cascade = false;
        if self.queue.is_empty() {
            self.wait(LeaveState::Idle);
        } else {
            self.enter(ctx, LeaveState::Begin);
        }
    }
}

impl Default for LeaveReq {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MacService> Component<M> for LeaveReq {
    fn task_handler(&mut self, ctx: &mut NwkContext<M>) {
        match self.state {
            LeaveState::Idle => {
                if !self.queue.is_empty() {
                    self.enter(ctx, LeaveState::Begin);
                }
            }
            LeaveState::Begin => self.begin(ctx),
            LeaveState::SelfSendCmd => {
                self.wait(LeaveState::SelfWaitConfirm);
                if self.send(ctx, false).is_err() {
                    // nothing on air to wait for
                    self.enter(ctx, LeaveState::SelfResetMac);
                }
            }
            LeaveState::SelfResetMac => {
                self.param = LeaveParam::MacReset {
                    set_default_pib: true,
                };
                ctx.request(
                    MacUser::Leave,
                    MacPrimitive::Reset {
                        set_default_pib: true,
                    },
                );
            }
            LeaveState::ChildSendCmd => {
                self.wait(LeaveState::ChildWaitConfirm);
                if self.send(ctx, true).is_err() {
                    self.status = NwkStatus::InvalidParameter;
                    self.enter(ctx, LeaveState::Confirm);
                }
            }
            LeaveState::UnknownChild => {
                self.wait(LeaveState::UnknownChildWaitConfirm);
                if self.send(ctx, false).is_err() {
                    self.status = NwkStatus::InvalidParameter;
                    self.enter(ctx, LeaveState::Confirm);
                }
            }
            LeaveState::Confirm => self.finish(ctx),
            LeaveState::SelfWaitConfirm
            | LeaveState::ChildWaitConfirm
            | LeaveState::UnknownChildWaitConfirm => {}
        }
    }

    fn mac_confirm(&mut self, ctx: &mut NwkContext<M>, confirm: MacConfirm) {
        match self.state {
            LeaveState::SelfWaitConfirm => {
                // the MAC is reset whatever happened to the announcement
                self.enter(ctx, LeaveState::SelfResetMac);
            }
            LeaveState::SelfResetMac => {
                self.status = confirm.status.into();
                self.enter(ctx, LeaveState::Confirm);
            }
            LeaveState::ChildWaitConfirm => {
                let LeaveParam::Child { ext_addr, .. } = self.param else {
                    sys_fatal!(NWK_LEAVE_BAD_STATE)
                };
                if confirm.status.is_success() {
                    self.leave_child_count = self.leave_child_count.saturating_add(1);
                }
                // an unreachable child is dropped as well
                ctx.neighbors.remove(ext_addr);
                if self.cascade {
                    let rejoin = self.head_rejoin();
                    self.next_cascade_step(ctx, rejoin);
                } else {
                    self.status = confirm.status.into();
                    self.enter(ctx, LeaveState::Confirm);
                }
            }
            LeaveState::UnknownChildWaitConfirm => {
                self.status = confirm.status.into();
                self.enter(ctx, LeaveState::Confirm);
            }
            _ => log::warn!("leave: unexpected MAC confirm in {:?}", self.state),
        }
    }

    fn tick(&mut self, _ctx: &mut NwkContext<M>, _elapsed: u32) {}

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.state == LeaveState::Idle
    }
}
