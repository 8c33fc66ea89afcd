//! Join and rejoin
//!
//! One queued NLME-JOIN.request is served at a time. Every state issues a
//! single MAC primitive and waits for its confirmation before moving on.
//!
//! Association:
//! GetElemFromQueue → [NetworkDiscovery] → SetChannel → SetPanId →
//! AssociationWait → SetShortAddress → SetCoordShortAddr → SetCoordExtAddr →
//! [SetBeaconPayload → SetBeaconPayloadLen] → SetRxOnWhenIdle → RxEnable →
//! [SetTransactionTime] → Confirm
//!
//! Rejoin:
//! GetElemFromQueue → [NetworkDiscovery] → SetChannel → SetPanId →
//! SetFirstShortAddress → SetCoordShortAddr → SetCoordExtAddr →
//! SetExtAddress → SetRxOnWhenIdle → RxEnable → PktPrepareAndSend →
//! GetResponseWaitTime → (WaitingMacLatency →) RejoinResponseWaiting →
//! [SetShortAddressOnly] → [SetBeaconPayload → SetBeaconPayloadLen →
//! SetTransactionTime] → Confirm
//!
//! Bracketed steps are router-only or conditional. A failed step, a refused
//! association or rejoin, or a missing response costs one attempt; the
//! candidate parent is marked as tried and the next one is used.

use zb_core::codes::NWK_JOIN_BAD_STATE;
use zb_core::{
    sys_fatal, AppTimer, MacStatus, Millis, NwkStatus, RequestQueue, ShortAddr,
    TimerMode, ZbError, ZbResult, NO_SHORT_ADDR,
};

use crate::context::{Component, NwkContext, JOIN_TASK};
use crate::frame::{NwkCommand, NwkHeader, BEACON_PAYLOAD_LEN};
use crate::mac::{
    MacAttribute, MacAttributeId, MacConfirm, MacConfirmKind, MacPrimitive, MacService, MacUser,
    ScanType,
};
use crate::neighbor::{Neighbor, Relationship};
use crate::notify::{JoinConf, JoinMethod, NlmeJoinReq, NwkNotify};

pub const JOIN_QUEUE_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum JoinState {
    Idle = 0xDA,
    GetElemFromQueue = 0x21,
    Confirm = 0x22,
    AssociationWait = 0x23,
    SetBeaconPayload = 0x24,
    SetBeaconPayloadLen = 0x25,
    SetRxOnWhenIdle = 0x26,
    RxEnable = 0x27,
    PktPrepareAndSend = 0x28,
    SetPanId = 0x29,
    SetChannel = 0x2A,
    GetResponseWaitTime = 0x2B,
    WaitingMacLatency = 0x2C,
    RejoinResponseWaiting = 0x2D,
    SetShortAddress = 0x2E,
    SetCoordShortAddr = 0x2F,
    SetCoordExtAddr = 0x30,
    SetShortAddressOnly = 0x31,
    NetworkDiscovery = 0x32,
    SetFirstShortAddress = 0x33,
    SetTransactionTime = 0x34,
    SetExtAddress = 0x35,
}

/// Join entry points the layer relies on.
pub trait JoinService<M: MacService>: Component<M> {
    fn request(&mut self, ctx: &mut NwkContext<M>, request: NlmeJoinReq) -> ZbResult<()>;

    /// Rejoin response command addressed to this device
    fn rejoin_response_ind(
        &mut self,
        ctx: &mut NwkContext<M>,
        header: &NwkHeader,
        short_addr: ShortAddr,
        status: u8,
    );
}

/// Join component of routers and end devices
#[derive(Debug)]
pub struct JoinReq {
    queue: RequestQueue<NlmeJoinReq, JOIN_QUEUE_LEN>,
    state: JoinState,
    candidate: Option<Neighbor>,
    timer: AppTimer,
    attempts: u8,
    new_short: ShortAddr,
    response_wait: Millis,
    /// MAC primitive awaiting confirmation
    mac_req: Option<MacPrimitive>,
}

impl JoinReq {
    pub const fn new() -> Self {
        Self {
            queue: RequestQueue::new(),
            state: JoinState::Idle,
            candidate: None,
            timer: AppTimer::new(),
            attempts: 0,
            new_short: NO_SHORT_ADDR,
            response_wait: Millis::ZERO,
            mac_req: None,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn pending_requests(&self) -> usize {
        self.queue.len()
    }

    fn head(&self) -> Option<NlmeJoinReq> {
        self.queue.head().copied()
    }

    fn method(&self) -> JoinMethod {
        self.head().map_or(JoinMethod::Association, |r| r.method)
    }

    fn is_router<M: MacService>(ctx: &NwkContext<M>) -> bool {
        ctx.nib.device_type.is_router_capable()
    }

    fn select_candidate<M: MacService>(ctx: &NwkContext<M>, request: &NlmeJoinReq) -> Option<Neighbor> {
        ctx.neighbors.select_parent(
            request.ext_pan_id,
            ctx.nib.device_type,
            request.method == JoinMethod::Association,
            ctx.config.max_depth,
        )
    }

    fn enter<M: MacService>(&mut self, ctx: &mut NwkContext<M>, state: JoinState) {
        log::debug!("join: {:?} -> {:?}", self.state, state);
        self.state = state;
        ctx.post_task(JOIN_TASK);
    }

    fn issue<M: MacService>(&mut self, ctx: &mut NwkContext<M>, primitive: MacPrimitive) {
        self.mac_req = Some(primitive.clone());
        ctx.request(MacUser::Join, primitive);
    }

    fn set<M: MacService>(&mut self, ctx: &mut NwkContext<M>, attribute: MacAttribute) {
        self.issue(ctx, MacPrimitive::Set(attribute));
    }

    fn candidate(&self) -> Neighbor {
        match self.candidate {
            Some(candidate) => candidate,
            None => sys_fatal!(NWK_JOIN_BAD_STATE),
        }
    }

    /// One attempt failed: retry with another parent or give up
    fn fail_attempt<M: MacService>(&mut self, ctx: &mut NwkContext<M>, status: NwkStatus) {
        self.timer.stop();
        self.mac_req = None;
        if let Some(candidate) = self.candidate.take() {
            ctx.neighbors.mark_tried(candidate.ext_addr);
        }
        self.attempts = self.attempts.saturating_add(1);
        log::debug!(
            "join: attempt {}/{} failed: {:?}",
            self.attempts,
            ctx.config.max_join_attempts,
            status
        );
        let Some(request) = self.head() else {
            self.state = JoinState::Idle;
            return;
        };
        if self.attempts >= ctx.config.max_join_attempts {
            self.finish(ctx, status);
            return;
        }
        if let Some(candidate) = Self::select_candidate(ctx, &request) {
            self.candidate = Some(candidate);
            self.enter(ctx, JoinState::SetChannel);
        } else if request.scan_channels != 0 {
            self.enter(ctx, JoinState::NetworkDiscovery);
        } else {
            self.finish(ctx, status);
        }
    }

    /// Confirm the head request upward and move to the next one
    fn finish<M: MacService>(&mut self, ctx: &mut NwkContext<M>, status: NwkStatus) {
        self.timer.stop();
        self.mac_req = None;
        let Ok(request) = self.queue.remove_head() else {
            self.state = JoinState::Idle;
            return;
        };
        let confirm = match (status.is_success(), self.candidate) {
            (true, Some(parent)) => JoinConf {
                status,
                method: request.method,
                short_addr: self.new_short,
                pan_id: parent.pan_id,
                ext_pan_id: parent.ext_pan_id,
                channel: parent.channel,
            },
            _ => JoinConf {
                status,
                method: request.method,
                short_addr: NO_SHORT_ADDR,
                pan_id: ctx.nib.pan_id,
                ext_pan_id: request.ext_pan_id,
                channel: ctx.nib.channel,
            },
        };
        log::info!("join: confirm {:?} short=0x{:04x}", confirm.status, confirm.short_addr);
        ctx.notify(NwkNotify::JoinConf(confirm));

        self.candidate = None;
        self.attempts = 0;
        self.new_short = NO_SHORT_ADDR;
        if self.queue.is_empty() {
            self.state = JoinState::Idle;
        } else {
            self.enter(ctx, JoinState::GetElemFromQueue);
        }
    }

    fn commit<M: MacService>(&mut self, ctx: &mut NwkContext<M>) {
        let parent = self.candidate();
        let nib = &mut ctx.nib;
        nib.short_addr = self.new_short;
        nib.pan_id = parent.pan_id;
        nib.ext_pan_id = parent.ext_pan_id;
        nib.channel = parent.channel;
        nib.depth = parent.depth.saturating_add(1);
        nib.update_id = parent.update_id;
        nib.parent_short = parent.short_addr;
        nib.parent_ext = parent.ext_addr;
        nib.joined = true;
        if let Some(previous) = ctx.neighbors.parent().map(|n| n.ext_addr) {
            ctx.neighbors.set_relationship(previous, Relationship::None);
        }
        ctx.neighbors.set_relationship(parent.ext_addr, Relationship::Parent);
    }

    fn after_coord_ext(&self, ctx: &NwkContext<impl MacService>) -> JoinState {
        match self.method() {
            JoinMethod::Rejoin => JoinState::SetExtAddress,
            JoinMethod::Association if Self::is_router(ctx) => JoinState::SetBeaconPayload,
            JoinMethod::Association => JoinState::SetRxOnWhenIdle,
        }
    }

    fn after_rejoin_response(&self, ctx: &NwkContext<impl MacService>) -> JoinState {
        if Self::is_router(ctx) {
            JoinState::SetBeaconPayload
        } else {
            JoinState::Confirm
        }
    }
}

impl Default for JoinReq {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MacService> Component<M> for JoinReq {
    fn task_handler(&mut self, ctx: &mut NwkContext<M>) {
        match self.state {
            JoinState::Idle => {
                if !self.queue.is_empty() {
                    self.enter(ctx, JoinState::GetElemFromQueue);
                }
            }
            JoinState::GetElemFromQueue => {
                let Some(request) = self.head() else {
                    self.state = JoinState::Idle;
                    return;
                };
                self.attempts = 0;
                self.new_short = NO_SHORT_ADDR;
                ctx.neighbors.clear_tried();
                if let Some(candidate) = Self::select_candidate(ctx, &request) {
                    self.candidate = Some(candidate);
                    self.enter(ctx, JoinState::SetChannel);
                } else if request.scan_channels != 0 {
                    self.enter(ctx, JoinState::NetworkDiscovery);
                } else {
                    self.finish(ctx, NwkStatus::NoNetworks);
                }
            }
            JoinState::NetworkDiscovery => {
                if let Some(request) = self.head() {
                    self.issue(
                        ctx,
                        MacPrimitive::Scan {
                            scan_type: ScanType::Active,
                            channels: request.scan_channels,
                            duration: request.scan_duration,
                        },
                    );
                }
            }
            JoinState::SetChannel => {
                let channel = self.candidate().channel;
                self.set(ctx, MacAttribute::Channel(channel));
            }
            JoinState::SetPanId => {
                let pan_id = self.candidate().pan_id;
                self.set(ctx, MacAttribute::PanId(pan_id));
            }
            JoinState::AssociationWait => {
                let parent = self.candidate();
                let capability = ctx.nib.capability();
                self.issue(
                    ctx,
                    MacPrimitive::Associate {
                        channel: parent.channel,
                        pan_id: parent.pan_id,
                        coord_short: parent.short_addr,
                        capability,
                    },
                );
            }
            JoinState::SetShortAddress | JoinState::SetShortAddressOnly => {
                let short = self.new_short;
                self.set(ctx, MacAttribute::ShortAddress(short));
            }
            JoinState::SetFirstShortAddress => {
                let short = ctx.nib.short_addr;
                self.new_short = short;
                self.set(ctx, MacAttribute::ShortAddress(short));
            }
            JoinState::SetCoordShortAddr => {
                let short = self.candidate().short_addr;
                self.set(ctx, MacAttribute::CoordShortAddress(short));
            }
            JoinState::SetCoordExtAddr => {
                let ext = self.candidate().ext_addr;
                self.set(ctx, MacAttribute::CoordExtAddress(ext));
            }
            JoinState::SetExtAddress => {
                let ext = ctx.nib.ext_addr;
                self.set(ctx, MacAttribute::ExtAddress(ext));
            }
            JoinState::SetBeaconPayload => {
                let parent = self.candidate();
                let mut payload = ctx.nib.beacon_payload();
                payload.ext_pan_id = parent.ext_pan_id;
                payload.device_depth = parent.depth.saturating_add(1);
                payload.update_id = parent.update_id;
                let bytes = heapless::Vec::from_slice(&payload.encode()).unwrap_or_default();
                self.set(ctx, MacAttribute::BeaconPayload(bytes));
            }
            JoinState::SetBeaconPayloadLen => {
                self.set(ctx, MacAttribute::BeaconPayloadLength(BEACON_PAYLOAD_LEN as u8));
            }
            JoinState::SetRxOnWhenIdle => {
                let on = ctx.nib.rx_on_when_idle;
                self.set(ctx, MacAttribute::RxOnWhenIdle(on));
            }
            JoinState::RxEnable => {
                let on = ctx.nib.rx_on_when_idle;
                self.issue(ctx, MacPrimitive::RxEnable { on });
            }
            JoinState::SetTransactionTime => {
                let time = ctx.config.transaction_persistence_time;
                self.set(ctx, MacAttribute::TransactionPersistenceTime(time));
            }
            JoinState::PktPrepareAndSend => {
                let parent = self.candidate();
                let seq = ctx.nib.next_seq();
                let header = NwkHeader::command(parent.short_addr, ctx.nib.short_addr, 1, seq)
                    .with_dst_ext(parent.ext_addr)
                    .with_src_ext(ctx.nib.ext_addr);
                let command = NwkCommand::RejoinRequest(ctx.nib.capability());
                match header.encode(&command.encode()) {
                    Ok(frame) => self.issue(
                        ctx,
                        MacPrimitive::Data {
                            dst: parent.short_addr,
                            frame,
                            ack: true,
                        },
                    ),
                    Err(_) => self.fail_attempt(ctx, NwkStatus::InvalidParameter),
                }
            }
            JoinState::GetResponseWaitTime => {
                self.issue(ctx, MacPrimitive::Get(MacAttributeId::ResponseWaitTime));
            }
            JoinState::WaitingMacLatency | JoinState::RejoinResponseWaiting => {}
            JoinState::Confirm => {
                self.commit(ctx);
                self.finish(ctx, NwkStatus::Success);
            }
        }
    }

    fn mac_confirm(&mut self, ctx: &mut NwkContext<M>, confirm: MacConfirm) {
        let answered = self
            .mac_req
            .as_ref()
            .is_some_and(|pending| pending.answered_by(&confirm.kind));
        if !answered {
            // e.g. a poll confirm arriving after the rejoin response
            log::warn!("join: stray {:?} confirm in {:?}", confirm.kind, self.state);
            return;
        }
        self.mac_req = None;

        let scan_done = self.state == JoinState::NetworkDiscovery
            && matches!(confirm.status, MacStatus::Success | MacStatus::NoBeacon);
        // nothing pending at the parent yet; the response timer keeps running
        let empty_poll = self.state == JoinState::RejoinResponseWaiting
            && confirm.status == MacStatus::NoData;
        if !confirm.status.is_success() && !scan_done && !empty_poll {
            self.fail_attempt(ctx, confirm.status.into());
            return;
        }

        let next = match self.state {
            JoinState::NetworkDiscovery => {
                let selected = self.head().and_then(|r| Self::select_candidate(ctx, &r));
                match selected {
                    Some(candidate) => {
                        self.candidate = Some(candidate);
                        JoinState::SetChannel
                    }
                    None => {
                        self.fail_attempt(ctx, NwkStatus::NoNetworks);
                        return;
                    }
                }
            }
            JoinState::SetChannel => JoinState::SetPanId,
            JoinState::SetPanId => match self.method() {
                JoinMethod::Association => JoinState::AssociationWait,
                JoinMethod::Rejoin => JoinState::SetFirstShortAddress,
            },
            JoinState::AssociationWait => {
                if let MacConfirmKind::Associate { short_addr } = confirm.kind {
                    self.new_short = short_addr;
                }
                JoinState::SetShortAddress
            }
            JoinState::SetShortAddress | JoinState::SetFirstShortAddress => {
                JoinState::SetCoordShortAddr
            }
            JoinState::SetCoordShortAddr => JoinState::SetCoordExtAddr,
            JoinState::SetCoordExtAddr => self.after_coord_ext(ctx),
            JoinState::SetExtAddress => JoinState::SetRxOnWhenIdle,
            JoinState::SetBeaconPayload => JoinState::SetBeaconPayloadLen,
            JoinState::SetBeaconPayloadLen => match self.method() {
                JoinMethod::Association => JoinState::SetRxOnWhenIdle,
                JoinMethod::Rejoin => JoinState::SetTransactionTime,
            },
            JoinState::SetRxOnWhenIdle => JoinState::RxEnable,
            JoinState::RxEnable => match self.method() {
                JoinMethod::Rejoin => JoinState::PktPrepareAndSend,
                JoinMethod::Association if Self::is_router(ctx) => JoinState::SetTransactionTime,
                JoinMethod::Association => JoinState::Confirm,
            },
            JoinState::PktPrepareAndSend => JoinState::GetResponseWaitTime,
            JoinState::GetResponseWaitTime => {
                let wait = match confirm.kind {
                    MacConfirmKind::Get(ms) => Millis::new(ms),
                    _ => Millis::ZERO,
                };
                self.response_wait = wait;
                if ctx.nib.rx_on_when_idle {
                    self.timer.start(wait, TimerMode::OneShot);
                    self.state = JoinState::RejoinResponseWaiting;
                } else {
                    // response wait restarts once the poll goes out
                    self.timer.start(ctx.config.mac_latency, TimerMode::OneShot);
                    self.state = JoinState::WaitingMacLatency;
                }
                log::debug!("join: waiting {} for rejoin response", wait);
                return;
            }
            JoinState::RejoinResponseWaiting => {
                // poll delivered; the response frame arrives as an indication
                return;
            }
            JoinState::SetShortAddressOnly => self.after_rejoin_response(ctx),
            JoinState::SetTransactionTime => JoinState::Confirm,
            JoinState::Idle
            | JoinState::GetElemFromQueue
            | JoinState::Confirm
            | JoinState::WaitingMacLatency => sys_fatal!(NWK_JOIN_BAD_STATE),
        };
        self.enter(ctx, next);
    }

    fn tick(&mut self, ctx: &mut NwkContext<M>, elapsed: u32) {
        if !self.timer.advance(elapsed) {
            return;
        }
        match self.state {
            JoinState::WaitingMacLatency => {
                let parent = self.candidate();
                self.state = JoinState::RejoinResponseWaiting;
                self.timer.start(self.response_wait, TimerMode::OneShot);
                self.issue(
                    ctx,
                    MacPrimitive::Poll {
                        coord_short: parent.short_addr,
                    },
                );
            }
            JoinState::RejoinResponseWaiting => {
                log::debug!("join: no rejoin response");
                self.fail_attempt(ctx, NwkStatus::Mac(MacStatus::NoData));
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.state == JoinState::Idle
    }
}

impl<M: MacService> JoinService<M> for JoinReq {
    fn request(&mut self, ctx: &mut NwkContext<M>, request: NlmeJoinReq) -> ZbResult<()> {
        if ctx.nib.device_type == zb_core::DeviceType::Coordinator {
            return Err(ZbError::NotPermitted);
        }
        self.queue.post(request)?;
        if self.state == JoinState::Idle {
            self.enter(ctx, JoinState::GetElemFromQueue);
        }
        Ok(())
    }

    fn rejoin_response_ind(
        &mut self,
        ctx: &mut NwkContext<M>,
        header: &NwkHeader,
        short_addr: ShortAddr,
        status: u8,
    ) {
        let from_candidate = self
            .candidate
            .is_some_and(|c| c.short_addr == header.src || Some(c.ext_addr) == header.src_ext);
        if self.state != JoinState::RejoinResponseWaiting || !from_candidate {
            log::warn!("join: unexpected rejoin response from 0x{:04x}", header.src);
            return;
        }
        self.timer.stop();
        self.mac_req = None;
        if status != 0 {
            let status = MacStatus::from_code(status)
                .map_or(NwkStatus::NotPermitted, NwkStatus::from);
            self.fail_attempt(ctx, status);
            return;
        }
        let next = if short_addr != ctx.nib.short_addr {
            JoinState::SetShortAddressOnly
        } else {
            self.after_rejoin_response(ctx)
        };
        self.new_short = short_addr;
        self.enter(ctx, next);
    }
}

/// Join stand-in for builds without a joining role
#[derive(Debug, Default)]
pub struct JoinDisabled;

impl<M: MacService> Component<M> for JoinDisabled {
    fn task_handler(&mut self, _ctx: &mut NwkContext<M>) {}
    fn mac_confirm(&mut self, _ctx: &mut NwkContext<M>, _confirm: MacConfirm) {}
    fn tick(&mut self, _ctx: &mut NwkContext<M>, _elapsed: u32) {}
    fn reset(&mut self) {}
    fn is_idle(&self) -> bool {
        true
    }
}

impl<M: MacService> JoinService<M> for JoinDisabled {
    fn request(&mut self, _ctx: &mut NwkContext<M>, _request: NlmeJoinReq) -> ZbResult<()> {
        Err(ZbError::NotPermitted)
    }

    fn rejoin_response_ind(
        &mut self,
        _ctx: &mut NwkContext<M>,
        _header: &NwkHeader,
        _short_addr: ShortAddr,
        _status: u8,
    ) {
    }
}
