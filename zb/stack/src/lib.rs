#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # ZigBee Stack
//!
//! Cooperative dispatcher over the cipher service, the network layer, the
//! APS layer and the ZDO. Each call to [`Stack::dispatch_once`] runs the
//! highest priority piece of pending work:
//!
//! 1. a queued cipher request
//! 2. a posted NWK component task
//! 3. a posted APS task
//! 4. ZDO routing: APS frames down to the network layer, NWK and APS
//!    notifications up
//!
//! [`Stack::run_until_idle`] first feeds the milliseconds accumulated by
//! [`tick_isr`] to the layer timers, then dispatches until nothing is left
//! and finally calls the idle callback.

pub mod config;
pub mod zdo;

pub use config::*;
pub use zdo::*;

use heapless::Deque;
use zb_aps::{Aps, ApsCommandInd, ApsFrame, ApsNotify, TransportKeyReq};
use zb_aps::{FC_FRAME_TYPE_COMMAND, FC_FRAME_TYPE_MASK};
use zb_core::{TickAccumulator, ZbResult};
use zb_nwk::{BeaconNotify, DataInd, MacConfirm, MacService, MacUser, NlmeJoinReq, Nwk, NwkNotify};
use zb_security::{CipherConfirm, CipherRequest, CipherService, SecurityError};

/// Milliseconds elapsed since the dispatcher last ran
static TICKS: TickAccumulator = TickAccumulator::new();

/// Record elapsed time from the tick interrupt
pub fn tick_isr(ms: u32) {
    TICKS.add(ms);
}

pub const NOTIFY_QUEUE_LEN: usize = 16;

/// Everything the stack reports to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackNotify {
    Nwk(NwkNotify),
    Aps(ApsNotify),
    Zdo(ZdoNotify),
    Cipher(CipherConfirm),
}

pub struct Stack<M: MacService> {
    config: StackConfig,
    ticks: &'static TickAccumulator,
    cipher: CipherService,
    nwk: Nwk<M>,
    aps: Aps,
    zdo: Zdo,
    data_handle: u8,
    notifications: Deque<StackNotify, NOTIFY_QUEUE_LEN>,
}

impl<M: MacService> Stack<M> {
    pub fn new(mac: M, config: StackConfig) -> Self {
        Self::with_tick_source(mac, config, &TICKS)
    }

    /// Stack fed by its own tick accumulator instead of [`tick_isr`]
    pub fn with_tick_source(mac: M, config: StackConfig, ticks: &'static TickAccumulator) -> Self {
        log::info!("{}: {:016x}", config.name, config.ext_addr);
        Self {
            nwk: Nwk::new(mac, config.nwk.clone(), config.ext_addr),
            aps: Aps::new(config.aps.clone(), config.ext_addr),
            config,
            ticks,
            cipher: CipherService::new(),
            zdo: Zdo::new(),
            data_handle: 0,
            notifications: Deque::new(),
        }
    }

    /// Reset and start the APS layer
    pub fn start(&mut self) -> ZbResult<()> {
        self.aps.control_req(zb_aps::ApsControlReq::Reset)?;
        self.aps.control_req(zb_aps::ApsControlReq::Start)
    }

    pub fn join_req(&mut self, request: NlmeJoinReq) -> ZbResult<()> {
        self.nwk.join_req(request)
    }

    pub fn leave_network_req(&mut self, request: ZdoLeaveReq) -> ZbResult<()> {
        self.zdo.leave_network_req(&mut self.nwk, request)
    }

    pub fn transport_key_req(&mut self, request: &TransportKeyReq) -> ZbResult<()> {
        self.aps.transport_key_req(&mut self.cipher, request)
    }

    /// Queue a block cipher request; completes as [`StackNotify::Cipher`]
    pub fn cipher_req(&mut self, request: CipherRequest) -> nb::Result<(), SecurityError> {
        self.cipher.request(request)
    }

    pub fn mac_confirm(&mut self, user: MacUser, confirm: MacConfirm) {
        self.nwk.mac_confirm(user, confirm);
    }

    pub fn mac_data_ind(&mut self, frame: &[u8], lqi: u8) {
        self.nwk.mac_data_ind(frame, lqi);
    }

    pub fn beacon_notify(&mut self, beacon: &BeaconNotify) {
        self.nwk.beacon_notify(beacon);
    }

    /// Run the highest priority pending work.
    ///
    /// Returns `false` when there was nothing to do.
    pub fn dispatch_once(&mut self) -> bool {
        if let Some(confirm) = self.cipher.task_handler() {
            self.notify(StackNotify::Cipher(confirm));
            return true;
        }
        if self.nwk.task_handler() {
            return true;
        }
        if self.aps.task_handler() {
            return true;
        }
        self.route()
    }

    pub fn run_until_idle(&mut self) {
        let elapsed = self.ticks.take();
        if elapsed > 0 {
            self.nwk.tick(elapsed);
        }
        while self.dispatch_once() {}
        if let Some(idle_cb) = self.config.idle_callback {
            idle_cb();
        }
    }

    /// Dispatch forever, sleeping between passes
    pub fn run(&mut self) -> ! {
        loop {
            self.run_until_idle();
            if self.config.idle_callback.is_none() {
                Self::on_idle();
            }
        }
    }

    fn on_idle() {
        #[cfg(target_arch = "arm")]
        {
            // Wait for interrupt on ARM
            cortex_m::asm::wfi();
        }
    }

    fn route(&mut self) -> bool {
        let mut worked = false;
        while let Some(request) = self.aps.take_outgoing() {
            worked = true;
            let handle = self.data_handle;
            self.data_handle = handle.wrapping_add(1);
            if let Err(err) = self.nwk.data_req(request.dst, &request.frame, handle) {
                log::warn!("stack: APS frame to {:04x} dropped: {}", request.dst, err);
            }
        }
        while let Some(notification) = self.nwk.take_notification() {
            worked = true;
            self.nwk_notify(notification);
        }
        while let Some(notification) = self.aps.take_notification() {
            worked = true;
            self.notify(StackNotify::Aps(notification));
            if let ApsNotify::ControlConf { request, .. } = notification {
                if let Some(zdo) = self.zdo.aps_control_conf(request) {
                    self.notify(StackNotify::Zdo(zdo));
                }
            }
        }
        worked
    }

    fn nwk_notify(&mut self, notification: NwkNotify) {
        match notification {
            NwkNotify::DataInd(ind) if is_aps_command(&ind) => self.aps_command_ind(&ind),
            NwkNotify::LeaveConf(conf) => {
                let own_ext = self.config.ext_addr;
                self.notify(StackNotify::Nwk(NwkNotify::LeaveConf(conf)));
                if let Some(zdo) = self.zdo.leave_conf(&mut self.aps, &conf, own_ext) {
                    self.notify(StackNotify::Zdo(zdo));
                }
            }
            other => self.notify(StackNotify::Nwk(other)),
        }
    }

    fn aps_command_ind(&mut self, ind: &DataInd) {
        let Ok(frame) = ApsFrame::from_slice(&ind.payload) else {
            log::warn!("stack: APS command from {:04x} too long", ind.src);
            return;
        };
        let mut command = ApsCommandInd::new(ind.src, ind.src_ext, frame);
        let neighbors = self.nwk.neighbors();
        let released = self.aps.command_ind(&mut self.cipher, &mut command, |ext| {
            neighbors.find_ext(ext).map(|n| n.short_addr)
        });
        if !released {
            log::trace!("stack: command from {:04x} forwarded", ind.src);
        }
    }

    fn notify(&mut self, notification: StackNotify) {
        if self.notifications.is_full() {
            log::warn!("stack: notification queue full, dropping oldest");
            self.notifications.pop_front();
        }
        let _ = self.notifications.push_back(notification);
    }

    pub fn take_notification(&mut self) -> Option<StackNotify> {
        self.notifications.pop_front()
    }

    /// Return every layer to its initial state
    pub fn reset(&mut self) {
        self.cipher.reset();
        self.nwk.reset();
        self.aps.reset();
        self.zdo.reset();
        self.notifications.clear();
    }

    pub fn is_idle(&self) -> bool {
        !self.cipher.is_pending() && self.nwk.is_idle() && self.aps.is_idle()
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn nwk(&self) -> &Nwk<M> {
        &self.nwk
    }

    pub fn nwk_mut(&mut self) -> &mut Nwk<M> {
        &mut self.nwk
    }

    pub fn aps(&self) -> &Aps {
        &self.aps
    }

    pub fn aps_mut(&mut self) -> &mut Aps {
        &mut self.aps
    }

    pub fn zdo(&self) -> &Zdo {
        &self.zdo
    }
}

fn is_aps_command(ind: &DataInd) -> bool {
    ind.payload
        .first()
        .map_or(false, |fc| fc & FC_FRAME_TYPE_MASK == FC_FRAME_TYPE_COMMAND)
}
