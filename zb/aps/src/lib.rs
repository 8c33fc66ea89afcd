#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # ZigBee Application Support Sub-layer
//!
//! The APS state machine and network key transport.
//!
//! Every APS component runs only while the current [`ApsState`] grants it
//! permission; [`Aps::check_state`] is the single gate. Control requests
//! move the layer through Reset, Start and Stop, and are answered with
//! [`ApsNotify::ControlConf`].
//!
//! Frames for the network layer are queued and taken with
//! [`Aps::take_outgoing`]. Received APS commands go to
//! [`Aps::command_ind`], whose return value says whether the receive buffer
//! can be released.
//!
//! ## Roles
//!
//! With the `trust-center` feature the layer can send network keys;
//! otherwise requests are confirmed with `NotSupported`.

pub mod config;
pub mod context;
pub mod frame;
pub mod key_storage;
pub mod key_transport;
pub mod notify;
pub mod state;

pub use config::*;
pub use context::ApsContext;
pub use frame::*;
pub use key_storage::*;
pub use key_transport::{TransportKeyCheck, TransportKeyReq, TransportMode};
pub use notify::*;
pub use state::*;


use zb_core::{ExtAddr, ShortAddr, ZbResult};
use zb_security::CipherService;

use context::CONTROL_TASK;
use key_transport::KeyTransport;

#[cfg(feature = "trust-center")]
pub type TransportCheck = key_transport::TrustCenter;
#[cfg(not(feature = "trust-center"))]
pub type TransportCheck = key_transport::TransportKeyDisabled;

/// The APS layer
pub struct Aps {
    ctx: ApsContext,
    transport: KeyTransport<TransportCheck>,
    /// Stop is waiting for the outgoing queue to drain
    stop_pending: bool,
}

impl Aps {
    pub fn new(config: ApsConfig, ext_addr: ExtAddr) -> Self {
        let mut ctx = ApsContext::new(config, ext_addr);
        ctx.control.reset();
        Self {
            ctx,
            transport: KeyTransport::default(),
            stop_pending: false,
        }
    }

    /// Queue a reset, hot reset, start or stop request
    pub fn control_req(&mut self, request: ApsControlReq) -> ZbResult<()> {
        self.ctx.control.request(request)?;
        self.ctx.post_task(CONTROL_TASK);
        Ok(())
    }

    /// Run the highest priority posted task.
    ///
    /// Returns `false` when nothing was posted.
    pub fn task_handler(&mut self) -> bool {
        let Some(id) = self.ctx.tasks.take_next() else {
            return false;
        };
        match id {
            CONTROL_TASK => self.control_task(),
            _ => log::warn!("aps: unknown task {}", id),
        }
        true
    }

    fn control_task(&mut self) {
        let action = self.ctx.control.task_handler();
        self.apply(action);
        self.repost_control();
    }

    fn repost_control(&mut self) {
        // a stop in progress resumes from complete_stop
        let stopping = self.ctx.control.get_state().id() == Some(ApsStateId::Stopping);
        if self.ctx.control.has_pending() && !stopping {
            self.ctx.post_task(CONTROL_TASK);
        }
    }

    fn apply(&mut self, action: ControlAction) {
        match action {
            ControlAction::None => {}
            ControlAction::ResetComponents { clear_keys } => {
                self.ctx.clear();
                self.stop_pending = false;
                if clear_keys {
                    self.clear_keys();
                }
            }
            ControlAction::StopComponents => {
                for component in [
                    ApsComponents::DATA_MANAGER,
                    ApsComponents::BIND_MANAGER,
                    ApsComponents::KEY_ESTABLISHMENT,
                ] {
                    let action = self.ctx.control.complete_stop(component);
                    self.apply(action);
                }
                if self.ctx.has_outgoing() {
                    self.stop_pending = true;
                } else {
                    let action = self.ctx.control.complete_stop(ApsComponents::SECURITY_MANAGER);
                    self.apply(action);
                }
            }
            ControlAction::Confirm { request, status } => {
                self.ctx.notify(ApsNotify::ControlConf { request, status })
            }
        }
    }

    fn clear_keys(&mut self) {
        self.ctx.keys.clear();
        let tc_link_key = self.ctx.config.tc_link_key;
        self.ctx.keys.set_tc_link_key(tc_link_key);
    }

    /// APSME-TRANSPORT-KEY.request
    pub fn transport_key_req(&mut self, cipher: &mut CipherService, request: &TransportKeyReq) -> ZbResult<()> {
        self.transport.request(&mut self.ctx, cipher, request)
    }

    /// APS command frame from the network layer.
    ///
    /// `resolve` maps an extended address to the short address of a
    /// neighbor. Returns `true` when the receive buffer can be released.
    pub fn command_ind<R>(&mut self, cipher: &mut CipherService, ind: &mut ApsCommandInd, resolve: R) -> bool
    where
        R: FnOnce(ExtAddr) -> Option<ShortAddr>,
    {
        self.transport.command_ind(&mut self.ctx, cipher, ind, resolve)
    }

    /// Tunnel command addressed to this router
    pub fn tunnel_ind<R>(&mut self, ind: &mut ApsCommandInd, resolve: R) -> bool
    where
        R: FnOnce(ExtAddr) -> Option<ShortAddr>,
    {
        self.transport.tunnel_ind(&mut self.ctx, ind, resolve)
    }

    /// Unsecured Transport-Key command carrying a network key
    pub fn transport_nwk_key_ind<R>(&mut self, ind: &mut ApsCommandInd, resolve: R) -> bool
    where
        R: FnOnce(ExtAddr) -> Option<ShortAddr>,
    {
        self.transport.transport_nwk_key_ind(&mut self.ctx, ind, resolve)
    }

    /// Next frame for NLDE-DATA.request
    pub fn take_outgoing(&mut self) -> Option<ApsDataReq> {
        let request = self.ctx.take_outgoing();
        if self.stop_pending && !self.ctx.has_outgoing() {
            self.stop_pending = false;
            let action = self.ctx.control.complete_stop(ApsComponents::SECURITY_MANAGER);
            self.apply(action);
            self.repost_control();
        }
        request
    }

    pub fn has_outgoing(&self) -> bool {
        self.ctx.has_outgoing()
    }

    pub fn take_notification(&mut self) -> Option<ApsNotify> {
        self.ctx.take_notification()
    }

    /// `true` when any component of `mask` may run
    pub fn check_state(&self, mask: ApsComponents) -> bool {
        self.ctx.control.check_state(mask)
    }

    pub fn state(&self) -> ApsState {
        self.ctx.control.get_state()
    }

    /// Force the state, bypassing the control manager
    pub fn set_state(&mut self, id: ApsStateId) {
        self.ctx.control.set_state(id);
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.ctx.tasks.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        !self.has_pending_tasks() && !self.ctx.control.has_pending() && !self.has_outgoing()
    }

    /// Back to Initial: queued requests, frames and keys are dropped
    pub fn reset(&mut self) {
        log::info!("aps: reset");
        self.ctx.control.reset();
        self.ctx.clear();
        self.stop_pending = false;
        self.clear_keys();
    }

    pub fn keys(&self) -> &KeyStorage {
        &self.ctx.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeyStorage {
        &mut self.ctx.keys
    }

    pub fn config(&self) -> &ApsConfig {
        &self.ctx.config
    }

    pub fn ext_addr(&self) -> ExtAddr {
        self.ctx.ext_addr
    }
}
