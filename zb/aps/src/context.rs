//! State shared by the APS components

use heapless::Deque;
use zb_core::{ExtAddr, ShortAddr, TaskSet, ZbError, ZbResult};

use crate::config::ApsConfig;
use crate::frame::ApsFrame;
use crate::key_storage::KeyStorage;
use crate::notify::{ApsDataReq, ApsNotify};
use crate::state::ApsControl;

/// Task ids, in priority order
pub const CONTROL_TASK: u8 = 0;

pub const OUTGOING_QUEUE_LEN: usize = 4;
pub const NOTIFY_QUEUE_LEN: usize = 8;

pub struct ApsContext {
    pub control: ApsControl,
    pub keys: KeyStorage,
    pub config: ApsConfig,
    pub ext_addr: ExtAddr,
    pub(crate) tasks: TaskSet,
    counter: u8,
    outgoing: Deque<ApsDataReq, OUTGOING_QUEUE_LEN>,
    notifications: Deque<ApsNotify, NOTIFY_QUEUE_LEN>,
}

impl ApsContext {
    pub fn new(config: ApsConfig, ext_addr: ExtAddr) -> Self {
        let mut keys = KeyStorage::new();
        keys.set_tc_link_key(config.tc_link_key);
        Self {
            control: ApsControl::new(),
            keys,
            config,
            ext_addr,
            tasks: TaskSet::new(),
            counter: 0,
            outgoing: Deque::new(),
            notifications: Deque::new(),
        }
    }

    pub fn post_task(&mut self, id: u8) {
        self.tasks.post(id);
    }

    /// APS counter for the next frame
    pub fn next_counter(&mut self) -> u8 {
        let counter = self.counter;
        self.counter = counter.wrapping_add(1);
        counter
    }

    pub fn can_send(&self) -> bool {
        !self.outgoing.is_full()
    }

    /// Queue a frame for the network layer
    pub fn send(&mut self, dst: ShortAddr, frame: ApsFrame) -> ZbResult<()> {
        log::trace!("aps: {} octets -> {:04x}", frame.len(), dst);
        self.outgoing
            .push_back(ApsDataReq { dst, frame })
            .map_err(|_| ZbError::QueueFull)
    }

    pub fn take_outgoing(&mut self) -> Option<ApsDataReq> {
        self.outgoing.pop_front()
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Queue a notification for the upper layer
    pub fn notify(&mut self, notification: ApsNotify) {
        if self.notifications.is_full() {
            log::warn!("aps: notification queue full, dropping oldest");
            self.notifications.pop_front();
        }
        let _ = self.notifications.push_back(notification);
    }

    pub fn take_notification(&mut self) -> Option<ApsNotify> {
        self.notifications.pop_front()
    }

    /// Drop posted tasks and frames not yet taken by the network layer
    pub(crate) fn clear(&mut self) {
        self.tasks.reset();
        self.outgoing.clear();
    }
}
