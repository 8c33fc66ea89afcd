//! State shared by the network layer components
//!
//! Components are separate objects owned by the layer. Each receives the
//! context explicitly when it runs, which is how it reaches the MAC, the
//! NIB, the neighbor table, the task set and the upward notification queue.

use heapless::Deque;
use zb_core::{ShortAddr, TaskSet, ZbResult};

use crate::config::NwkConfig;
use crate::frame::{NwkCommand, NwkHeader};
use crate::mac::{MacConfirm, MacPrimitive, MacService, MacUser};
use crate::neighbor::NeighborTable;
use crate::nib::Nib;
use crate::notify::NwkNotify;

/// Task ids, in priority order
pub const JOIN_TASK: u8 = 0;
pub const LEAVE_TASK: u8 = 1;
pub const REPORT_TASK: u8 = 2;

pub const NOTIFY_QUEUE_LEN: usize = 8;

pub struct NwkContext<M: MacService> {
    pub mac: M,
    pub config: NwkConfig,
    pub nib: Nib,
    pub neighbors: NeighborTable,
    pub(crate) tasks: TaskSet,
    notifications: Deque<NwkNotify, NOTIFY_QUEUE_LEN>,
}

impl<M: MacService> NwkContext<M> {
    pub fn new(mac: M, config: NwkConfig, nib: Nib) -> Self {
        Self {
            mac,
            config,
            nib,
            neighbors: NeighborTable::new(),
            tasks: TaskSet::new(),
            notifications: Deque::new(),
        }
    }

    pub fn post_task(&mut self, id: u8) {
        self.tasks.post(id);
    }

    /// Queue a notification for the upper layer
    pub fn notify(&mut self, notification: NwkNotify) {
        if self.notifications.is_full() {
            log::warn!("nwk: notification queue full, dropping oldest");
            self.notifications.pop_front();
        }
        let _ = self.notifications.push_back(notification);
    }

    pub fn take_notification(&mut self) -> Option<NwkNotify> {
        self.notifications.pop_front()
    }

    pub fn request(&mut self, user: MacUser, primitive: MacPrimitive) {
        log::trace!("nwk: {:?} -> {:?}", user, primitive);
        self.mac.request(user, primitive);
    }

    /// Encode a command frame and hand it to the MAC
    pub fn send_command(
        &mut self,
        user: MacUser,
        mac_dst: ShortAddr,
        header: &NwkHeader,
        command: &NwkCommand,
    ) -> ZbResult<()> {
        let frame = header.encode(&command.encode())?;
        self.request(
            user,
            MacPrimitive::Data {
                dst: mac_dst,
                frame,
                ack: !zb_core::is_broadcast(mac_dst),
            },
        );
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.reset();
        self.notifications.clear();
    }
}

/// Behaviour every network layer component provides to the layer.
pub trait Component<M: MacService> {
    /// Run one step of the component state machine
    fn task_handler(&mut self, ctx: &mut NwkContext<M>);

    /// Confirmation of a MAC primitive this component issued
    fn mac_confirm(&mut self, ctx: &mut NwkContext<M>, confirm: MacConfirm);

    /// Advance component timers by `elapsed` milliseconds
    fn tick(&mut self, ctx: &mut NwkContext<M>, elapsed: u32);

    /// Force the component back to Idle and drop queued requests
    fn reset(&mut self);

    fn is_idle(&self) -> bool;
}
