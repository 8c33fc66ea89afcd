//! APS state and control manager
//!
//! The APS state is one 16-bit value: the state identifier in the high
//! byte and the permission mask of the APS components in the low bits.
//! Permissions are never set on their own; entering a state installs the
//! mask that state grants. Protected work checks
//! [`ApsControl::check_state`] before touching shared resources.
//!
//! Control requests (reset, hot reset, start, stop) are queued and served
//! one per task run. Stop waits until the data, security, bind and key
//! establishment managers have each reported [`ApsControl::complete_stop`].

use bitflags::bitflags;
use zb_core::{ApsStatus, RequestQueue, ZbResult};

bitflags! {
    /// APS components guarded by the state
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApsComponents: u16 {
        const CONTROL_MANAGER = 1 << 0;
        const DATA_MANAGER = 1 << 1;
        const SECURITY_MANAGER = 1 << 2;
        const BIND_MANAGER = 1 << 3;
        const AIB_MANAGER = 1 << 4;
        const KEY_ESTABLISHMENT = 1 << 5;
    }
}

impl ApsComponents {
    /// Managers that must report before a stop completes
    pub const STOPPABLE: Self = Self::DATA_MANAGER
        .union(Self::SECURITY_MANAGER)
        .union(Self::BIND_MANAGER)
        .union(Self::KEY_ESTABLISHMENT);
}

/// State identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ApsStateId {
    Initial = 0x100,
    Resetting = 0x200,
    Reset = 0x300,
    Start = 0x400,
    Stopping = 0x500,
    Stop = 0x600,
    HotResetting = 0x700,
}

impl ApsStateId {
    pub const ALL: [ApsStateId; 7] = [
        ApsStateId::Initial,
        ApsStateId::Resetting,
        ApsStateId::Reset,
        ApsStateId::Start,
        ApsStateId::Stopping,
        ApsStateId::Stop,
        ApsStateId::HotResetting,
    ];

    pub const fn from_raw(raw: u16) -> Option<Self> {
        let id = match raw & 0xFF00 {
            0x100 => ApsStateId::Initial,
            0x200 => ApsStateId::Resetting,
            0x300 => ApsStateId::Reset,
            0x400 => ApsStateId::Start,
            0x500 => ApsStateId::Stopping,
            0x600 => ApsStateId::Stop,
            0x700 => ApsStateId::HotResetting,
            _ => return None,
        };
        Some(id)
    }
}

/// Components a state lets run
pub const fn permissions(id: ApsStateId) -> ApsComponents {
    match id {
        ApsStateId::Initial | ApsStateId::Stop => ApsComponents::AIB_MANAGER,
        ApsStateId::Resetting | ApsStateId::Stopping | ApsStateId::HotResetting => {
            ApsComponents::empty()
        }
        ApsStateId::Reset => ApsComponents::AIB_MANAGER
            .union(ApsComponents::KEY_ESTABLISHMENT)
            .union(ApsComponents::DATA_MANAGER),
        ApsStateId::Start => ApsComponents::all(),
    }
}

/// Raw APS state: identifier or'ed with its permission mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApsState(u16);

impl ApsState {
    /// Value before the layer is initialised
    pub const UNINITIALISED: Self = Self(0);

    pub const fn new(id: ApsStateId) -> Self {
        Self(id as u16 | permissions(id).bits())
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// A raw value is valid between Initial and HotResetting inclusive
    pub const fn is_valid(self) -> bool {
        self.0 >= Self::new(ApsStateId::Initial).0 && self.0 <= Self::new(ApsStateId::HotResetting).0
    }

    pub const fn id(self) -> Option<ApsStateId> {
        ApsStateId::from_raw(self.0)
    }

    pub const fn permissions(self) -> ApsComponents {
        ApsComponents::from_bits_truncate(self.0)
    }
}

impl Default for ApsState {
    fn default() -> Self {
        Self::UNINITIALISED
    }
}

/// Control requests accepted by the control manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApsControlReq {
    Reset,
    /// Reset that keeps key material
    HotReset,
    Start,
    Stop,
}

/// Side effect the layer has to carry out for a control step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    None,
    /// Return every component to Idle
    ResetComponents { clear_keys: bool },
    /// Ask the stoppable managers to wind down
    StopComponents,
    /// Request finished
    Confirm { request: ApsControlReq, status: ApsStatus },
}

pub const CONTROL_QUEUE_LEN: usize = 4;

#[derive(Debug)]
pub struct ApsControl {
    state: ApsState,
    queue: RequestQueue<ApsControlReq, CONTROL_QUEUE_LEN>,
    stopped: ApsComponents,
}

impl ApsControl {
    pub const fn new() -> Self {
        Self {
            state: ApsState::UNINITIALISED,
            queue: RequestQueue::new(),
            stopped: ApsComponents::empty(),
        }
    }

    /// Overwrite the state, and with it the permission mask
    pub fn set_state(&mut self, id: ApsStateId) {
        log::debug!("aps: state {:?} -> {:?}", self.state.id(), id);
        self.state = ApsState::new(id);
    }

    pub fn get_state(&self) -> ApsState {
        self.state
    }

    /// `true` when any component of `mask` may run in the current state
    pub fn check_state(&self, mask: ApsComponents) -> bool {
        self.state.permissions().intersects(mask)
    }

    pub fn request(&mut self, request: ApsControlReq) -> ZbResult<()> {
        self.queue.post(request)
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Advance the request at the head of the queue
    pub fn task_handler(&mut self) -> ControlAction {
        let Some(request) = self.queue.head().copied() else {
            return ControlAction::None;
        };
        let current = self.state.id();
        match request {
            ApsControlReq::Reset | ApsControlReq::HotReset => match current {
                Some(ApsStateId::Resetting) | Some(ApsStateId::HotResetting) => {
                    self.set_state(ApsStateId::Reset);
                    self.finish(ApsStatus::Success)
                }
                _ => {
                    let clear_keys = request == ApsControlReq::Reset;
                    self.set_state(if clear_keys {
                        ApsStateId::Resetting
                    } else {
                        ApsStateId::HotResetting
                    });
                    ControlAction::ResetComponents { clear_keys }
                }
            },
            ApsControlReq::Start => match current {
                Some(ApsStateId::Reset) | Some(ApsStateId::Stop) => {
                    self.set_state(ApsStateId::Start);
                    self.finish(ApsStatus::Success)
                }
                _ => self.finish(ApsStatus::IllegalRequest),
            },
            ApsControlReq::Stop => match current {
                Some(ApsStateId::Start) => {
                    self.stopped = ApsComponents::empty();
                    self.set_state(ApsStateId::Stopping);
                    ControlAction::StopComponents
                }
                // waiting for the managers
                Some(ApsStateId::Stopping) => ControlAction::None,
                _ => self.finish(ApsStatus::IllegalRequest),
            },
        }
    }

    /// A manager has finished its pending work after a stop request.
    ///
    /// Returns the stop confirmation once every stoppable manager reported.
    pub fn complete_stop(&mut self, component: ApsComponents) -> ControlAction {
        if self.state.id() != Some(ApsStateId::Stopping) {
            return ControlAction::None;
        }
        self.stopped |= component & ApsComponents::STOPPABLE;
        if !self.stopped.contains(ApsComponents::STOPPABLE) {
            return ControlAction::None;
        }
        self.set_state(ApsStateId::Stop);
        self.finish(ApsStatus::Success)
    }

    fn finish(&mut self, status: ApsStatus) -> ControlAction {
        match self.queue.remove_head() {
            Ok(request) => {
                log::info!("aps: {:?} done: {:?}", request, status);
                ControlAction::Confirm { request, status }
            }
            Err(_) => ControlAction::None,
        }
    }

    /// Drop queued requests and go back to Initial
    pub fn reset(&mut self) {
        self.queue.clear();
        self.stopped = ApsComponents::empty();
        self.set_state(ApsStateId::Initial);
    }
}

impl Default for ApsControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_table() {
        use ApsComponents as C;
        let expected = [
            (ApsStateId::Initial, C::AIB_MANAGER),
            (ApsStateId::Resetting, C::empty()),
            (ApsStateId::Reset, C::AIB_MANAGER | C::KEY_ESTABLISHMENT | C::DATA_MANAGER),
            (ApsStateId::Start, C::all()),
            (ApsStateId::Stopping, C::empty()),
            (ApsStateId::Stop, C::AIB_MANAGER),
            (ApsStateId::HotResetting, C::empty()),
        ];
        for (id, mask) in expected {
            assert_eq!(permissions(id), mask, "{:?}", id);
        }
    }

    #[test]
    fn test_check_state_matches_mask_for_every_state() {
        let mut control = ApsControl::new();
        for id in ApsStateId::ALL {
            control.set_state(id);
            for bit in 0..6 {
                let component = ApsComponents::from_bits_truncate(1 << bit);
                assert_eq!(
                    control.check_state(component),
                    permissions(id).contains(component),
                    "{:?} bit {}",
                    id,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_raw_encoding() {
        assert_eq!(ApsState::new(ApsStateId::Initial).raw(), 0x0110);
        assert_eq!(ApsState::new(ApsStateId::Reset).raw(), 0x0332);
        assert_eq!(ApsState::new(ApsStateId::Start).raw(), 0x043F);
        assert_eq!(ApsState::new(ApsStateId::Stopping).raw(), 0x0500);
        assert!(!ApsState::UNINITIALISED.is_valid());
        assert!(ApsState::new(ApsStateId::HotResetting).is_valid());
        assert_eq!(ApsState::new(ApsStateId::Stop).id(), Some(ApsStateId::Stop));
    }

    #[test]
    fn test_start_only_from_reset_or_stop() {
        let mut control = ApsControl::new();
        control.set_state(ApsStateId::Initial);
        control.request(ApsControlReq::Start).unwrap();
        assert_eq!(
            control.task_handler(),
            ControlAction::Confirm {
                request: ApsControlReq::Start,
                status: ApsStatus::IllegalRequest
            }
        );
        assert_eq!(control.get_state().id(), Some(ApsStateId::Initial));
    }

    #[test]
    fn test_stop_waits_for_every_manager() {
        let mut control = ApsControl::new();
        control.set_state(ApsStateId::Start);
        control.request(ApsControlReq::Stop).unwrap();
        assert_eq!(control.task_handler(), ControlAction::StopComponents);
        assert!(!control.check_state(ApsComponents::all()));

        for component in [
            ApsComponents::DATA_MANAGER,
            ApsComponents::SECURITY_MANAGER,
            ApsComponents::BIND_MANAGER,
        ] {
            assert_eq!(control.complete_stop(component), ControlAction::None);
        }
        // reports from managers outside the stop set do not count
        assert_eq!(control.complete_stop(ApsComponents::AIB_MANAGER), ControlAction::None);
        assert_eq!(
            control.complete_stop(ApsComponents::KEY_ESTABLISHMENT),
            ControlAction::Confirm {
                request: ApsControlReq::Stop,
                status: ApsStatus::Success
            }
        );
        assert_eq!(control.get_state().id(), Some(ApsStateId::Stop));
        assert!(control.check_state(ApsComponents::AIB_MANAGER));
    }

    #[test]
    fn test_reset_takes_two_steps() {
        let mut control = ApsControl::new();
        control.set_state(ApsStateId::Start);
        control.request(ApsControlReq::HotReset).unwrap();
        assert_eq!(
            control.task_handler(),
            ControlAction::ResetComponents { clear_keys: false }
        );
        assert_eq!(control.get_state().id(), Some(ApsStateId::HotResetting));
        assert!(matches!(control.task_handler(), ControlAction::Confirm { .. }));
        assert_eq!(control.get_state().id(), Some(ApsStateId::Reset));
        assert!(!control.has_pending());
    }
}
