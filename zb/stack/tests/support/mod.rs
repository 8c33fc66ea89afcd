//! Host-side MAC stand-in for the stack tests

#![allow(dead_code)]

use zb_core::{DeviceType, ExtAddr, ExtPanId, PanId, ShortAddr, COORDINATOR_ADDR};
use zb_nwk::*;
use zb_stack::*;

pub const EXT_PAN: ExtPanId = 0x00DE_CAF0_0000_0001;
pub const PAN: PanId = 0x2C2C;
pub const CHANNEL: u8 = 20;

/// Records every request; confirmations are fed back by `pump`
#[derive(Debug, Default)]
pub struct FakeMac {
    pub requests: Vec<(MacUser, MacPrimitive)>,
    answered: usize,
}

impl MacService for FakeMac {
    fn request(&mut self, user: MacUser, primitive: MacPrimitive) {
        self.requests.push((user, primitive));
    }
}

impl FakeMac {
    pub fn next_unanswered(&mut self) -> Option<(MacUser, MacPrimitive)> {
        let request = self.requests.get(self.answered).cloned()?;
        self.answered += 1;
        Some(request)
    }

    /// Data frames sent on behalf of the upper layers
    pub fn upper_layer_frames(&self) -> Vec<(ShortAddr, MacFrame)> {
        self.requests
            .iter()
            .filter_map(|(user, primitive)| match (user, primitive) {
                (MacUser::Data(_), MacPrimitive::Data { dst, frame, .. }) => Some((*dst, frame.clone())),
                _ => None,
            })
            .collect()
    }
}

pub fn ok_for(primitive: &MacPrimitive) -> MacConfirm {
    let kind = match primitive {
        MacPrimitive::Reset { .. } => MacConfirmKind::Reset,
        MacPrimitive::Set(_) => MacConfirmKind::Set,
        MacPrimitive::Get(_) => MacConfirmKind::Get(500),
        MacPrimitive::RxEnable { .. } => MacConfirmKind::RxEnable,
        MacPrimitive::Associate { .. } => MacConfirmKind::Associate { short_addr: 0x7777 },
        MacPrimitive::Poll { .. } => MacConfirmKind::Poll,
        MacPrimitive::Scan { .. } => MacConfirmKind::Scan,
        MacPrimitive::Data { .. } => MacConfirmKind::Data,
    };
    MacConfirm::success(kind)
}

/// Dispatch and answer MAC requests until nothing moves
pub fn pump(stack: &mut Stack<FakeMac>) {
    for _ in 0..1000 {
        stack.run_until_idle();
        let Some((user, primitive)) = stack.nwk_mut().mac_mut().next_unanswered() else {
            return;
        };
        stack.mac_confirm(user, ok_for(&primitive));
    }
    panic!("stack did not settle");
}

pub fn notifications(stack: &mut Stack<FakeMac>) -> Vec<StackNotify> {
    std::iter::from_fn(|| stack.take_notification()).collect()
}

pub fn config(ext_addr: ExtAddr, device_type: DeviceType) -> StackConfig {
    StackConfig::builder()
        .ext_addr(ext_addr)
        .device_type(device_type)
        .build()
}

/// Put the network layer on the network below `parent`
pub fn join(stack: &mut Stack<FakeMac>, short_addr: ShortAddr, parent: (ExtAddr, ShortAddr)) {
    let nib = stack.nwk_mut().nib_mut();
    nib.joined = true;
    nib.short_addr = short_addr;
    nib.pan_id = PAN;
    nib.ext_pan_id = EXT_PAN;
    nib.channel = CHANNEL;
    nib.parent_ext = parent.0;
    nib.parent_short = parent.1;
    if short_addr != COORDINATOR_ADDR {
        let mut entry = Neighbor::child(parent.0, parent.1, DeviceType::Router);
        entry.relationship = Relationship::Parent;
        stack.nwk_mut().neighbors_mut().upsert(entry);
    }
}

pub fn add_child(stack: &mut Stack<FakeMac>, ext_addr: ExtAddr, short_addr: ShortAddr) {
    stack
        .nwk_mut()
        .neighbors_mut()
        .upsert(Neighbor::child(ext_addr, short_addr, DeviceType::EndDevice));
}

/// Joined and started stack
pub fn running(ext_addr: ExtAddr, device_type: DeviceType, short_addr: ShortAddr, parent: (ExtAddr, ShortAddr)) -> Stack<FakeMac> {
    let mut stack = Stack::new(FakeMac::default(), config(ext_addr, device_type));
    join(&mut stack, short_addr, parent);
    stack.start().unwrap();
    pump(&mut stack);
    notifications(&mut stack);
    stack
}

pub fn beacon(coord_ext: ExtAddr, coord_short: ShortAddr, ext_pan_id: ExtPanId) -> BeaconNotify {
    BeaconNotify {
        channel: CHANNEL,
        pan_id: PAN,
        coord_short,
        coord_ext,
        lqi: 180,
        permit_join: true,
        payload: BeaconPayload {
            stack_profile: 2,
            protocol_version: 2,
            router_capacity: true,
            device_depth: 1,
            end_device_capacity: true,
            ext_pan_id,
            update_id: 0,
        },
    }
}
