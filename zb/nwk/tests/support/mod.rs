//! Host-side MAC stand-in shared by the network layer tests

#![allow(dead_code)]

use zb_core::{DeviceType, ExtAddr, ExtPanId, PanId, ShortAddr};
use zb_nwk::*;

pub const OWN_EXT: ExtAddr = 0x0011_2233_4455_6677;
pub const COORD_EXT: ExtAddr = 0x00AA_BBCC_DDEE_FF00;
pub const EXT_PAN: ExtPanId = 0xDEAD_BEEF_0000_0001;
pub const PAN: PanId = 0x1AAA;
pub const CHANNEL: u8 = 15;
pub const ASSIGNED_SHORT: ShortAddr = 0x1234;

/// Records every request; confirmations are fed back by the test
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
    /// Oldest request not yet handed back by `next_unanswered`
    pub fn next_unanswered(&mut self) -> Option<(MacUser, MacPrimitive)> {
        let request = self.requests.get(self.answered).cloned()?;
        self.answered += 1;
        Some(request)
    }

    pub fn skip_all(&mut self) {
        self.answered = self.requests.len();
    }

    pub fn data_frames(&self, user: MacUser) -> Vec<(ShortAddr, MacFrame)> {
        self.requests
            .iter()
            .filter(|(u, _)| *u == user)
            .filter_map(|(_, p)| match p {
                MacPrimitive::Data { dst, frame, .. } => Some((*dst, frame.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&MacPrimitive) -> bool) -> usize {
        self.requests.iter().filter(|(_, p)| pred(p)).count()
    }
}

/// Successful confirmation matching the primitive
pub fn ok_for(primitive: &MacPrimitive) -> MacConfirm {
    let kind = match primitive {
        MacPrimitive::Reset { .. } => MacConfirmKind::Reset,
        MacPrimitive::Set(_) => MacConfirmKind::Set,
        MacPrimitive::Get(_) => MacConfirmKind::Get(500),
        MacPrimitive::RxEnable { .. } => MacConfirmKind::RxEnable,
        MacPrimitive::Associate { .. } => MacConfirmKind::Associate {
            short_addr: ASSIGNED_SHORT,
        },
        MacPrimitive::Poll { .. } => MacConfirmKind::Poll,
        MacPrimitive::Scan { .. } => MacConfirmKind::Scan,
        MacPrimitive::Data { .. } => MacConfirmKind::Data,
    };
    MacConfirm::success(kind)
}

pub fn drain(nwk: &mut Nwk<FakeMac>) {
    while nwk.task_handler() {}
}

/// Run tasks and answer MAC requests with `answer` until nothing moves
pub fn pump(nwk: &mut Nwk<FakeMac>, mut answer: impl FnMut(&MacPrimitive) -> MacConfirm) {
    for _ in 0..1000 {
        drain(nwk);
        let Some((user, primitive)) = nwk.mac_mut().next_unanswered() else {
            return;
        };
        nwk.mac_confirm(user, answer(&primitive));
    }
    panic!("network layer did not settle");
}

pub fn pump_ok(nwk: &mut Nwk<FakeMac>) {
    pump(nwk, ok_for);
}

pub fn notifications(nwk: &mut Nwk<FakeMac>) -> Vec<NwkNotify> {
    core::iter::from_fn(|| nwk.take_notification()).collect()
}

pub fn beacon(coord_ext: ExtAddr, coord_short: ShortAddr, lqi: u8) -> BeaconNotify {
    BeaconNotify {
        channel: CHANNEL,
        pan_id: PAN,
        coord_short,
        coord_ext,
        lqi,
        permit_join: true,
        payload: BeaconPayload {
            stack_profile: 2,
            protocol_version: 2,
            router_capacity: true,
            device_depth: 0,
            end_device_capacity: true,
            ext_pan_id: EXT_PAN,
            update_id: 0,
        },
    }
}

pub fn new_nwk(device_type: DeviceType, rx_on_when_idle: bool) -> Nwk<FakeMac> {
    let config = NwkConfig::builder()
        .device_type(device_type)
        .rx_on_when_idle(rx_on_when_idle)
        .build();
    Nwk::new(FakeMac::default(), config, OWN_EXT)
}

/// Device already on the network as a child of the coordinator
pub fn joined(device_type: DeviceType, short_addr: ShortAddr) -> Nwk<FakeMac> {
    joined_with(NwkConfig::builder().device_type(device_type).build(), short_addr)
}

pub fn joined_with(config: NwkConfig, short_addr: ShortAddr) -> Nwk<FakeMac> {
    let mut nwk = Nwk::new(FakeMac::default(), config, OWN_EXT);
    let nib = nwk.nib_mut();
    nib.joined = true;
    nib.short_addr = short_addr;
    nib.pan_id = PAN;
    nib.ext_pan_id = EXT_PAN;
    nib.channel = CHANNEL;
    nib.depth = 1;
    nib.parent_short = zb_core::COORDINATOR_ADDR;
    nib.parent_ext = COORD_EXT;
    let mut parent = Neighbor::child(COORD_EXT, zb_core::COORDINATOR_ADDR, DeviceType::Coordinator);
    parent.relationship = Relationship::Parent;
    nwk.neighbors_mut().upsert(parent);
    nwk
}

/// Encode a command frame as another device would send it
pub fn command_frame(header: NwkHeader, command: &NwkCommand) -> MacFrame {
    header.encode(&command.encode()).expect("frame fits")
}
