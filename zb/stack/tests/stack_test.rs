//! Dispatcher and cross-layer tests for zb-stack

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};

use support::*;
use zb_aps::{ApsComponents, ApsControlReq, ApsNotify, ApsStateId, TransportKeyReq};
use zb_core::{ApsStatus, DeviceType, NwkStatus, TickAccumulator, COORDINATOR_ADDR};
use zb_nwk::*;
use zb_security::{CipherCommand, CipherRequest};
use zb_stack::*;

const TC_EXT: u64 = 0x00C0_0000_0000_0001;
const ROUTER_EXT: u64 = 0x00C0_0000_0000_0002;
const JOINER_EXT: u64 = 0x00C0_0000_0000_0003;
const ROUTER_SHORT: u16 = 0x0001;
const JOINER_SHORT: u16 = 0x0042;
const NWK_KEY: [u8; 16] = [0x3C; 16];

fn coordinator() -> Stack<FakeMac> {
    running(TC_EXT, DeviceType::Coordinator, COORDINATOR_ADDR, (0, COORDINATOR_ADDR))
}

fn router() -> Stack<FakeMac> {
    running(ROUTER_EXT, DeviceType::Router, ROUTER_SHORT, (TC_EXT, COORDINATOR_ADDR))
}

/// Deliver every upper-layer frame `from` sent to `to`
fn deliver(from: &Stack<FakeMac>, to: &mut Stack<FakeMac>) {
    for (_, frame) in from.nwk().mac().upper_layer_frames() {
        to.mac_data_ind(&frame, 200);
    }
    pump(to);
}

#[test]
fn test_config_builder() {
    fn idle() {}

    let config = StackConfig::builder()
        .name("Node")
        .ext_addr(0xABCD)
        .device_type(DeviceType::EndDevice)
        .rx_on_when_idle(false)
        .max_join_attempts(5)
        .leave_request_allowed(false)
        .tc_link_key([7; 16])
        .idle_callback(idle)
        .build();

    assert_eq!(config.name, "Node");
    assert_eq!(config.ext_addr, 0xABCD);
    assert_eq!(config.nwk.device_type, DeviceType::EndDevice);
    assert!(!config.nwk.rx_on_when_idle);
    assert_eq!(config.nwk.max_join_attempts, 5);
    assert!(!config.nwk.leave_request_allowed);
    assert_eq!(config.aps.tc_link_key, [7; 16]);
    assert!(config.idle_callback.is_some());

    let default = StackConfig::default();
    assert_eq!(default.name, "ZB");
    assert!(default.idle_callback.is_none());
}

#[test]
fn test_start_brings_aps_up() {
    let mut stack = Stack::new(FakeMac::default(), config(ROUTER_EXT, DeviceType::Router));
    assert_eq!(stack.aps().state().id(), Some(ApsStateId::Initial));

    stack.start().unwrap();
    stack.run_until_idle();

    assert!(stack.aps().check_state(ApsComponents::SECURITY_MANAGER));
    assert_eq!(
        notifications(&mut stack),
        vec![
            StackNotify::Aps(ApsNotify::ControlConf {
                request: ApsControlReq::Reset,
                status: ApsStatus::Success
            }),
            StackNotify::Aps(ApsNotify::ControlConf {
                request: ApsControlReq::Start,
                status: ApsStatus::Success
            }),
        ]
    );
    assert!(stack.is_idle());
}

#[test]
fn test_leave_network_stops_aps() {
    let mut stack = router();
    stack
        .leave_network_req(ZdoLeaveReq {
            rejoin: false,
            remove_children: false,
        })
        .unwrap();
    assert_eq!(stack.zdo().state(), ZdoLeaveState::NwkLeave);
    assert_eq!(
        stack.leave_network_req(ZdoLeaveReq::default()),
        Err(zb_core::ZbError::Busy)
    );

    pump(&mut stack);

    assert!(!stack.nwk().nib().joined);
    assert_eq!(stack.aps().state().id(), Some(ApsStateId::Stop));
    assert_eq!(stack.zdo().state(), ZdoLeaveState::Idle);
    let notes = notifications(&mut stack);
    assert!(notes.iter().any(|n| matches!(
        n,
        StackNotify::Nwk(NwkNotify::LeaveConf(LeaveConf { device: ROUTER_EXT, .. }))
    )));
    assert_eq!(
        notes.last(),
        Some(&StackNotify::Zdo(ZdoNotify::LeaveNetworkConf {
            status: NwkStatus::Success
        }))
    );
}

#[test]
fn test_leave_requested_by_parent() {
    let mut stack = router();
    let header = NwkHeader::command(ROUTER_SHORT, COORDINATOR_ADDR, 1, 3).with_src_ext(TC_EXT);
    let command = NwkCommand::Leave(LeaveOptions::REQUEST | LeaveOptions::REJOIN);
    let frame = header.encode(&command.encode()).unwrap();

    stack.mac_data_ind(&frame, 255);
    pump(&mut stack);

    assert_eq!(stack.aps().state().id(), Some(ApsStateId::Stop));
    let notes = notifications(&mut stack);
    let left: Vec<_> = notes
        .iter()
        .filter(|n| matches!(n, StackNotify::Zdo(_)))
        .collect();
    assert_eq!(left, vec![&StackNotify::Zdo(ZdoNotify::NetworkLeft { rejoin: true })]);
}

#[test]
fn test_network_key_sent_directly() {
    let mut tc = coordinator();
    let mut device = router();
    tc.nwk_mut()
        .neighbors_mut()
        .upsert(Neighbor::child(ROUTER_EXT, ROUTER_SHORT, DeviceType::Router));

    tc.transport_key_req(&TransportKeyReq::network_key(NWK_KEY, 1, ROUTER_EXT, ROUTER_SHORT))
        .unwrap();
    pump(&mut tc);
    let frames = tc.nwk().mac().upper_layer_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, ROUTER_SHORT);

    deliver(&tc, &mut device);

    assert_eq!(device.aps().keys().active_nwk_key().map(|e| e.key), Some(NWK_KEY));
    assert!(notifications(&mut device).contains(&StackNotify::Aps(ApsNotify::TransportKeyInd {
        src: TC_EXT,
        key_seq: 1
    })));
}

#[test]
fn test_network_key_tunneled_through_router() {
    let mut tc = coordinator();
    let mut parent = router();
    add_child(&mut parent, JOINER_EXT, JOINER_SHORT);
    let mut joiner = running(JOINER_EXT, DeviceType::EndDevice, JOINER_SHORT, (ROUTER_EXT, ROUTER_SHORT));

    let request = TransportKeyReq::network_key(NWK_KEY, 2, JOINER_EXT, JOINER_SHORT).tunneled(ROUTER_SHORT);
    tc.transport_key_req(&request).unwrap();
    pump(&mut tc);

    deliver(&tc, &mut parent);
    assert!(parent.aps().keys().active_nwk_key().is_none());
    let forwarded = parent.nwk().mac().upper_layer_frames();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].0, JOINER_SHORT);

    deliver(&parent, &mut joiner);
    assert_eq!(joiner.aps().keys().active_nwk_key().map(|e| e.seq), Some(2));
}

#[test]
fn test_cipher_requests_run_first() {
    let mut stack = router();
    let key = [0x11u8; 16];
    stack
        .cipher_req(CipherRequest::new(CipherCommand::SetKey, &key).unwrap())
        .unwrap();
    let busy = stack.cipher_req(CipherRequest::new(CipherCommand::EcbEncrypt, &[0; 16]).unwrap());
    assert_eq!(busy, Err(nb::Error::WouldBlock));

    assert!(stack.dispatch_once());
    match stack.take_notification() {
        Some(StackNotify::Cipher(confirm)) => {
            assert_eq!(confirm.command, CipherCommand::SetKey);
            assert_eq!(confirm.status, Ok(()));
        }
        other => panic!("cipher confirm expected, got {:?}", other),
    }

    stack
        .cipher_req(CipherRequest::new(CipherCommand::EcbEncrypt, &[0; 16]).unwrap())
        .unwrap();
    stack.run_until_idle();
    match stack.take_notification() {
        Some(StackNotify::Cipher(confirm)) => {
            assert_eq!(confirm.status, Ok(()));
            assert_ne!(confirm.text.as_slice(), &[0u8; 16]);
        }
        other => panic!("cipher confirm expected, got {:?}", other),
    }
}

static REPORT_TICKS: TickAccumulator = TickAccumulator::new();

#[test]
fn test_ticks_expire_report_timeout() {
    let mut stack = Stack::with_tick_source(
        FakeMac::default(),
        config(ROUTER_EXT, DeviceType::Router),
        &REPORT_TICKS,
    );
    join(&mut stack, ROUTER_SHORT, (TC_EXT, COORDINATOR_ADDR));

    stack.beacon_notify(&beacon(0x0F0F, 0x0F0F, 0x0BAD));
    pump(&mut stack);
    assert_eq!(stack.nwk().report().state(), ReportState::Timeout);

    REPORT_TICKS.add(stack.config().nwk.report_timeout.as_millis() / 2);
    pump(&mut stack);
    assert_eq!(stack.nwk().report().state(), ReportState::Timeout);

    REPORT_TICKS.add(stack.config().nwk.report_timeout.as_millis());
    pump(&mut stack);
    assert_eq!(stack.nwk().report().state(), ReportState::Idle);
}

static IDLE_CALLS: AtomicUsize = AtomicUsize::new(0);

fn count_idle() {
    IDLE_CALLS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_idle_callback_after_dispatch() {
    let config = StackConfig::builder()
        .ext_addr(ROUTER_EXT)
        .idle_callback(count_idle)
        .build();
    let mut stack = Stack::new(FakeMac::default(), config);
    stack.start().unwrap();

    stack.run_until_idle();
    assert!(stack.is_idle());
    assert_eq!(IDLE_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reset_returns_to_initial() {
    let mut stack = router();
    stack.leave_network_req(ZdoLeaveReq::default()).unwrap();
    stack.reset();

    assert_eq!(stack.aps().state().id(), Some(ApsStateId::Initial));
    assert_eq!(stack.zdo().state(), ZdoLeaveState::Idle);
    assert!(stack.take_notification().is_none());
    assert!(stack.is_idle());
}
