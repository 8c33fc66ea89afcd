//! APS state machine tests for zb-aps

use zb_aps::*;
use zb_core::ApsStatus;

const OWN_EXT: u64 = 0x00AA_0000_0000_0001;

fn run(aps: &mut Aps) {
    while aps.task_handler() {}
}

fn notifications(aps: &mut Aps) -> Vec<ApsNotify> {
    std::iter::from_fn(|| aps.take_notification()).collect()
}

fn conf(request: ApsControlReq, status: ApsStatus) -> ApsNotify {
    ApsNotify::ControlConf { request, status }
}

fn started() -> Aps {
    let mut aps = Aps::new(ApsConfig::default(), OWN_EXT);
    aps.control_req(ApsControlReq::Reset).unwrap();
    aps.control_req(ApsControlReq::Start).unwrap();
    run(&mut aps);
    notifications(&mut aps);
    aps
}

#[test]
fn test_startup_sequence() {
    let mut aps = Aps::new(ApsConfig::default(), OWN_EXT);
    assert_eq!(aps.state().raw(), 0x0110);
    assert!(!aps.check_state(ApsComponents::SECURITY_MANAGER));

    aps.control_req(ApsControlReq::Reset).unwrap();
    assert!(aps.task_handler());
    assert_eq!(aps.state().id(), Some(ApsStateId::Resetting));
    assert!(!aps.check_state(ApsComponents::all()));
    run(&mut aps);
    assert_eq!(aps.state().raw(), 0x0332);
    assert_eq!(notifications(&mut aps), vec![conf(ApsControlReq::Reset, ApsStatus::Success)]);

    aps.control_req(ApsControlReq::Start).unwrap();
    run(&mut aps);
    assert_eq!(aps.state().raw(), 0x043F);
    assert!(aps.check_state(ApsComponents::SECURITY_MANAGER));
    assert_eq!(notifications(&mut aps), vec![conf(ApsControlReq::Start, ApsStatus::Success)]);
    assert!(aps.is_idle());
}

#[test]
fn test_illegal_requests_keep_state() {
    let mut aps = Aps::new(ApsConfig::default(), OWN_EXT);
    aps.control_req(ApsControlReq::Start).unwrap();
    aps.control_req(ApsControlReq::Stop).unwrap();
    run(&mut aps);

    assert_eq!(aps.state().id(), Some(ApsStateId::Initial));
    assert_eq!(
        notifications(&mut aps),
        vec![
            conf(ApsControlReq::Start, ApsStatus::IllegalRequest),
            conf(ApsControlReq::Stop, ApsStatus::IllegalRequest),
        ]
    );
}

#[test]
fn test_stop_without_pending_frames() {
    let mut aps = started();
    aps.control_req(ApsControlReq::Stop).unwrap();
    run(&mut aps);

    assert_eq!(aps.state().id(), Some(ApsStateId::Stop));
    assert!(aps.check_state(ApsComponents::AIB_MANAGER));
    assert!(!aps.check_state(ApsComponents::SECURITY_MANAGER));
    assert_eq!(notifications(&mut aps), vec![conf(ApsControlReq::Stop, ApsStatus::Success)]);

    // a stopped layer can start again
    aps.control_req(ApsControlReq::Start).unwrap();
    run(&mut aps);
    assert_eq!(aps.state().id(), Some(ApsStateId::Start));
}

#[test]
fn test_stop_waits_for_outgoing_frames() {
    let mut aps = started();
    let mut cipher = zb_security::CipherService::new();
    let request = TransportKeyReq::network_key([0x5A; 16], 1, 0x00BB_0000_0000_0002, 0x0042);
    aps.transport_key_req(&mut cipher, &request).unwrap();
    notifications(&mut aps);

    aps.control_req(ApsControlReq::Start).unwrap();
    aps.control_req(ApsControlReq::Stop).unwrap();
    run(&mut aps);
    assert_eq!(aps.state().id(), Some(ApsStateId::Stopping));
    assert_eq!(notifications(&mut aps), vec![conf(ApsControlReq::Start, ApsStatus::IllegalRequest)]);
    assert!(!aps.check_state(ApsComponents::all()));

    assert!(aps.take_outgoing().is_some());
    assert_eq!(aps.state().id(), Some(ApsStateId::Stop));
    assert_eq!(notifications(&mut aps), vec![conf(ApsControlReq::Stop, ApsStatus::Success)]);
}

#[test]
fn test_hot_reset_keeps_keys() {
    let mut aps = started();
    aps.keys_mut().set_nwk_key([0x11; 16], 3);

    aps.control_req(ApsControlReq::HotReset).unwrap();
    run(&mut aps);
    assert_eq!(aps.state().id(), Some(ApsStateId::Reset));
    assert_eq!(aps.keys().active_nwk_key().map(|e| e.seq), Some(3));
    assert_eq!(notifications(&mut aps), vec![conf(ApsControlReq::HotReset, ApsStatus::Success)]);

    aps.control_req(ApsControlReq::Reset).unwrap();
    run(&mut aps);
    assert!(aps.keys().active_nwk_key().is_none());
    // the preconfigured link key survives
    assert_eq!(aps.keys().tc_link_key(), Some(&DEFAULT_TC_LINK_KEY));
}

#[test]
fn test_control_queue_full() {
    let mut aps = Aps::new(ApsConfig::default(), OWN_EXT);
    for _ in 0..4 {
        aps.control_req(ApsControlReq::Reset).unwrap();
    }
    assert_eq!(aps.control_req(ApsControlReq::Reset), Err(zb_core::ZbError::QueueFull));

    aps.reset();
    assert!(aps.is_idle());
    assert_eq!(aps.state().id(), Some(ApsStateId::Initial));
}
