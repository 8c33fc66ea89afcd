//! PAN ID conflict report tests for zb-nwk

mod support;

use support::*;
use zb_core::{DeviceType, COORDINATOR_ADDR};
use zb_nwk::*;

const FOREIGN_EXT_PAN: u64 = 0x0BAD_0BAD_0BAD_0BAD;

fn conflicting_beacon() -> BeaconNotify {
    let mut beacon = beacon(0x00F1, 0x0F01, 120);
    beacon.payload.ext_pan_id = FOREIGN_EXT_PAN;
    beacon
}

fn sent_report(nwk: &Nwk<FakeMac>) -> (NwkHeader, ReportCommand) {
    let frames = nwk.mac().data_frames(MacUser::Report);
    assert_eq!(frames.len(), 1);
    let (dst, frame) = &frames[0];
    assert_eq!(*dst, COORDINATOR_ADDR);
    let (header, at) = NwkHeader::decode(frame).unwrap();
    match NwkCommand::decode(&frame[at..]).unwrap() {
        NwkCommand::Report(report) => (header, report),
        other => panic!("not a report: {:?}", other),
    }
}

#[test]
fn test_conflict_is_reported_to_manager() {
    let mut nwk = joined(DeviceType::Router, 0x0001);

    nwk.beacon_notify(&conflicting_beacon());
    assert_eq!(nwk.report().state(), ReportState::Scan);
    drain(&mut nwk);
    let (user, scan) = nwk.mac_mut().next_unanswered().unwrap();
    assert_eq!(user, MacUser::Report);
    assert!(matches!(scan, MacPrimitive::Scan { scan_type: ScanType::Active, .. }));

    // beacons heard during the scan add their PAN IDs once
    let mut neighbour = beacon(0x00F2, 0x0F02, 90);
    neighbour.pan_id = 0x2BBB;
    neighbour.payload.ext_pan_id = 0x1111;
    nwk.beacon_notify(&neighbour);
    nwk.beacon_notify(&neighbour);
    nwk.mac_confirm(MacUser::Report, MacConfirm::success(MacConfirmKind::Scan));
    pump_ok(&mut nwk);

    let (header, report) = sent_report(&nwk);
    assert_eq!(header.src, 0x0001);
    assert_eq!(header.src_ext, Some(OWN_EXT));
    assert_eq!(report.report_type, REPORT_TYPE_PANID_CONFLICT);
    assert_eq!(report.ext_pan_id, EXT_PAN);
    assert_eq!(report.pan_ids.as_slice(), &[PAN, 0x2BBB]);
    assert_eq!(nwk.report().state(), ReportState::Timeout);
}

#[test]
fn test_no_second_report_before_timeout() {
    let mut nwk = joined(DeviceType::Router, 0x0001);
    nwk.beacon_notify(&conflicting_beacon());
    pump_ok(&mut nwk);
    assert_eq!(nwk.report().state(), ReportState::Timeout);

    nwk.beacon_notify(&conflicting_beacon());
    drain(&mut nwk);
    assert_eq!(nwk.mac().count(|p| matches!(p, MacPrimitive::Scan { .. })), 1);

    nwk.tick(nwk.config().report_timeout.as_millis());
    assert_eq!(nwk.report().state(), ReportState::Idle);
    assert!(nwk.report().pan_ids().is_empty());

    nwk.beacon_notify(&conflicting_beacon());
    assert_eq!(nwk.report().state(), ReportState::Scan);
}

#[test]
fn test_own_network_beacon_is_no_conflict() {
    let mut nwk = joined(DeviceType::Router, 0x0001);
    nwk.beacon_notify(&beacon(0x00F3, 0x0F03, 100));
    assert_eq!(nwk.report().state(), ReportState::Idle);

    let mut unjoined = new_nwk(DeviceType::Router, true);
    unjoined.beacon_notify(&conflicting_beacon());
    assert_eq!(unjoined.report().state(), ReportState::Idle);
}

#[test]
fn test_manager_receives_report() {
    let mut manager = joined(DeviceType::Coordinator, COORDINATOR_ADDR);
    let mut pan_ids = heapless::Vec::new();
    pan_ids.push(PAN).unwrap();
    let report = ReportCommand {
        report_type: REPORT_TYPE_PANID_CONFLICT,
        ext_pan_id: EXT_PAN,
        pan_ids: pan_ids.clone(),
    };
    let header = NwkHeader::command(COORDINATOR_ADDR, 0x0001, 30, 4).with_src_ext(OWN_EXT);
    let frame = command_frame(header, &NwkCommand::Report(report));

    manager.mac_data_ind(&frame, 200);

    assert_eq!(
        notifications(&mut manager),
        vec![NwkNotify::ReportInd(ReportInd {
            src: 0x0001,
            ext_pan_id: EXT_PAN,
            pan_ids,
        })]
    );
}
