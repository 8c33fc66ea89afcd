use super::*;
use zb_core::{CapabilityInfo, DeviceType, ZbError};

#[test]
fn test_leave_options_decode() {
    let command = NwkCommand::decode(&[NwkCommand::LEAVE_ID, 0xA0]).unwrap();
    let NwkCommand::Leave(options) = command else {
        panic!("leave expected");
    };
    assert!(options.contains(LeaveOptions::REJOIN));
    assert!(!options.contains(LeaveOptions::REQUEST));
    assert!(options.contains(LeaveOptions::REMOVE_CHILDREN));
}

#[test]
fn test_header_layout() {
    let header = NwkHeader::command(0xFFFD, 0x1234, 1, 0x42).with_src_ext(0x0102_0304_0506_0708);
    let frame = header.encode(&[0x04, 0x00]).unwrap();

    assert_eq!(frame.len(), LEAVE_ITSELF_FRAME_LEN);
    // command frame, protocol version 2, source IEEE present
    assert_eq!(&frame[..2], &[0x09, 0x10]);
    assert_eq!(&frame[2..8], &[0xFD, 0xFF, 0x34, 0x12, 0x01, 0x42]);
    assert_eq!(&frame[8..16], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);

    let (decoded, at) = NwkHeader::decode(&frame).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(at, 16);
}

#[test]
fn test_header_decode_rejects_short_frames() {
    assert_eq!(NwkHeader::decode(&[0x09, 0x10, 0xFD]), Err(ZbError::InvalidLength));
    // IEEE flag set but address missing
    let truncated = [0x09, 0x18, 0, 0, 0, 0, 1, 1, 0xAA];
    assert_eq!(NwkHeader::decode(&truncated), Err(ZbError::InvalidLength));
}

#[test]
fn test_report_options_octet() {
    let mut pan_ids = heapless::Vec::new();
    pan_ids.extend_from_slice(&[0x1111, 0x2222, 0x3333]).unwrap();
    let report = NwkCommand::Report(ReportCommand {
        report_type: REPORT_TYPE_PANID_CONFLICT,
        ext_pan_id: 0xAB,
        pan_ids,
    });
    let bytes = report.encode();

    assert_eq!(bytes[0], NwkCommand::REPORT_ID);
    assert_eq!(bytes[1], 3);
    assert_eq!(bytes.len(), REPORT_MIN_PAYLOAD_LEN + 6);
    assert_eq!(NwkCommand::decode(&bytes).unwrap(), report);
}

#[test]
fn test_report_too_short() {
    assert_eq!(
        NwkCommand::decode(&[NwkCommand::REPORT_ID, 0x01, 0, 0]),
        Err(ZbError::InvalidLength)
    );
}

#[test]
fn test_unknown_command() {
    assert_eq!(NwkCommand::decode(&[0x7F]), Err(ZbError::InvalidFrame));
    assert_eq!(NwkCommand::decode(&[]), Err(ZbError::InvalidLength));
}

#[test]
fn test_rejoin_request_carries_capability() {
    let caps = CapabilityInfo::for_device(DeviceType::Router, true);
    let bytes = NwkCommand::RejoinRequest(caps).encode();
    assert_eq!(bytes.as_slice(), &[NwkCommand::REJOIN_REQUEST_ID, 0x8E]);
}

#[test]
fn test_beacon_payload_bits() {
    let payload = BeaconPayload {
        stack_profile: 2,
        protocol_version: 2,
        router_capacity: true,
        device_depth: 3,
        end_device_capacity: false,
        ext_pan_id: 0x1122_3344_5566_7788,
        update_id: 5,
    };
    let bytes = payload.encode();
    assert_eq!(bytes[1], 0x22);
    assert_eq!(bytes[2], 0x04 | (3 << 3));
    assert_eq!(bytes[3], 0x88);
    assert_eq!(BeaconPayload::decode(&bytes).unwrap(), payload);
    assert_eq!(BeaconPayload::decode(&bytes[..10]), Err(ZbError::InvalidLength));
}

fn candidate(ext_addr: u64, lqi: u8, depth: u8) -> Neighbor {
    Neighbor {
        lqi,
        depth,
        ext_pan_id: 0x77,
        permit_join: true,
        router_capacity: true,
        end_device_capacity: true,
        relationship: Relationship::None,
        ..Neighbor::child(ext_addr, ext_addr as u16, DeviceType::Router)
    }
}

#[test]
fn test_parent_selection() {
    let mut table = NeighborTable::new();
    table.upsert(candidate(1, 100, 2));
    table.upsert(candidate(2, 200, 4));
    table.upsert(candidate(3, 200, 1));
    let mut full = candidate(4, 250, 0);
    full.end_device_capacity = false;
    table.upsert(full);

    let best = table.select_parent(0x77, DeviceType::EndDevice, true, 15).unwrap();
    assert_eq!(best.ext_addr, 3);

    table.mark_tried(3);
    let next = table.select_parent(0x77, DeviceType::EndDevice, true, 15).unwrap();
    assert_eq!(next.ext_addr, 2);

    // other networks and too deep parents are skipped
    assert!(table.select_parent(0x78, DeviceType::EndDevice, true, 15).is_none());
    assert_eq!(
        table.select_parent(0x77, DeviceType::EndDevice, true, 2).map(|n| n.ext_addr),
        None
    );

    table.clear_tried();
    assert_eq!(
        table.select_parent(0, DeviceType::Router, true, 15).map(|n| n.ext_addr),
        Some(4)
    );
}

#[test]
fn test_neighbor_table_children() {
    let mut table = NeighborTable::new();
    assert!(table.upsert(Neighbor::child(0xC1, 0x0101, DeviceType::EndDevice)));
    assert!(table.upsert(Neighbor::child(0xC2, 0x0102, DeviceType::Router)));
    assert_eq!(table.child_count(), 2);
    assert!(table.is_child(0xC1));

    table.set_relationship(0xC2, Relationship::Sibling);
    assert_eq!(table.child_count(), 1);
    assert_eq!(table.remove(0xC1).map(|n| n.short_addr), Some(0x0101));
    assert!(table.first_child().is_none());
}

#[test]
fn test_neighbor_table_capacity() {
    let mut table = NeighborTable::new();
    for ext in 0..NEIGHBOR_TABLE_SIZE as u64 {
        assert!(table.upsert(Neighbor::child(ext + 1, ext as u16, DeviceType::EndDevice)));
    }
    assert!(!table.upsert(Neighbor::child(0xFFFF, 0xFFFF, DeviceType::EndDevice)));
    // replacing an entry still works when full
    assert!(table.upsert(Neighbor::child(1, 0x0A0A, DeviceType::EndDevice)));
    assert_eq!(table.find_ext(1).map(|n| n.short_addr), Some(0x0A0A));
}

#[test]
fn test_nib_leave_network_keeps_identity() {
    let mut nib = Nib::new(DeviceType::Router, 0xABCD, true);
    nib.joined = true;
    nib.short_addr = 0x0042;
    nib.pan_id = 0x1A2B;
    let seq = nib.next_seq();

    nib.leave_network();
    assert!(!nib.joined);
    assert_eq!(nib.short_addr, zb_core::NO_SHORT_ADDR);
    assert_eq!(nib.ext_addr, 0xABCD);
    assert_eq!(nib.device_type, DeviceType::Router);
    assert_eq!(nib.next_seq(), seq.wrapping_add(1));
}

#[test]
fn test_config_builder() {
    let config = NwkConfig::builder()
        .device_type(DeviceType::EndDevice)
        .rx_on_when_idle(false)
        .max_join_attempts(0)
        .manager_addr(0x0010)
        .build();
    assert_eq!(config.device_type, DeviceType::EndDevice);
    assert_eq!(config.max_join_attempts, 1);
    assert_eq!(config.manager_addr, 0x0010);
    assert_eq!(config.report_scan_channels, ALL_CHANNELS);
}
