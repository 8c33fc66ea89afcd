use super::*;

#[test]
fn test_aux_header_layout() {
    let header = AuxHeader::new(KeyId::Network, 0x0102_0304, 0x1122_3344_5566_7788);
    let raw = header.encode();
    assert_eq!(raw.len(), AUX_HEADER_LEN);
    assert_eq!(raw[0], 0x2D);
    assert_eq!(&raw[1..5], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(raw[5], 0x88);
    assert_eq!(AuxHeader::decode(&raw), Ok(header));
}

#[test]
fn test_aux_header_requires_extended_nonce() {
    let mut raw = AuxHeader::new(KeyId::KeyTransport, 1, 2).encode();
    raw[0] &= !0x20;
    assert_eq!(AuxHeader::decode(&raw), Err(SecurityError::InvalidHeader));
    assert_eq!(AuxHeader::decode(&raw[..12]), Err(SecurityError::InvalidLength));
}

#[test]
fn test_secured_frame_with_aux_nonce() {
    let key = [0xABu8; 16];
    let header = AuxHeader::new(KeyId::Network, 9, 0xAABB_CCDD_0011_2233);
    let aad = header.encode();
    let mut payload = [0x05u8, 0x01, 0x02, 0x03];
    let mut cipher = CipherService::new();

    let mic = ccm::encrypt(&mut cipher, &key, &header.nonce(), &aad, &mut payload).unwrap();
    assert_ne!(payload, [0x05, 0x01, 0x02, 0x03]);

    let decoded = AuxHeader::decode(&aad).unwrap();
    ccm::decrypt(&mut cipher, &key, &decoded.nonce(), &aad, &mut payload, &mic).unwrap();
    assert_eq!(payload, [0x05, 0x01, 0x02, 0x03]);
}
