//! Auxiliary security header
//!
//! Layout (13 octets, little-endian):
//!
//! | octets | field                     |
//! |--------|---------------------------|
//! | 1      | security control          |
//! | 4      | frame counter             |
//! | 8      | source extended address   |

use zb_core::ExtAddr;

use crate::{SecurityError, SecurityResult};

/// Encoded length of the header with the extended nonce present
pub const AUX_HEADER_LEN: usize = 13;

/// Security level: encryption with a 32-bit MIC
pub const SECURITY_LEVEL_ENC_MIC_32: u8 = 0x05;

const LEVEL_MASK: u8 = 0x07;
const KEY_ID_SHIFT: u8 = 3;
const KEY_ID_MASK: u8 = 0x03;
const EXTENDED_NONCE: u8 = 1 << 5;

/// Key identifier subfield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyId {
    Data = 0,
    Network = 1,
    KeyTransport = 2,
    KeyLoad = 3,
}

impl KeyId {
    fn from_bits(bits: u8) -> Self {
        match bits & KEY_ID_MASK {
            0 => KeyId::Data,
            1 => KeyId::Network,
            2 => KeyId::KeyTransport,
            _ => KeyId::KeyLoad,
        }
    }
}

/// Decoded auxiliary header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxHeader {
    pub level: u8,
    pub key_id: KeyId,
    pub frame_counter: u32,
    pub source: ExtAddr,
}

impl AuxHeader {
    pub fn new(key_id: KeyId, frame_counter: u32, source: ExtAddr) -> Self {
        Self {
            level: SECURITY_LEVEL_ENC_MIC_32,
            key_id,
            frame_counter,
            source,
        }
    }

    pub fn security_control(&self) -> u8 {
        (self.level & LEVEL_MASK) | ((self.key_id as u8) << KEY_ID_SHIFT) | EXTENDED_NONCE
    }

    pub fn encode(&self) -> [u8; AUX_HEADER_LEN] {
        let mut out = [0u8; AUX_HEADER_LEN];
        out[0] = self.security_control();
        out[1..5].copy_from_slice(&self.frame_counter.to_le_bytes());
        out[5..13].copy_from_slice(&self.source.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> SecurityResult<Self> {
        if buf.len() < AUX_HEADER_LEN {
            return Err(SecurityError::InvalidLength);
        }
        let control = buf[0];
        if control & EXTENDED_NONCE == 0 {
            return Err(SecurityError::InvalidHeader);
        }
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&buf[1..5]);
        let mut source = [0u8; 8];
        source.copy_from_slice(&buf[5..13]);
        Ok(Self {
            level: control & LEVEL_MASK,
            key_id: KeyId::from_bits(control >> KEY_ID_SHIFT),
            frame_counter: u32::from_le_bytes(counter),
            source: u64::from_le_bytes(source),
        })
    }

    /// CCM* nonce: source address, frame counter, security control
    pub fn nonce(&self) -> [u8; crate::ccm::NONCE_LEN] {
        let mut nonce = [0u8; crate::ccm::NONCE_LEN];
        nonce[..8].copy_from_slice(&self.source.to_le_bytes());
        nonce[8..12].copy_from_slice(&self.frame_counter.to_le_bytes());
        nonce[12] = self.security_control();
        nonce
    }
}
