//! APS command frames
//!
//! Transport-Key with a network key (37 octets):
//!
//! | octets | field                              |
//! |--------|------------------------------------|
//! | 1      | frame control                      |
//! | 1      | APS counter                        |
//! | 1      | command id (0x05)                  |
//! | 1      | key type                           |
//! | 16     | key                                |
//! | 1      | key sequence number                |
//! | 8      | destination extended address (LE) |
//! | 8      | source extended address (LE)       |
//!
//! Tunnel (no padding):
//!
//! | octets | field                                  |
//! |--------|----------------------------------------|
//! | 3      | command header, command id 0x0E        |
//! | 8      | destination extended address (LE)      |
//! | 2      | tunneled base header                   |
//! | 13     | tunneled auxiliary header              |
//! | 1      | tunneled command id                    |
//! | n      | tunneled payload                       |
//! | 4      | MIC                                    |

use heapless::Vec;
use zb_core::{le, ExtAddr, Key, KeySeqNum, ZbError, ZbResult};
use zb_security::{AUX_HEADER_LEN, ccm::MIC_LEN};

/// Largest APS frame carried in one NWK frame
pub const MAX_APS_FRAME_LEN: usize = 100;

/// APS frame buffer
pub type ApsFrame = Vec<u8, MAX_APS_FRAME_LEN>;

pub const FC_FRAME_TYPE_COMMAND: u8 = 0x01;
pub const FC_FRAME_TYPE_MASK: u8 = 0x03;
pub const FC_SECURITY: u8 = 1 << 5;

/// Frame control and counter
pub const BASE_HEADER_LEN: usize = 2;
/// Base header and command id
pub const COMMAND_HEADER_LEN: usize = 3;

pub const TRANSPORT_KEY_COMMAND_ID: u8 = 0x05;
pub const TUNNEL_COMMAND_ID: u8 = 0x0E;

pub const KEY_TYPE_STANDARD_NETWORK: u8 = 0x01;

/// Key type, key, sequence number and both addresses
pub const TRANSPORT_NWK_KEY_PAYLOAD_LEN: usize = 1 + 16 + 1 + 8 + 8;
pub const TRANSPORT_NWK_KEY_FRAME_LEN: usize = COMMAND_HEADER_LEN + TRANSPORT_NWK_KEY_PAYLOAD_LEN;

/// Base header, auxiliary header, command id and MIC around a payload
pub const SECURED_OVERHEAD: usize = BASE_HEADER_LEN + AUX_HEADER_LEN + 1 + MIC_LEN;
pub const SECURED_TRANSPORT_KEY_LEN: usize = SECURED_OVERHEAD + TRANSPORT_NWK_KEY_PAYLOAD_LEN;

/// Command header and destination preceding the tunneled command
pub const TUNNEL_HEADER_LEN: usize = COMMAND_HEADER_LEN + 8;
pub const TUNNEL_TRANSPORT_KEY_LEN: usize = TUNNEL_HEADER_LEN + SECURED_TRANSPORT_KEY_LEN;

/// Command frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub security: bool,
    pub counter: u8,
    pub command_id: u8,
}

impl CommandHeader {
    pub fn new(counter: u8, command_id: u8) -> Self {
        Self {
            security: false,
            counter,
            command_id,
        }
    }

    pub fn frame_control(&self) -> u8 {
        FC_FRAME_TYPE_COMMAND | if self.security { FC_SECURITY } else { 0 }
    }

    pub fn encode(&self) -> [u8; COMMAND_HEADER_LEN] {
        [self.frame_control(), self.counter, self.command_id]
    }

    /// Parse the header of an unsecured command frame
    pub fn decode(buf: &[u8]) -> ZbResult<Self> {
        if buf.len() < COMMAND_HEADER_LEN {
            return Err(ZbError::InvalidLength);
        }
        if buf[0] & FC_FRAME_TYPE_MASK != FC_FRAME_TYPE_COMMAND {
            return Err(ZbError::InvalidFrame);
        }
        Ok(Self {
            security: buf[0] & FC_SECURITY != 0,
            counter: buf[1],
            command_id: buf[2],
        })
    }
}

/// Transport-Key command body carrying a network key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportNwkKey {
    pub key: Key,
    pub key_seq: KeySeqNum,
    /// Device that should use the key; zero addresses every device
    pub dst: ExtAddr,
    /// Device that originally sent the key
    pub src: ExtAddr,
}

impl TransportNwkKey {
    pub fn encode_payload(&self) -> [u8; TRANSPORT_NWK_KEY_PAYLOAD_LEN] {
        let mut out = [0u8; TRANSPORT_NWK_KEY_PAYLOAD_LEN];
        out[0] = KEY_TYPE_STANDARD_NETWORK;
        out[1..17].copy_from_slice(&self.key);
        out[17] = self.key_seq;
        out[18..26].copy_from_slice(&self.dst.to_le_bytes());
        out[26..34].copy_from_slice(&self.src.to_le_bytes());
        out
    }

    /// Complete unsecured command frame
    pub fn encode(&self, counter: u8) -> [u8; TRANSPORT_NWK_KEY_FRAME_LEN] {
        let mut out = [0u8; TRANSPORT_NWK_KEY_FRAME_LEN];
        out[..COMMAND_HEADER_LEN]
            .copy_from_slice(&CommandHeader::new(counter, TRANSPORT_KEY_COMMAND_ID).encode());
        out[COMMAND_HEADER_LEN..].copy_from_slice(&self.encode_payload());
        out
    }

    /// Parse the command body that follows the command id
    pub fn decode_payload(buf: &[u8]) -> ZbResult<Self> {
        if buf.len() < TRANSPORT_NWK_KEY_PAYLOAD_LEN {
            return Err(ZbError::InvalidLength);
        }
        if buf[0] != KEY_TYPE_STANDARD_NETWORK {
            return Err(ZbError::InvalidFrame);
        }
        let mut key = [0u8; 16];
        key.copy_from_slice(&buf[1..17]);
        Ok(Self {
            key,
            key_seq: buf[17],
            dst: le::u64_at(buf, 18)?,
            src: le::u64_at(buf, 26)?,
        })
    }
}

/// Tunnel command wrapping a secured APS command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelCommand<'a> {
    pub counter: u8,
    /// Final destination of the tunneled command
    pub dst: ExtAddr,
    /// Tunneled command: base header through MIC
    pub inner: &'a [u8],
}

impl<'a> TunnelCommand<'a> {
    pub fn encode(&self) -> ZbResult<ApsFrame> {
        let mut out = ApsFrame::new();
        let header = CommandHeader::new(self.counter, TUNNEL_COMMAND_ID);
        out.extend_from_slice(&header.encode())
            .and_then(|_| out.extend_from_slice(&self.dst.to_le_bytes()))
            .and_then(|_| out.extend_from_slice(self.inner))
            .map_err(|_| ZbError::BufferTooSmall)?;
        Ok(out)
    }

    pub fn decode(buf: &'a [u8]) -> ZbResult<Self> {
        let header = CommandHeader::decode(buf)?;
        if header.command_id != TUNNEL_COMMAND_ID {
            return Err(ZbError::InvalidFrame);
        }
        let inner = buf.get(TUNNEL_HEADER_LEN..).ok_or(ZbError::InvalidLength)?;
        if inner.len() < SECURED_OVERHEAD {
            return Err(ZbError::InvalidLength);
        }
        // the tunneled command is always secured
        if inner[0] & FC_SECURITY == 0 {
            return Err(ZbError::InvalidFrame);
        }
        Ok(Self {
            counter: header.counter,
            dst: le::u64_at(buf, COMMAND_HEADER_LEN)?,
            inner,
        })
    }
}
