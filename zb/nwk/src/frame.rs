//! NWK frame codecs
//!
//! Header layout (little-endian):
//!
//! | octets | field                                       |
//! |--------|---------------------------------------------|
//! | 2      | frame control                               |
//! | 2      | destination short address                   |
//! | 2      | source short address                        |
//! | 1      | radius                                      |
//! | 1      | sequence number                             |
//! | 0/8    | destination IEEE address (frame control b11)|
//! | 0/8    | source IEEE address (frame control b12)     |

use bitflags::bitflags;
use heapless::Vec;
use zb_core::{le, CapabilityInfo, ExtAddr, ExtPanId, PanId, ShortAddr, ZbError, ZbResult};

/// Largest NWK frame handed to the MAC
pub const MAX_FRAME_LEN: usize = 116;
/// Header length without IEEE address fields
pub const BASE_HEADER_LEN: usize = 8;
pub const PROTOCOL_VERSION: u8 = 2;

pub const LEAVE_PAYLOAD_LEN: usize = 2;
/// Self leave: broadcast, source IEEE address only
pub const LEAVE_ITSELF_FRAME_LEN: usize = BASE_HEADER_LEN + 8 + LEAVE_PAYLOAD_LEN;
/// Unknown child: unicast, source IEEE address only
pub const LEAVE_UNKNOWN_CHILD_FRAME_LEN: usize = BASE_HEADER_LEN + 8 + LEAVE_PAYLOAD_LEN;
/// Known child: unicast, both IEEE addresses
pub const LEAVE_CHILD_FRAME_LEN: usize = BASE_HEADER_LEN + 16 + LEAVE_PAYLOAD_LEN;

pub const MAX_REPORT_PANID: usize = 16;
pub const REPORT_TYPE_PANID_CONFLICT: u8 = 0;
/// Command id, options, extended PAN id
pub const REPORT_MIN_PAYLOAD_LEN: usize = 10;

pub const BEACON_PAYLOAD_LEN: usize = 15;

const FC_FRAME_TYPE_MASK: u16 = 0x0003;
const FC_VERSION_SHIFT: u16 = 2;
const FC_SECURITY: u16 = 1 << 9;
const FC_DST_IEEE: u16 = 1 << 11;
const FC_SRC_IEEE: u16 = 1 << 12;

/// NWK frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Command,
}

/// Decoded NWK header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NwkHeader {
    pub frame_type: FrameType,
    pub security: bool,
    pub dst: ShortAddr,
    pub src: ShortAddr,
    pub radius: u8,
    pub seq: u8,
    pub dst_ext: Option<ExtAddr>,
    pub src_ext: Option<ExtAddr>,
}

impl NwkHeader {
    pub fn command(dst: ShortAddr, src: ShortAddr, radius: u8, seq: u8) -> Self {
        Self {
            frame_type: FrameType::Command,
            security: false,
            dst,
            src,
            radius,
            seq,
            dst_ext: None,
            src_ext: None,
        }
    }

    pub fn data(dst: ShortAddr, src: ShortAddr, radius: u8, seq: u8) -> Self {
        Self {
            frame_type: FrameType::Data,
            ..Self::command(dst, src, radius, seq)
        }
    }

    pub fn with_dst_ext(mut self, ext: ExtAddr) -> Self {
        self.dst_ext = Some(ext);
        self
    }

    pub fn with_src_ext(mut self, ext: ExtAddr) -> Self {
        self.src_ext = Some(ext);
        self
    }

    pub fn len(&self) -> usize {
        BASE_HEADER_LEN + 8 * self.dst_ext.is_some() as usize + 8 * self.src_ext.is_some() as usize
    }

    fn frame_control(&self) -> u16 {
        let mut fc = match self.frame_type {
            FrameType::Data => 0,
            FrameType::Command => 1,
        };
        fc |= u16::from(PROTOCOL_VERSION) << FC_VERSION_SHIFT;
        if self.security {
            fc |= FC_SECURITY;
        }
        if self.dst_ext.is_some() {
            fc |= FC_DST_IEEE;
        }
        if self.src_ext.is_some() {
            fc |= FC_SRC_IEEE;
        }
        fc
    }

    /// Write the header followed by `payload`
    pub fn encode(&self, payload: &[u8]) -> ZbResult<Vec<u8, MAX_FRAME_LEN>> {
        let mut out: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        let push = |out: &mut Vec<u8, MAX_FRAME_LEN>, bytes: &[u8]| {
            out.extend_from_slice(bytes).map_err(|_| ZbError::BufferTooSmall)
        };
        push(&mut out, &self.frame_control().to_le_bytes())?;
        push(&mut out, &self.dst.to_le_bytes())?;
        push(&mut out, &self.src.to_le_bytes())?;
        push(&mut out, &[self.radius, self.seq])?;
        if let Some(ext) = self.dst_ext {
            push(&mut out, &ext.to_le_bytes())?;
        }
        if let Some(ext) = self.src_ext {
            push(&mut out, &ext.to_le_bytes())?;
        }
        push(&mut out, payload)?;
        Ok(out)
    }

    /// Parse a header; returns it with the offset of the payload
    pub fn decode(buf: &[u8]) -> ZbResult<(Self, usize)> {
        let fc = le::u16_at(buf, 0)?;
        let frame_type = match fc & FC_FRAME_TYPE_MASK {
            0 => FrameType::Data,
            1 => FrameType::Command,
            _ => return Err(ZbError::InvalidFrame),
        };
        let mut header = Self {
            frame_type,
            security: fc & FC_SECURITY != 0,
            dst: le::u16_at(buf, 2)?,
            src: le::u16_at(buf, 4)?,
            radius: *buf.get(6).ok_or(ZbError::InvalidLength)?,
            seq: *buf.get(7).ok_or(ZbError::InvalidLength)?,
            dst_ext: None,
            src_ext: None,
        };
        let mut at = BASE_HEADER_LEN;
        if fc & FC_DST_IEEE != 0 {
            header.dst_ext = Some(le::u64_at(buf, at)?);
            at += 8;
        }
        if fc & FC_SRC_IEEE != 0 {
            header.src_ext = Some(le::u64_at(buf, at)?);
            at += 8;
        }
        Ok((header, at))
    }
}

bitflags! {
    /// Leave command options octet
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LeaveOptions: u8 {
        const REJOIN = 0x20;
        const REQUEST = 0x40;
        const REMOVE_CHILDREN = 0x80;
    }
}

/// Report command body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCommand {
    pub report_type: u8,
    pub ext_pan_id: ExtPanId,
    pub pan_ids: Vec<PanId, MAX_REPORT_PANID>,
}

/// NWK command frames handled by this layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NwkCommand {
    Leave(LeaveOptions),
    RejoinRequest(CapabilityInfo),
    RejoinResponse { short_addr: ShortAddr, status: u8 },
    Report(ReportCommand),
}

impl NwkCommand {
    pub const LEAVE_ID: u8 = 0x04;
    pub const REJOIN_REQUEST_ID: u8 = 0x06;
    pub const REJOIN_RESPONSE_ID: u8 = 0x07;
    pub const REPORT_ID: u8 = 0x09;

    pub fn encode(&self) -> Vec<u8, MAX_FRAME_LEN> {
        let mut out: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        // every command body fits well below the frame limit
        let _ = match self {
            NwkCommand::Leave(options) => out.extend_from_slice(&[Self::LEAVE_ID, options.bits()]),
            NwkCommand::RejoinRequest(caps) => {
                out.extend_from_slice(&[Self::REJOIN_REQUEST_ID, caps.bits()])
            }
            NwkCommand::RejoinResponse { short_addr, status } => {
                let addr = short_addr.to_le_bytes();
                out.extend_from_slice(&[Self::REJOIN_RESPONSE_ID, addr[0], addr[1], *status])
            }
            NwkCommand::Report(report) => {
                let count = report.pan_ids.len().min(MAX_REPORT_PANID) as u8;
                let options = (count & 0x1F) | (report.report_type << 5);
                let _ = out.extend_from_slice(&[Self::REPORT_ID, options]);
                let _ = out.extend_from_slice(&report.ext_pan_id.to_le_bytes());
                report
                    .pan_ids
                    .iter()
                    .try_for_each(|pan| out.extend_from_slice(&pan.to_le_bytes()))
            }
        };
        out
    }

    pub fn decode(payload: &[u8]) -> ZbResult<Self> {
        let id = *payload.first().ok_or(ZbError::InvalidLength)?;
        match id {
            Self::LEAVE_ID => {
                let options = *payload.get(1).ok_or(ZbError::InvalidLength)?;
                Ok(NwkCommand::Leave(LeaveOptions::from_bits_truncate(options)))
            }
            Self::REJOIN_REQUEST_ID => {
                let caps = *payload.get(1).ok_or(ZbError::InvalidLength)?;
                Ok(NwkCommand::RejoinRequest(CapabilityInfo::from_bits_retain(caps)))
            }
            Self::REJOIN_RESPONSE_ID => Ok(NwkCommand::RejoinResponse {
                short_addr: le::u16_at(payload, 1)?,
                status: *payload.get(3).ok_or(ZbError::InvalidLength)?,
            }),
            Self::REPORT_ID => {
                if payload.len() < REPORT_MIN_PAYLOAD_LEN {
                    return Err(ZbError::InvalidLength);
                }
                let options = payload[1];
                let count = usize::from(options & 0x1F).min(MAX_REPORT_PANID);
                let mut pan_ids = Vec::new();
                for index in 0..count {
                    let pan = le::u16_at(payload, REPORT_MIN_PAYLOAD_LEN + 2 * index)?;
                    let _ = pan_ids.push(pan);
                }
                Ok(NwkCommand::Report(ReportCommand {
                    report_type: options >> 5,
                    ext_pan_id: le::u64_at(payload, 2)?,
                    pan_ids,
                }))
            }
            _ => Err(ZbError::InvalidFrame),
        }
    }
}

/// NWK beacon payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconPayload {
    pub stack_profile: u8,
    pub protocol_version: u8,
    pub router_capacity: bool,
    pub device_depth: u8,
    pub end_device_capacity: bool,
    pub ext_pan_id: ExtPanId,
    pub update_id: u8,
}

impl BeaconPayload {
    pub fn encode(&self) -> [u8; BEACON_PAYLOAD_LEN] {
        let mut out = [0u8; BEACON_PAYLOAD_LEN];
        out[0] = 0; // protocol id
        out[1] = (self.stack_profile & 0x0F) | (self.protocol_version << 4);
        out[2] = (u8::from(self.router_capacity) << 2)
            | ((self.device_depth & 0x0F) << 3)
            | (u8::from(self.end_device_capacity) << 7);
        out[3..11].copy_from_slice(&self.ext_pan_id.to_le_bytes());
        out[11..14].copy_from_slice(&[0xFF, 0xFF, 0xFF]); // tx offset
        out[14] = self.update_id;
        out
    }

    pub fn decode(buf: &[u8]) -> ZbResult<Self> {
        if buf.len() < BEACON_PAYLOAD_LEN {
            return Err(ZbError::InvalidLength);
        }
        if buf[0] != 0 {
            return Err(ZbError::InvalidFrame);
        }
        Ok(Self {
            stack_profile: buf[1] & 0x0F,
            protocol_version: buf[1] >> 4,
            router_capacity: buf[2] & (1 << 2) != 0,
            device_depth: (buf[2] >> 3) & 0x0F,
            end_device_capacity: buf[2] & (1 << 7) != 0,
            ext_pan_id: le::u64_at(buf, 3)?,
            update_id: buf[14],
        })
    }
}
