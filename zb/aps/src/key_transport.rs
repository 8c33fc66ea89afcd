//! Network key transport
//!
//! The trust center sends a network key with APSME-TRANSPORT-KEY. The
//! Transport-Key command is secured with the trust center link key and
//! sent either straight to the destination, or wrapped in a Tunnel command
//! to a router next to it. The router strips the tunnel and forwards the
//! secured command unchanged.
//!
//! Indication handlers work on the received buffer. A `true` return tells
//! the caller to release the buffer; `false` means the buffer was moved into
//! the outgoing queue to be forwarded or relayed.

use core::mem;

use zb_core::{
    is_broadcast, ApsStatus, ExtAddr, Key, KeySeqNum, ShortAddr, ZbError, ZbResult,
    UNKNOWN_EXT_ADDR,
};
use zb_security::{ccm, AuxHeader, CipherService, KeyId, SecurityError, SecurityResult};
use zb_security::{ccm::MIC_LEN, AUX_HEADER_LEN};

use crate::context::ApsContext;
use crate::frame::*;
use crate::notify::{ApsCommandInd, ApsNotify};
use crate::state::ApsComponents;

/// APSME-TRANSPORT-KEY.request for a network key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportKeyReq {
    pub key_type: u8,
    pub key: Key,
    pub key_seq: KeySeqNum,
    /// Device that receives the key; zero for every device
    pub dst_ext: ExtAddr,
    pub dst_short: ShortAddr,
    /// Router that tunnels the key to a device not yet in the network
    pub tunnel_via: Option<ShortAddr>,
}

impl TransportKeyReq {
    pub fn network_key(key: Key, key_seq: KeySeqNum, dst_ext: ExtAddr, dst_short: ShortAddr) -> Self {
        Self {
            key_type: KEY_TYPE_STANDARD_NETWORK,
            key,
            key_seq,
            dst_ext,
            dst_short,
            tunnel_via: None,
        }
    }

    pub fn tunneled(mut self, via: ShortAddr) -> Self {
        self.tunnel_via = Some(via);
        self
    }
}

/// How a validated request goes out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Direct,
    Tunneled { via: ShortAddr },
}

/// Validation of outgoing transport-key requests
pub trait TransportKeyCheck {
    fn check_transport_nwk_key_req(&self, req: &TransportKeyReq) -> Result<TransportMode, ApsStatus>;
}

/// Request check of a trust center
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustCenter;

impl TransportKeyCheck for TrustCenter {
    fn check_transport_nwk_key_req(&self, req: &TransportKeyReq) -> Result<TransportMode, ApsStatus> {
        if req.key_type != KEY_TYPE_STANDARD_NETWORK {
            return Err(ApsStatus::InvalidParameter);
        }
        if is_broadcast(req.dst_short) {
            // broadcasts cannot be tunneled
            return match req.tunnel_via {
                None => Ok(TransportMode::Direct),
                Some(_) => Err(ApsStatus::InvalidParameter),
            };
        }
        if req.dst_ext == UNKNOWN_EXT_ADDR {
            return Err(ApsStatus::InvalidParameter);
        }
        match req.tunnel_via {
            None => Ok(TransportMode::Direct),
            Some(via) if is_broadcast(via) => Err(ApsStatus::InvalidParameter),
            Some(via) => Ok(TransportMode::Tunneled { via }),
        }
    }
}

/// Devices that are not a trust center never send keys
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportKeyDisabled;

impl TransportKeyCheck for TransportKeyDisabled {
    fn check_transport_nwk_key_req(&self, _req: &TransportKeyReq) -> Result<TransportMode, ApsStatus> {
        Err(ApsStatus::NotSupported)
    }
}

/// Build a secured command frame: base header, auxiliary header, encrypted
/// command id and payload, MIC.
///
/// `command` starts with the command id.
pub fn secure_command(
    cipher: &mut CipherService,
    key: &Key,
    counter: u8,
    aux: &AuxHeader,
    command: &[u8],
) -> SecurityResult<ApsFrame> {
    let mut frame = ApsFrame::new();
    frame
        .extend_from_slice(&[FC_FRAME_TYPE_COMMAND | FC_SECURITY, counter])
        .and_then(|_| frame.extend_from_slice(&aux.encode()))
        .and_then(|_| frame.extend_from_slice(command))
        .map_err(|_| SecurityError::InvalidLength)?;

    let (aad, payload) = frame.split_at_mut(BASE_HEADER_LEN + AUX_HEADER_LEN);
    let mic = ccm::encrypt(cipher, key, &aux.nonce(), aad, payload)?;
    frame
        .extend_from_slice(&mic)
        .map_err(|_| SecurityError::InvalidLength)?;
    Ok(frame)
}

/// Authenticate and decrypt a secured command in place.
///
/// On success the frame is rewritten to its unsecured form (base header,
/// command id, payload). `key_for` picks the key named by the auxiliary
/// header.
pub fn unsecure_command<F>(
    cipher: &mut CipherService,
    frame: &mut ApsFrame,
    key_for: F,
) -> SecurityResult<AuxHeader>
where
    F: FnOnce(KeyId) -> Option<Key>,
{
    if frame.len() < SECURED_OVERHEAD {
        return Err(SecurityError::InvalidLength);
    }
    let aux = AuxHeader::decode(&frame[BASE_HEADER_LEN..])?;
    let key = key_for(aux.key_id).ok_or(SecurityError::NoKey)?;

    let header_len = BASE_HEADER_LEN + AUX_HEADER_LEN;
    let mic_at = frame.len() - MIC_LEN;
    let mut mic = [0u8; MIC_LEN];
    mic.copy_from_slice(&frame[mic_at..]);
    {
        let (aad, rest) = frame.split_at_mut(header_len);
        ccm::decrypt(cipher, &key, &aux.nonce(), aad, &mut rest[..mic_at - header_len], &mic)?;
    }

    frame[0] &= !FC_SECURITY;
    frame.copy_within(header_len..mic_at, BASE_HEADER_LEN);
    frame.truncate(mic_at - AUX_HEADER_LEN);
    Ok(aux)
}

/// Key transport component of the security manager
#[derive(Debug, Default)]
pub struct KeyTransport<C: TransportKeyCheck> {
    check: C,
}

impl<C: TransportKeyCheck> KeyTransport<C> {
    pub fn new(check: C) -> Self {
        Self { check }
    }

    /// APSME-TRANSPORT-KEY.request.
    ///
    /// Validation failures are confirmed through
    /// [`ApsNotify::TransportKeyConf`]; only a stopped layer or a full
    /// outgoing queue fail synchronously.
    pub fn request(
        &mut self,
        ctx: &mut ApsContext,
        cipher: &mut CipherService,
        req: &TransportKeyReq,
    ) -> ZbResult<()> {
        if !ctx.control.check_state(ApsComponents::SECURITY_MANAGER) {
            return Err(ZbError::NotPermitted);
        }
        if !ctx.can_send() {
            return Err(ZbError::QueueFull);
        }
        let mode = match self.check.check_transport_nwk_key_req(req) {
            Ok(mode) => mode,
            Err(status) => {
                log::debug!("aps: transport key to {:016x} refused: {}", req.dst_ext, status);
                Self::confirm(ctx, req.dst_ext, status);
                return Ok(());
            }
        };
        let Some(link_key) = ctx.keys.tc_link_key().copied() else {
            Self::confirm(ctx, req.dst_ext, ApsStatus::SecurityFail);
            return Ok(());
        };

        let body = TransportNwkKey {
            key: req.key,
            key_seq: req.key_seq,
            dst: req.dst_ext,
            src: ctx.ext_addr,
        };
        let counter = ctx.next_counter();
        let plain = body.encode(counter);
        let aux = AuxHeader::new(KeyId::KeyTransport, ctx.keys.next_frame_counter(), ctx.ext_addr);
        let secured = match secure_command(cipher, &link_key, counter, &aux, &plain[BASE_HEADER_LEN..]) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("aps: transport key not secured: {}", err);
                Self::confirm(ctx, req.dst_ext, ApsStatus::SecurityFail);
                return Ok(());
            }
        };

        let (dst, frame) = match mode {
            TransportMode::Direct => (req.dst_short, secured),
            TransportMode::Tunneled { via } => {
                let tunnel = TunnelCommand {
                    counter: ctx.next_counter(),
                    dst: req.dst_ext,
                    inner: &secured,
                };
                (via, tunnel.encode()?)
            }
        };
        ctx.send(dst, frame)?;
        log::debug!("aps: key {} to {:016x} via {:04x}", req.key_seq, req.dst_ext, dst);
        Self::confirm(ctx, req.dst_ext, ApsStatus::Success);
        Ok(())
    }

    fn confirm(ctx: &mut ApsContext, dst: ExtAddr, status: ApsStatus) {
        ctx.notify(ApsNotify::TransportKeyConf { dst, status });
    }

    /// APS command received from the network layer.
    ///
    /// Secured commands are decrypted first; a frame that fails to
    /// authenticate raises [`ApsNotify::SecurityFailure`] and is dropped.
    pub fn command_ind<R>(
        &mut self,
        ctx: &mut ApsContext,
        cipher: &mut CipherService,
        ind: &mut ApsCommandInd,
        resolve: R,
    ) -> bool
    where
        R: FnOnce(ExtAddr) -> Option<ShortAddr>,
    {
        if !ctx.control.check_state(ApsComponents::SECURITY_MANAGER) {
            log::debug!("aps: command from {:04x} dropped, security stopped", ind.src);
            return true;
        }
        let header = match CommandHeader::decode(&ind.frame) {
            Ok(header) => header,
            Err(err) => {
                log::debug!("aps: command dropped: {}", err);
                return true;
            }
        };
        if header.security {
            let keys = &ctx.keys;
            let result = unsecure_command(cipher, &mut ind.frame, |key_id| match key_id {
                KeyId::Network => keys.active_nwk_key().map(|entry| entry.key),
                _ => keys.tc_link_key().copied(),
            });
            if let Err(err) = result {
                log::warn!("aps: secured command from {:04x} rejected: {}", ind.src, err);
                ctx.notify(ApsNotify::SecurityFailure {
                    src: ind.src,
                    status: ApsStatus::SecurityFail,
                });
                return true;
            }
        }

        match ind.frame.get(COMMAND_HEADER_LEN - 1).copied() {
            Some(TRANSPORT_KEY_COMMAND_ID) => self.transport_nwk_key_ind(ctx, ind, resolve),
            Some(TUNNEL_COMMAND_ID) => self.tunnel_ind(ctx, ind, resolve),
            other => {
                log::debug!("aps: command {:?} not handled", other);
                true
            }
        }
    }

    /// Tunnel command received by the router next to the destination.
    ///
    /// The outer header and destination address are stripped and the
    /// tunneled command is forwarded in the same buffer.
    pub fn tunnel_ind<R>(&mut self, ctx: &mut ApsContext, ind: &mut ApsCommandInd, resolve: R) -> bool
    where
        R: FnOnce(ExtAddr) -> Option<ShortAddr>,
    {
        if !ctx.control.check_state(ApsComponents::SECURITY_MANAGER) {
            return true;
        }
        let dst = match TunnelCommand::decode(&ind.frame) {
            Ok(tunnel) => tunnel.dst,
            Err(err) => {
                log::debug!("aps: tunnel dropped: {}", err);
                return true;
            }
        };
        let Some(dst_short) = resolve(dst) else {
            log::debug!("aps: tunnel destination {:016x} unknown", dst);
            return true;
        };
        if !ctx.can_send() {
            log::warn!("aps: tunnel to {:016x} dropped, queue full", dst);
            return true;
        }

        let frame = &mut ind.frame;
        let len = frame.len();
        frame.copy_within(TUNNEL_HEADER_LEN..len, 0);
        frame.truncate(len - TUNNEL_HEADER_LEN);
        let forwarded = mem::take(frame);
        ctx.send(dst_short, forwarded).is_err()
    }

    /// Transport-Key command carrying a network key, already unsecured.
    ///
    /// A key for this device (or for every device) is installed. A key for
    /// one of our children is relayed to it in the same buffer.
    pub fn transport_nwk_key_ind<R>(
        &mut self,
        ctx: &mut ApsContext,
        ind: &mut ApsCommandInd,
        resolve: R,
    ) -> bool
    where
        R: FnOnce(ExtAddr) -> Option<ShortAddr>,
    {
        if !ctx.control.check_state(ApsComponents::SECURITY_MANAGER) {
            return true;
        }
        let body = match ind
            .frame
            .get(COMMAND_HEADER_LEN..)
            .ok_or(ZbError::InvalidLength)
            .and_then(TransportNwkKey::decode_payload)
        {
            Ok(body) => body,
            Err(err) => {
                log::debug!("aps: transport key dropped: {}", err);
                return true;
            }
        };

        let tc = ctx.config.trust_center_addr;
        if tc != UNKNOWN_EXT_ADDR && body.src != tc {
            log::warn!("aps: key from {:016x} is not from the trust center", body.src);
            return true;
        }

        if body.dst == ctx.ext_addr || body.dst == UNKNOWN_EXT_ADDR {
            ctx.keys.set_nwk_key(body.key, body.key_seq);
            ctx.notify(ApsNotify::TransportKeyInd {
                src: body.src,
                key_seq: body.key_seq,
            });
            return true;
        }

        if !ctx.config.relay_keys_to_children || !ctx.can_send() {
            return true;
        }
        let Some(child) = resolve(body.dst) else {
            log::debug!("aps: key for unknown device {:016x} dropped", body.dst);
            return true;
        };
        ind.frame[1] = ctx.next_counter();
        let relayed = mem::take(&mut ind.frame);
        log::debug!("aps: relaying key {} to {:04x}", body.key_seq, child);
        ctx.send(child, relayed).is_err()
    }
}
