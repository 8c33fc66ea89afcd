//! PAN ID conflict report
//!
//! A joined device that hears a beacon carrying its own PAN ID with a
//! different extended PAN ID scans the neighbourhood, collects the PAN IDs
//! in use and unicasts a report command to the network manager:
//!
//! Idle → Scan → PrepareMacData → Send → Timeout → Idle
//!
//! After a report has gone out further conflicts are ignored until the
//! report timeout expires.

use heapless::Vec;
use zb_core::{AppTimer, NwkStatus, PanId, TimerMode};

use crate::context::{Component, NwkContext, REPORT_TASK};
use crate::frame::{NwkCommand, NwkHeader, ReportCommand, MAX_REPORT_PANID, REPORT_TYPE_PANID_CONFLICT};
use crate::mac::{BeaconNotify, MacConfirm, MacFrame, MacPrimitive, MacService, MacUser, ScanType};
use crate::notify::{NwkNotify, ReportInd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportState {
    Idle = 0x27,
    Scan = 0x51,
    PrepareMacData = 0x52,
    Send = 0x54,
    Timeout = 0x55,
}

/// Report entry points the layer relies on.
pub trait ReportService<M: MacService>: Component<M> {
    /// Check a beacon for a conflict and start a report when one is found
    fn detect_pan_id_conflict(&mut self, ctx: &mut NwkContext<M>, beacon: &BeaconNotify) -> bool;

    /// Beacon heard while scanning
    fn beacon_ind(&mut self, beacon: &BeaconNotify);

    /// Report command received
    fn frame_ind(&mut self, ctx: &mut NwkContext<M>, header: &NwkHeader, report: ReportCommand);
}

/// Work in progress: scan parameters or the hold-off timer
#[derive(Debug, Clone, Copy)]
enum ReportParam {
    None,
    Scan { channels: u32, duration: u8 },
    Timer(AppTimer),
}

#[derive(Debug)]
pub struct ReportCommandReq {
    state: ReportState,
    param: ReportParam,
    pan_ids: Vec<PanId, MAX_REPORT_PANID>,
    frame: Option<MacFrame>,
}

impl ReportCommandReq {
    pub const fn new() -> Self {
        Self {
            state: ReportState::Idle,
            param: ReportParam::None,
            pan_ids: Vec::new(),
            frame: None,
        }
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    /// PAN IDs collected for the current report
    pub fn pan_ids(&self) -> &[PanId] {
        &self.pan_ids
    }

    fn enter<M: MacService>(&mut self, ctx: &mut NwkContext<M>, state: ReportState) {
        self.wait(state);
        ctx.post_task(REPORT_TASK);
    }

    fn wait(&mut self, state: ReportState) {
        log::debug!("report: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn add_pan_id(&mut self, pan_id: PanId) {
        if !self.pan_ids.contains(&pan_id) && self.pan_ids.push(pan_id).is_err() {
            log::trace!("report: PAN ID list full, 0x{:04x} dropped", pan_id);
        }
    }

    fn prepare<M: MacService>(&mut self, ctx: &mut NwkContext<M>) {
        let report = ReportCommand {
            report_type: REPORT_TYPE_PANID_CONFLICT,
            ext_pan_id: ctx.nib.ext_pan_id,
            pan_ids: self.pan_ids.clone(),
        };
        let radius = ctx.config.max_depth.saturating_mul(2);
        let seq = ctx.nib.next_seq();
        let header = NwkHeader::command(ctx.config.manager_addr, ctx.nib.short_addr, radius, seq)
            .with_src_ext(ctx.nib.ext_addr);
        match header.encode(&NwkCommand::Report(report).encode()) {
            Ok(frame) => {
                self.frame = Some(frame);
                self.enter(ctx, ReportState::Send);
            }
            Err(err) => {
                log::error!("report: encoding failed: {}", err);
                self.finish();
            }
        }
    }

    fn finish(&mut self) {
        self.wait(ReportState::Idle);
        self.param = ReportParam::None;
        self.pan_ids.clear();
        self.frame = None;
    }
}

impl Default for ReportCommandReq {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MacService> Component<M> for ReportCommandReq {
    fn task_handler(&mut self, ctx: &mut NwkContext<M>) {
        match self.state {
            ReportState::Scan => {
                if let ReportParam::Scan { channels, duration } = self.param {
                    ctx.request(
                        MacUser::Report,
                        MacPrimitive::Scan {
                            scan_type: ScanType::Active,
                            channels,
                            duration,
                        },
                    );
                }
            }
            ReportState::PrepareMacData => self.prepare(ctx),
            ReportState::Send => {
                if let Some(frame) = self.frame.take() {
                    let dst = ctx.config.manager_addr;
                    ctx.request(
                        MacUser::Report,
                        MacPrimitive::Data {
                            dst,
                            frame,
                            ack: !zb_core::is_broadcast(dst),
                        },
                    );
                }
            }
            ReportState::Idle | ReportState::Timeout => {}
        }
    }

    fn mac_confirm(&mut self, ctx: &mut NwkContext<M>, confirm: MacConfirm) {
        match self.state {
            ReportState::Scan => {
                // a scan that ended without beacons still reports the conflict
                self.param = ReportParam::None;
                self.enter(ctx, ReportState::PrepareMacData);
            }
            ReportState::Send => {
                let status = NwkStatus::from(confirm.status);
                log::info!("report: sent to 0x{:04x}: {}", ctx.config.manager_addr, status);
                let mut timer = AppTimer::new();
                timer.start(ctx.config.report_timeout, TimerMode::OneShot);
                self.param = ReportParam::Timer(timer);
                self.wait(ReportState::Timeout);
            }
            _ => log::warn!("report: unexpected MAC confirm in {:?}", self.state),
        }
    }

    fn tick(&mut self, _ctx: &mut NwkContext<M>, elapsed: u32) {
        if let ReportParam::Timer(timer) = &mut self.param {
            if timer.advance(elapsed) {
                self.finish();
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn is_idle(&self) -> bool {
        self.state == ReportState::Idle
    }
}

impl<M: MacService> ReportService<M> for ReportCommandReq {
    fn detect_pan_id_conflict(&mut self, ctx: &mut NwkContext<M>, beacon: &BeaconNotify) -> bool {
        let nib = &ctx.nib;
        let conflict = nib.joined
            && beacon.pan_id == nib.pan_id
            && beacon.payload.ext_pan_id != nib.ext_pan_id;
        if !conflict || self.state != ReportState::Idle {
            return false;
        }
        log::warn!(
            "report: PAN ID 0x{:04x} also used by {:016x}",
            beacon.pan_id,
            beacon.payload.ext_pan_id
        );
        self.pan_ids.clear();
        self.add_pan_id(beacon.pan_id);
        self.param = ReportParam::Scan {
            channels: ctx.config.report_scan_channels,
            duration: ctx.config.report_scan_duration,
        };
        self.enter(ctx, ReportState::Scan);
        true
    }

    fn beacon_ind(&mut self, beacon: &BeaconNotify) {
        if self.state == ReportState::Scan {
            self.add_pan_id(beacon.pan_id);
        }
    }

    fn frame_ind(&mut self, ctx: &mut NwkContext<M>, header: &NwkHeader, report: ReportCommand) {
        if ctx.nib.short_addr != ctx.config.manager_addr {
            return;
        }
        if report.report_type != REPORT_TYPE_PANID_CONFLICT {
            log::debug!("report: type {} ignored", report.report_type);
            return;
        }
        ctx.notify(NwkNotify::ReportInd(ReportInd {
            src: header.src,
            ext_pan_id: report.ext_pan_id,
            pan_ids: report.pan_ids,
        }));
    }
}

/// Report stand-in for builds without PAN ID conflict detection
#[derive(Debug, Default)]
pub struct ReportDisabled;

impl<M: MacService> Component<M> for ReportDisabled {
    fn task_handler(&mut self, _ctx: &mut NwkContext<M>) {}
    fn mac_confirm(&mut self, _ctx: &mut NwkContext<M>, _confirm: MacConfirm) {}
    fn tick(&mut self, _ctx: &mut NwkContext<M>, _elapsed: u32) {}
    fn reset(&mut self) {}
    fn is_idle(&self) -> bool {
        true
    }
}

impl<M: MacService> ReportService<M> for ReportDisabled {
    fn detect_pan_id_conflict(&mut self, _ctx: &mut NwkContext<M>, _beacon: &BeaconNotify) -> bool {
        false
    }

    fn beacon_ind(&mut self, _beacon: &BeaconNotify) {}

    fn frame_ind(&mut self, _ctx: &mut NwkContext<M>, _header: &NwkHeader, _report: ReportCommand) {}
}
