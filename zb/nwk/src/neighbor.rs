//! Neighbor table

use heapless::Vec;
use zb_core::{DeviceType, ExtAddr, ExtPanId, PanId, ShortAddr};

use crate::mac::BeaconNotify;

pub const NEIGHBOR_TABLE_SIZE: usize = 16;

/// Relationship of a neighbor to this device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Relationship {
    Parent,
    Child,
    Sibling,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub ext_addr: ExtAddr,
    pub short_addr: ShortAddr,
    pub device_type: DeviceType,
    pub relationship: Relationship,
    pub rx_on_when_idle: bool,
    pub pan_id: PanId,
    pub ext_pan_id: ExtPanId,
    pub channel: u8,
    pub depth: u8,
    pub lqi: u8,
    pub permit_join: bool,
    pub router_capacity: bool,
    pub end_device_capacity: bool,
    pub update_id: u8,
    /// Already tried as a parent during the current join
    pub tried: bool,
}

impl Neighbor {
    pub fn child(ext_addr: ExtAddr, short_addr: ShortAddr, device_type: DeviceType) -> Self {
        Self {
            ext_addr,
            short_addr,
            device_type,
            relationship: Relationship::Child,
            rx_on_when_idle: device_type.is_router_capable(),
            pan_id: 0,
            ext_pan_id: 0,
            channel: 0,
            depth: 0,
            lqi: 0,
            permit_join: false,
            router_capacity: false,
            end_device_capacity: false,
            update_id: 0,
            tried: false,
        }
    }

    fn from_beacon(beacon: &BeaconNotify) -> Self {
        let device_type = if beacon.coord_short == zb_core::COORDINATOR_ADDR {
            DeviceType::Coordinator
        } else {
            DeviceType::Router
        };
        Self {
            ext_addr: beacon.coord_ext,
            short_addr: beacon.coord_short,
            device_type,
            relationship: Relationship::None,
            rx_on_when_idle: true,
            pan_id: beacon.pan_id,
            ext_pan_id: beacon.payload.ext_pan_id,
            channel: beacon.channel,
            depth: beacon.payload.device_depth,
            lqi: beacon.lqi,
            permit_join: beacon.permit_join,
            router_capacity: beacon.payload.router_capacity,
            end_device_capacity: beacon.payload.end_device_capacity,
            update_id: beacon.payload.update_id,
            tried: false,
        }
    }
}

/// Bounded neighbor table keyed by IEEE address
#[derive(Debug, Default)]
pub struct NeighborTable {
    entries: Vec<Neighbor, NEIGHBOR_TABLE_SIZE>,
}

impl NeighborTable {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.entries.iter()
    }

    pub fn find_ext(&self, ext_addr: ExtAddr) -> Option<&Neighbor> {
        self.entries.iter().find(|n| n.ext_addr == ext_addr)
    }

    pub fn find_short(&self, short_addr: ShortAddr) -> Option<&Neighbor> {
        self.entries.iter().find(|n| n.short_addr == short_addr)
    }

    /// Insert or replace; returns `false` when the table is full
    pub fn upsert(&mut self, neighbor: Neighbor) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|n| n.ext_addr == neighbor.ext_addr) {
            *entry = neighbor;
            return true;
        }
        self.entries.push(neighbor).is_ok()
    }

    /// Refresh from a received beacon, keeping relationship and tried flag
    pub fn update_from_beacon(&mut self, beacon: &BeaconNotify) -> bool {
        let fresh = Neighbor::from_beacon(beacon);
        if let Some(entry) = self.entries.iter_mut().find(|n| n.ext_addr == fresh.ext_addr) {
            *entry = Neighbor {
                relationship: entry.relationship,
                tried: entry.tried,
                ..fresh
            };
            return true;
        }
        self.entries.push(fresh).is_ok()
    }

    pub fn remove(&mut self, ext_addr: ExtAddr) -> Option<Neighbor> {
        let index = self.entries.iter().position(|n| n.ext_addr == ext_addr)?;
        Some(self.entries.swap_remove(index))
    }

    pub fn is_child(&self, ext_addr: ExtAddr) -> bool {
        self.find_ext(ext_addr)
            .is_some_and(|n| n.relationship == Relationship::Child)
    }

    pub fn parent(&self) -> Option<&Neighbor> {
        self.entries.iter().find(|n| n.relationship == Relationship::Parent)
    }

    pub fn set_relationship(&mut self, ext_addr: ExtAddr, relationship: Relationship) {
        if let Some(entry) = self.entries.iter_mut().find(|n| n.ext_addr == ext_addr) {
            entry.relationship = relationship;
        }
    }

    /// First child, if any
    pub fn first_child(&self) -> Option<&Neighbor> {
        self.entries.iter().find(|n| n.relationship == Relationship::Child)
    }

    pub fn child_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|n| n.relationship == Relationship::Child)
            .count()
    }

    pub fn mark_tried(&mut self, ext_addr: ExtAddr) {
        if let Some(entry) = self.entries.iter_mut().find(|n| n.ext_addr == ext_addr) {
            entry.tried = true;
        }
    }

    pub fn clear_tried(&mut self) {
        self.entries.iter_mut().for_each(|n| n.tried = false);
    }

    /// Pick the best untried parent candidate.
    ///
    /// Candidates match `ext_pan_id` (any network when zero) and have room
    /// for `device_type`; association additionally needs permit-join. Best
    /// link quality wins, then the shallowest depth.
    pub fn select_parent(
        &self,
        ext_pan_id: ExtPanId,
        device_type: DeviceType,
        need_permit_join: bool,
        max_depth: u8,
    ) -> Option<Neighbor> {
        self.entries
            .iter()
            .filter(|n| !n.tried && n.relationship != Relationship::Child)
            .filter(|n| ext_pan_id == 0 || n.ext_pan_id == ext_pan_id)
            .filter(|n| !need_permit_join || n.permit_join)
            .filter(|n| n.depth < max_depth)
            .filter(|n| match device_type {
                DeviceType::EndDevice => n.end_device_capacity,
                _ => n.router_capacity,
            })
            .max_by(|a, b| a.lqi.cmp(&b.lqi).then(b.depth.cmp(&a.depth)))
            .copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
