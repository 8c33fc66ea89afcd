//! Network and link key storage

use zb_core::{Key, KeySeqNum};

/// A network key with its sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NwkKeyEntry {
    pub key: Key,
    pub seq: KeySeqNum,
}

#[derive(Debug, Default)]
pub struct KeyStorage {
    active: Option<NwkKeyEntry>,
    alternate: Option<NwkKeyEntry>,
    tc_link_key: Option<Key>,
    outgoing_frame_counter: u32,
}

impl KeyStorage {
    pub const fn new() -> Self {
        Self {
            active: None,
            alternate: None,
            tc_link_key: None,
            outgoing_frame_counter: 0,
        }
    }

    /// Store a network key.
    ///
    /// The first key, or a key with the active sequence number, becomes
    /// active. Any other key waits in the alternate slot until switched to.
    pub fn set_nwk_key(&mut self, key: Key, seq: KeySeqNum) {
        let entry = NwkKeyEntry { key, seq };
        match self.active {
            None => self.active = Some(entry),
            Some(active) if active.seq == seq => self.active = Some(entry),
            Some(_) => self.alternate = Some(entry),
        }
        log::debug!("aps: network key {} stored", seq);
    }

    /// Make the alternate key with `seq` active; the old key becomes alternate
    pub fn switch_nwk_key(&mut self, seq: KeySeqNum) -> bool {
        match self.alternate {
            Some(alternate) if alternate.seq == seq => {
                self.alternate = self.active.replace(alternate);
                self.outgoing_frame_counter = 0;
                log::info!("aps: switched to network key {}", seq);
                true
            }
            _ => false,
        }
    }

    pub fn active_nwk_key(&self) -> Option<&NwkKeyEntry> {
        self.active.as_ref()
    }

    pub fn nwk_key(&self, seq: KeySeqNum) -> Option<&NwkKeyEntry> {
        [self.active.as_ref(), self.alternate.as_ref()]
            .into_iter()
            .flatten()
            .find(|entry| entry.seq == seq)
    }

    pub fn set_tc_link_key(&mut self, key: Key) {
        self.tc_link_key = Some(key);
    }

    pub fn tc_link_key(&self) -> Option<&Key> {
        self.tc_link_key.as_ref()
    }

    pub fn frame_counter(&self) -> u32 {
        self.outgoing_frame_counter
    }

    /// Counter value for the next secured frame
    pub fn next_frame_counter(&mut self) -> u32 {
        let counter = self.outgoing_frame_counter;
        self.outgoing_frame_counter = counter.wrapping_add(1);
        counter
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
