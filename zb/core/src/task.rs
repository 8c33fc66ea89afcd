//! Component task sets
//!
//! A layer owns one `TaskSet`. Components post their task bit when they have
//! work; the layer's task handler takes the lowest set bit first, so bit
//! order is priority order.

/// Bit-set of posted component tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSet(u16);

impl TaskSet {
    pub const EMPTY: Self = Self(0);

    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Post task `id` (0..16)
    pub fn post(&mut self, id: u8) {
        if id < 16 {
            self.0 |= 1 << id;
        }
    }

    pub fn clear(&mut self, id: u8) {
        if id < 16 {
            self.0 &= !(1 << id);
        }
    }

    pub const fn is_posted(&self, id: u8) -> bool {
        id < 16 && (self.0 & (1 << id)) != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Remove and return the highest-priority posted task
    pub fn take_next(&mut self) -> Option<u8> {
        if self.0 == 0 {
            return None;
        }
        let id = self.0.trailing_zeros() as u8;
        self.0 &= !(1 << id);
        Some(id)
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskSet {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "TaskSet({=u16:b})", self.0);
    }
}
