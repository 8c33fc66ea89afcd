#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # ZigBee Core
//!
//! Shared vocabulary for the NWK and APS layers: addresses, protocol status
//! codes, bounded request queues, millisecond application timers and the
//! task bit-sets every layer uses to schedule its components cooperatively.

use core::fmt;

pub mod assert;
pub mod queue;
pub mod status;
pub mod task;
pub mod time;
pub mod types;

pub use queue::*;
pub use status::*;
pub use task::*;
pub use time::*;
pub use assert::codes;
pub use types::*;

#[cfg(test)]
mod tests;

/// Stack version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the stack
pub type ZbResult<T> = Result<T, ZbError>;

/// Synchronous failures raised by stack operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZbError {
    /// Request queue is full
    QueueFull,
    /// Request queue is empty
    QueueEmpty,
    /// A component is busy with a previous request
    Busy,
    /// A request parameter is out of range
    InvalidParameter,
    /// A frame has the wrong length for its type
    InvalidLength,
    /// A frame field carries an unknown value
    InvalidFrame,
    /// Caller buffer is too small for the result
    BufferTooSmall,
    /// The current state does not permit the operation
    NotPermitted,
}

impl fmt::Display for ZbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZbError::QueueFull => write!(f, "Request queue is full"),
            ZbError::QueueEmpty => write!(f, "Request queue is empty"),
            ZbError::Busy => write!(f, "Component is busy"),
            ZbError::InvalidParameter => write!(f, "Invalid request parameter"),
            ZbError::InvalidLength => write!(f, "Invalid frame length"),
            ZbError::InvalidFrame => write!(f, "Malformed frame"),
            ZbError::BufferTooSmall => write!(f, "Buffer too small"),
            ZbError::NotPermitted => write!(f, "Operation not permitted in current state"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ZbError {}

#[cfg(feature = "defmt")]
impl defmt::Format for ZbError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ZbError::QueueFull => defmt::write!(fmt, "QueueFull"),
            ZbError::QueueEmpty => defmt::write!(fmt, "QueueEmpty"),
            ZbError::Busy => defmt::write!(fmt, "Busy"),
            ZbError::InvalidParameter => defmt::write!(fmt, "InvalidParameter"),
            ZbError::InvalidLength => defmt::write!(fmt, "InvalidLength"),
            ZbError::InvalidFrame => defmt::write!(fmt, "InvalidFrame"),
            ZbError::BufferTooSmall => defmt::write!(fmt, "BufferTooSmall"),
            ZbError::NotPermitted => defmt::write!(fmt, "NotPermitted"),
        }
    }
}
