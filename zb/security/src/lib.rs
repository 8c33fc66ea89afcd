#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # ZigBee Security
//!
//! The symmetric cipher service used by the NWK and APS layers, and the
//! authenticated modes built on top of it:
//!
//! - [`CipherService`]: set-key, ECB and CBC over whole 16-byte blocks with a
//!   single request in flight
//! - [`ccm`]: CCM* with a 4-byte MIC as used for secured NWK and APS frames
//! - [`gcm`]: AES-GCM authenticated encryption
//! - [`aux_header`]: the 13-byte auxiliary security header

use core::fmt;

pub mod aux_header;
pub mod ccm;
pub mod cipher;
pub mod gcm;

pub use aux_header::*;
pub use cipher::*;

/// Result type for security operations
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Security failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityError {
    /// Authentication tag did not match; the plaintext is withheld
    IntegrityFailure,
    /// No key installed
    NoKey,
    /// Input is not a whole number of blocks or exceeds the buffer
    InvalidLength,
    /// Security header carries unsupported values
    InvalidHeader,
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityError::IntegrityFailure => write!(f, "Message integrity check failed"),
            SecurityError::NoKey => write!(f, "No key installed"),
            SecurityError::InvalidLength => write!(f, "Invalid cipher input length"),
            SecurityError::InvalidHeader => write!(f, "Invalid security header"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SecurityError {}

#[cfg(feature = "defmt")]
impl defmt::Format for SecurityError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SecurityError::IntegrityFailure => defmt::write!(fmt, "IntegrityFailure"),
            SecurityError::NoKey => defmt::write!(fmt, "NoKey"),
            SecurityError::InvalidLength => defmt::write!(fmt, "InvalidLength"),
            SecurityError::InvalidHeader => defmt::write!(fmt, "InvalidHeader"),
        }
    }
}

#[cfg(test)]
mod tests;
