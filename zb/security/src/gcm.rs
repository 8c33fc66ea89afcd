//! AES-128-GCM authenticated encryption with detached tags

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce, Tag};
use zb_core::Key;

use crate::{SecurityError, SecurityResult};

pub const GCM_NONCE_LEN: usize = 12;
pub const GCM_TAG_LEN: usize = 16;

/// Encrypt `buffer` in place; returns the tag
pub fn encrypt(
    key: &Key,
    nonce: &[u8; GCM_NONCE_LEN],
    aad: &[u8],
    buffer: &mut [u8],
) -> SecurityResult<[u8; GCM_TAG_LEN]> {
    let cipher = Aes128Gcm::new(key.into());
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, buffer)
        .map_err(|_| SecurityError::InvalidLength)?;
    let mut out = [0u8; GCM_TAG_LEN];
    out.copy_from_slice(tag.as_slice());
    Ok(out)
}

/// Decrypt `buffer` in place after verifying `tag`
pub fn decrypt(
    key: &Key,
    nonce: &[u8; GCM_NONCE_LEN],
    aad: &[u8],
    buffer: &mut [u8],
    tag: &[u8; GCM_TAG_LEN],
) -> SecurityResult<()> {
    let cipher = Aes128Gcm::new(key.into());
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, buffer, Tag::from_slice(tag))
        .map_err(|_| {
            log::warn!("gcm: tag mismatch");
            SecurityError::IntegrityFailure
        })
}
