//! CCM* authenticated encryption
//!
//! Built on the block service: CBC-MAC runs through `CbcEncrypt` with the
//! chaining register starting from zero after the key is installed, the
//! keystream through `EcbEncrypt`. Length field size is 2 octets, so the
//! nonce is 13. The stack frames use a 4-byte MIC (security level 5);
//! [`encrypt_with_mic`] and [`decrypt_with_mic`] accept any even MIC
//! length from 4 to 16.

use zb_core::Key;

use crate::cipher::{CipherCommand, CipherService, BLOCK_SIZE};
use crate::{SecurityError, SecurityResult};

/// Nonce length in octets
pub const NONCE_LEN: usize = 13;
/// Message integrity code length in octets
pub const MIC_LEN: usize = 4;

const L_FIELD: u8 = 2;
const FLAG_ADATA: u8 = 0x40;

fn check_mic_len(mic_len: usize) -> SecurityResult<()> {
    if (4..=16).contains(&mic_len) && mic_len % 2 == 0 {
        Ok(())
    } else {
        Err(SecurityError::InvalidLength)
    }
}

fn counter_block(nonce: &[u8; NONCE_LEN], counter: u16) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[0] = L_FIELD - 1;
    block[1..14].copy_from_slice(nonce);
    block[14..].copy_from_slice(&counter.to_be_bytes());
    block
}

fn mac_feed(cipher: &mut CipherService, data: &[u8], last: &mut [u8; BLOCK_SIZE]) -> SecurityResult<()> {
    for chunk in data.chunks(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);
        cipher.process(CipherCommand::CbcEncrypt, &mut block)?;
        *last = block;
    }
    Ok(())
}

fn compute_tag<const M: usize>(
    cipher: &mut CipherService,
    key: &Key,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> SecurityResult<[u8; M]> {
    check_mic_len(M)?;
    if plaintext.len() > usize::from(u16::MAX) || aad.len() >= 0xFF00 {
        return Err(SecurityError::InvalidLength);
    }
    cipher.set_key(key);

    let mut b0 = [0u8; BLOCK_SIZE];
    b0[0] = ((((M as u8) - 2) / 2) << 3) | (L_FIELD - 1) | if aad.is_empty() { 0 } else { FLAG_ADATA };
    b0[1..14].copy_from_slice(nonce);
    b0[14..].copy_from_slice(&(plaintext.len() as u16).to_be_bytes());

    let mut last = [0u8; BLOCK_SIZE];
    mac_feed(cipher, &b0, &mut last)?;

    if !aad.is_empty() {
        // the 2-byte length prefix shifts aad off block boundaries
        let mut block = [0u8; BLOCK_SIZE];
        block[..2].copy_from_slice(&(aad.len() as u16).to_be_bytes());
        let head = aad.len().min(BLOCK_SIZE - 2);
        block[2..2 + head].copy_from_slice(&aad[..head]);
        mac_feed(cipher, &block, &mut last)?;
        mac_feed(cipher, &aad[head..], &mut last)?;
    }
    mac_feed(cipher, plaintext, &mut last)?;

    let mut tag = [0u8; M];
    tag.copy_from_slice(&last[..M]);
    Ok(tag)
}

fn apply_keystream(cipher: &mut CipherService, nonce: &[u8; NONCE_LEN], data: &mut [u8]) -> SecurityResult<()> {
    for (index, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
        let mut stream = counter_block(nonce, (index + 1) as u16);
        cipher.encrypt_block(&mut stream)?;
        chunk.iter_mut().zip(stream.iter()).for_each(|(b, s)| *b ^= s);
    }
    Ok(())
}

fn mask_tag<const M: usize>(cipher: &mut CipherService, nonce: &[u8; NONCE_LEN], tag: &mut [u8; M]) -> SecurityResult<()> {
    let mut s0 = counter_block(nonce, 0);
    cipher.encrypt_block(&mut s0)?;
    tag.iter_mut().zip(s0.iter()).for_each(|(t, s)| *t ^= s);
    Ok(())
}

/// Encrypt `payload` in place and return the 4-byte MIC over `aad || payload`
pub fn encrypt(
    cipher: &mut CipherService,
    key: &Key,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    payload: &mut [u8],
) -> SecurityResult<[u8; MIC_LEN]> {
    encrypt_with_mic::<MIC_LEN>(cipher, key, nonce, aad, payload)
}

/// Decrypt `payload` in place and check the 4-byte `mic`
pub fn decrypt(
    cipher: &mut CipherService,
    key: &Key,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    payload: &mut [u8],
    mic: &[u8; MIC_LEN],
) -> SecurityResult<()> {
    decrypt_with_mic::<MIC_LEN>(cipher, key, nonce, aad, payload, mic)
}

pub fn encrypt_with_mic<const M: usize>(
    cipher: &mut CipherService,
    key: &Key,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    payload: &mut [u8],
) -> SecurityResult<[u8; M]> {
    let mut tag = compute_tag::<M>(cipher, key, nonce, aad, payload)?;
    apply_keystream(cipher, nonce, payload)?;
    mask_tag(cipher, nonce, &mut tag)?;
    Ok(tag)
}

/// On a MIC mismatch the payload is wiped and `IntegrityFailure` returned.
pub fn decrypt_with_mic<const M: usize>(
    cipher: &mut CipherService,
    key: &Key,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    payload: &mut [u8],
    mic: &[u8; M],
) -> SecurityResult<()> {
    check_mic_len(M)?;
    cipher.set_key(key);
    apply_keystream(cipher, nonce, payload)?;
    let mut expected = compute_tag::<M>(cipher, key, nonce, aad, payload)?;
    mask_tag(cipher, nonce, &mut expected)?;

    let diff = expected.iter().zip(mic.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff != 0 {
        payload.iter_mut().for_each(|b| *b = 0);
        log::warn!("ccm: MIC mismatch");
        return Err(SecurityError::IntegrityFailure);
    }
    Ok(())
}
