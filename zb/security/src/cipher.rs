//! Symmetric block-cipher service
//!
//! Upper layers hand the service a request (command, text, block count). At
//! most one request is in flight: a second request while one is pending is
//! refused with `nb::Error::WouldBlock`. The request is executed when the
//! dispatcher runs the service task and its confirmation carries the
//! transformed text back.
//!
//! CBC keeps a chaining register across requests so that a long CBC-MAC can
//! be fed in several pieces. Installing a key or resetting the service
//! clears the register.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use heapless::Vec;
use zb_core::Key;

use crate::{SecurityError, SecurityResult};

/// Cipher block size in bytes
pub const BLOCK_SIZE: usize = 16;
/// Largest request the service accepts, in blocks
pub const MAX_BLOCKS: usize = 4;

/// Request payload storage
pub type CipherText = Vec<u8, { MAX_BLOCKS * BLOCK_SIZE }>;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Operation requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CipherCommand {
    SetKey = 0,
    EcbEncrypt = 1,
    CbcEncrypt = 2,
    EcbDecrypt = 3,
    CbcDecrypt = 4,
}

impl TryFrom<u8> for CipherCommand {
    type Error = SecurityError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(CipherCommand::SetKey),
            1 => Ok(CipherCommand::EcbEncrypt),
            2 => Ok(CipherCommand::CbcEncrypt),
            3 => Ok(CipherCommand::EcbDecrypt),
            4 => Ok(CipherCommand::CbcDecrypt),
            _ => Err(SecurityError::InvalidHeader),
        }
    }
}

/// A queued cipher request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherRequest {
    pub command: CipherCommand,
    pub text: CipherText,
    pub block_count: u8,
}

impl CipherRequest {
    /// Build a request over `text`, which must be `block_count` whole blocks
    pub fn new(command: CipherCommand, text: &[u8]) -> SecurityResult<Self> {
        if text.is_empty() || text.len() % BLOCK_SIZE != 0 {
            return Err(SecurityError::InvalidLength);
        }
        let text = CipherText::from_slice(text).map_err(|_| SecurityError::InvalidLength)?;
        let block_count = (text.len() / BLOCK_SIZE) as u8;
        Ok(Self {
            command,
            text,
            block_count,
        })
    }
}

/// Completion of a cipher request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherConfirm {
    pub command: CipherCommand,
    pub text: CipherText,
    pub status: SecurityResult<()>,
}

/// AES-128 block service with one pending request
pub struct CipherService {
    key: Option<Key>,
    chain: [u8; BLOCK_SIZE],
    pending: Option<CipherRequest>,
}

impl CipherService {
    pub const fn new() -> Self {
        Self {
            key: None,
            chain: [0; BLOCK_SIZE],
            pending: None,
        }
    }

    /// Queue a request; refused while another one is pending
    pub fn request(&mut self, request: CipherRequest) -> nb::Result<(), SecurityError> {
        if self.pending.is_some() {
            return Err(nb::Error::WouldBlock);
        }
        if usize::from(request.block_count) * BLOCK_SIZE != request.text.len() {
            return Err(nb::Error::Other(SecurityError::InvalidLength));
        }
        log::trace!("cipher request {:?} x{}", request.command, request.block_count);
        self.pending = Some(request);
        Ok(())
    }

    /// `true` while a request waits for the task handler
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Execute the pending request, if any, and return its confirmation
    pub fn task_handler(&mut self) -> Option<CipherConfirm> {
        let mut request = self.pending.take()?;
        let status = self.process(request.command, &mut request.text);
        Some(CipherConfirm {
            command: request.command,
            text: request.text,
            status,
        })
    }

    /// Drop the pending request and forget the chaining state
    pub fn reset(&mut self) {
        self.pending = None;
        self.chain = [0; BLOCK_SIZE];
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Run a command synchronously over `text`
    pub fn process(&mut self, command: CipherCommand, text: &mut [u8]) -> SecurityResult<()> {
        if text.is_empty() || text.len() % BLOCK_SIZE != 0 {
            return Err(SecurityError::InvalidLength);
        }
        if command == CipherCommand::SetKey {
            let mut key = [0u8; BLOCK_SIZE];
            key.copy_from_slice(&text[..BLOCK_SIZE]);
            self.key = Some(key);
            self.chain = [0; BLOCK_SIZE];
            return Ok(());
        }

        let key = self.key.ok_or(SecurityError::NoKey)?;
        let len = text.len();
        match command {
            CipherCommand::SetKey => {}
            CipherCommand::EcbEncrypt => {
                let aes = Aes128::new(&key.into());
                for block in text.chunks_exact_mut(BLOCK_SIZE) {
                    aes.encrypt_block(GenericArray::from_mut_slice(block));
                }
            }
            CipherCommand::EcbDecrypt => {
                let aes = Aes128::new(&key.into());
                for block in text.chunks_exact_mut(BLOCK_SIZE) {
                    aes.decrypt_block(GenericArray::from_mut_slice(block));
                }
            }
            CipherCommand::CbcEncrypt => {
                Aes128CbcEnc::new(&key.into(), &self.chain.into())
                    .encrypt_padded_mut::<NoPadding>(text, len)
                    .map_err(|_| SecurityError::InvalidLength)?;
                self.chain.copy_from_slice(&text[len - BLOCK_SIZE..]);
            }
            CipherCommand::CbcDecrypt => {
                let mut next_chain = [0u8; BLOCK_SIZE];
                next_chain.copy_from_slice(&text[len - BLOCK_SIZE..]);
                Aes128CbcDec::new(&key.into(), &self.chain.into())
                    .decrypt_padded_mut::<NoPadding>(text)
                    .map_err(|_| SecurityError::InvalidLength)?;
                self.chain = next_chain;
            }
        }
        Ok(())
    }

    /// Install `key` synchronously
    pub fn set_key(&mut self, key: &Key) {
        self.key = Some(*key);
        self.chain = [0; BLOCK_SIZE];
    }

    /// Encrypt one block in place with the installed key
    pub fn encrypt_block(&mut self, block: &mut [u8; BLOCK_SIZE]) -> SecurityResult<()> {
        self.process(CipherCommand::EcbEncrypt, block)
    }
}

impl Default for CipherService {
    fn default() -> Self {
        Self::new()
    }
}
