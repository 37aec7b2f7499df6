//! Standard security handler, revisions 2 and 3
//!
//! Password-based key derivation and authentication for RC4-encrypted
//! documents: 40-bit keys for revision 2, up to 128-bit for revision 3.
//! The stored owner key (`O`) and user key (`U`) are verification values;
//! the file key derived from a verified password drives all per-object
//! decryption.

use crate::parser::ObjectKey;

use super::rc4::Rc4;

/// Padding string applied to every password before hashing.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Handler revision. Revisions 4 and later use a different scheme and are
/// rejected before a handler is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityRevision {
    R2,
    R3,
}

/// Key-derivation state machine for one document.
#[derive(Debug, Clone)]
pub struct StandardSecurityHandler {
    revision: SecurityRevision,
    /// File key length in bytes: 5 for revision 2, 5 to 16 for revision 3.
    key_length: usize,
}

impl StandardSecurityHandler {
    pub fn new(revision: SecurityRevision, key_length: usize) -> Self {
        let key_length = match revision {
            SecurityRevision::R2 => 5,
            SecurityRevision::R3 => key_length.clamp(5, 16),
        };
        Self {
            revision,
            key_length,
        }
    }

    /// The 40-bit default used when writing new documents.
    pub fn rc4_40bit() -> Self {
        Self::new(SecurityRevision::R2, 5)
    }

    pub fn revision(&self) -> SecurityRevision {
        self.revision
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    /// Pad or truncate a password to the 32-byte block.
    fn pad_password(password: &[u8]) -> [u8; 32] {
        let mut padded = [0u8; 32];
        let take = password.len().min(32);
        padded[..take].copy_from_slice(&password[..take]);
        padded[take..].copy_from_slice(&PASSWORD_PADDING[..32 - take]);
        padded
    }

    /// The RC4 key protecting the stored owner key: iterated MD5 of the
    /// padded password, truncated to the file key length.
    fn owner_rc4_key(&self, password: &[u8]) -> Vec<u8> {
        let mut digest = md5::compute(Self::pad_password(password));
        if self.revision == SecurityRevision::R3 {
            for _ in 0..50 {
                digest = md5::compute(*digest);
            }
        }
        digest[..self.key_length].to_vec()
    }

    /// Compute the stored owner key `O`: the padded user password
    /// RC4-encrypted under the owner password's key. An empty owner
    /// password falls back to the user password.
    pub fn compute_owner_key(&self, owner_password: &[u8], user_password: &[u8]) -> Vec<u8> {
        let password = if owner_password.is_empty() {
            user_password
        } else {
            owner_password
        };
        let key = self.owner_rc4_key(password);
        let mut value = Rc4::process(&key, &Self::pad_password(user_password));
        if self.revision == SecurityRevision::R3 {
            for round in 1u8..=19 {
                let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
                value = Rc4::process(&round_key, &value);
            }
        }
        value
    }

    /// Derive the file key from a user password and the stored values.
    pub fn compute_file_key(
        &self,
        user_password: &[u8],
        owner_key: &[u8],
        permissions: u32,
        document_id: &[u8],
    ) -> Vec<u8> {
        let mut input = Vec::with_capacity(32 + owner_key.len() + 4 + document_id.len());
        input.extend_from_slice(&Self::pad_password(user_password));
        input.extend_from_slice(owner_key);
        input.extend_from_slice(&permissions.to_le_bytes());
        input.extend_from_slice(document_id);
        let mut digest = md5::compute(&input);
        if self.revision == SecurityRevision::R3 {
            for _ in 0..50 {
                digest = md5::compute(&digest[..self.key_length]);
            }
        }
        digest[..self.key_length].to_vec()
    }

    /// Compute the stored user key `U` for a given file key.
    pub fn compute_user_key(&self, file_key: &[u8], document_id: &[u8]) -> [u8; 32] {
        let mut value = [0u8; 32];
        match self.revision {
            SecurityRevision::R2 => {
                value.copy_from_slice(&Rc4::process(file_key, &PASSWORD_PADDING));
            }
            SecurityRevision::R3 => {
                let mut input = Vec::with_capacity(32 + document_id.len());
                input.extend_from_slice(&PASSWORD_PADDING);
                input.extend_from_slice(document_id);
                let digest = md5::compute(&input);
                let mut head = Rc4::process(file_key, &*digest);
                for round in 1u8..=19 {
                    let round_key: Vec<u8> = file_key.iter().map(|b| b ^ round).collect();
                    head = Rc4::process(&round_key, &head);
                }
                value[..16].copy_from_slice(&head);
            }
        }
        value
    }

    /// Reverse the owner-key cipher under a candidate owner password,
    /// recovering the padded user password.
    pub fn recover_user_password(&self, owner_password: &[u8], owner_key: &[u8]) -> Vec<u8> {
        let key = self.owner_rc4_key(owner_password);
        let mut value = owner_key.to_vec();
        match self.revision {
            SecurityRevision::R2 => value = Rc4::process(&key, &value),
            SecurityRevision::R3 => {
                for round in (0u8..=19).rev() {
                    let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
                    value = Rc4::process(&round_key, &value);
                }
            }
        }
        value
    }

    /// Does `candidate` verify as the user password?
    ///
    /// Revision 2 compares all 32 bytes of the recomputed `U`; revision 3
    /// only the first 16 (the tail is arbitrary by definition).
    pub fn is_user_password(
        &self,
        candidate: &[u8],
        user_key: &[u8],
        owner_key: &[u8],
        permissions: u32,
        document_id: &[u8],
    ) -> bool {
        let file_key = self.compute_file_key(candidate, owner_key, permissions, document_id);
        let computed = self.compute_user_key(&file_key, document_id);
        match self.revision {
            SecurityRevision::R2 => user_key.len() >= 32 && computed[..] == user_key[..32],
            SecurityRevision::R3 => user_key.len() >= 16 && computed[..16] == user_key[..16],
        }
    }

    /// Does `candidate` verify as the owner password? Recovers the user
    /// password it protects and re-runs the user check with it.
    pub fn is_owner_password(
        &self,
        candidate: &[u8],
        user_key: &[u8],
        owner_key: &[u8],
        permissions: u32,
        document_id: &[u8],
    ) -> bool {
        let recovered = self.recover_user_password(candidate, owner_key);
        self.is_user_password(&recovered, user_key, owner_key, permissions, document_id)
    }

    /// Per-object key: MD5 over the file key and the low bytes of the
    /// object number and generation, truncated to
    /// `min(file_key_len + 5, 16)` bytes.
    pub fn object_key(&self, file_key: &[u8], key: ObjectKey) -> Vec<u8> {
        let number = key.number.to_le_bytes();
        let generation = key.generation.to_le_bytes();
        let mut input = Vec::with_capacity(file_key.len() + 5);
        input.extend_from_slice(file_key);
        input.extend_from_slice(&number[..3]);
        input.extend_from_slice(&generation);
        let digest = md5::compute(&input);
        let len = (file_key.len() + 5).min(16);
        digest[..len].to_vec()
    }
}
