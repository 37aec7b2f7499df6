//! Document-level encryption and decryption
//!
//! Ties the security handler to a parsed object graph: reads the
//! encryption dictionary out of the trailer, authenticates a password,
//! and walks every pool slot rewriting strings and stream payloads with
//! the per-object cipher. The visited set lives in the walker and is keyed
//! by slot identity, so each object is processed at most once no matter
//! how often it is referenced.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{PdfError, Result};
use crate::parser::{
    CosDictionary, CosName, CosObject, CosString, ObjectKey, ObjectPool,
};

use super::permissions::Permissions;
use super::rc4::Rc4;
use super::standard_security::{SecurityRevision, StandardSecurityHandler};

/// The fields of a standard-filter encryption dictionary.
#[derive(Debug, Clone)]
pub struct EncryptionInfo {
    pub revision: SecurityRevision,
    pub key_length: usize,
    pub owner_key: Vec<u8>,
    pub user_key: Vec<u8>,
    pub permissions: u32,
}

impl EncryptionInfo {
    /// Read the encryption dictionary named by the trailer, following an
    /// indirect reference through the pool. Also reports which pool slot
    /// holds the dictionary, so the walker can leave it alone.
    pub fn from_trailer(
        trailer: &CosDictionary,
        pool: &ObjectPool,
    ) -> Result<(Self, Option<ObjectKey>)> {
        let entry = trailer
            .get("Encrypt")
            .ok_or_else(|| PdfError::EncryptionError("document has no Encrypt entry".to_string()))?;
        let (dict, slot) = match entry {
            CosObject::Reference(key) => {
                let target = pool.get(*key).ok_or_else(|| {
                    PdfError::EncryptionError("Encrypt dictionary not in object pool".to_string())
                })?;
                let dict = target.as_dict().ok_or_else(|| {
                    PdfError::EncryptionError("Encrypt entry is not a dictionary".to_string())
                })?;
                (dict, Some(*key))
            }
            CosObject::Dictionary(dict) => (dict, None),
            _ => {
                return Err(PdfError::EncryptionError(
                    "Encrypt entry is not a dictionary".to_string(),
                ))
            }
        };
        Ok((Self::from_dictionary(dict)?, slot))
    }

    pub fn from_dictionary(dict: &CosDictionary) -> Result<Self> {
        let filter = dict
            .get("Filter")
            .and_then(CosObject::as_name)
            .map(CosName::as_str);
        if filter != Some("Standard") {
            return Err(PdfError::Unsupported(format!(
                "security handler filter {:?}",
                filter.unwrap_or("missing")
            )));
        }

        let revision = match dict.get("R").and_then(CosObject::as_integer) {
            Some(2) => SecurityRevision::R2,
            Some(3) => SecurityRevision::R3,
            Some(r) => {
                return Err(PdfError::Unsupported(format!(
                    "standard security handler revision {r}"
                )))
            }
            None => return Err(PdfError::EncryptionError("missing R entry".to_string())),
        };

        // Length is in bits, 40 when absent
        let key_length = dict
            .get("Length")
            .and_then(CosObject::as_integer)
            .unwrap_or(40) as usize
            / 8;

        let owner_key = string_entry(dict, "O")?;
        let user_key = string_entry(dict, "U")?;
        let permissions = dict
            .get("P")
            .and_then(CosObject::as_integer)
            .ok_or_else(|| PdfError::EncryptionError("missing P entry".to_string()))?
            as u32;

        Ok(Self {
            revision,
            key_length,
            owner_key,
            user_key,
            permissions,
        })
    }
}

fn string_entry(dict: &CosDictionary, key: &str) -> Result<Vec<u8>> {
    dict.get(key)
        .and_then(CosObject::as_string)
        .map(|s| s.as_bytes().to_vec())
        .ok_or_else(|| PdfError::EncryptionError(format!("missing {key} entry")))
}

/// Walks the object graph applying the per-object cipher.
pub struct DocumentCrypt {
    handler: StandardSecurityHandler,
    file_key: Vec<u8>,
    visited: HashSet<ObjectKey>,
    skip: Option<ObjectKey>,
}

impl DocumentCrypt {
    /// Authenticate `password` against the document's encryption
    /// dictionary and derive the file key.
    ///
    /// The password is tried on the user path first, then the owner path;
    /// both failing is [`PdfError::InvalidPassword`].
    pub fn for_decryption(
        trailer: &CosDictionary,
        pool: &ObjectPool,
        password: &[u8],
    ) -> Result<Self> {
        let (info, skip) = EncryptionInfo::from_trailer(trailer, pool)?;
        let handler = StandardSecurityHandler::new(info.revision, info.key_length);
        let document_id = document_id_from_trailer(trailer);

        let user_password = if handler.is_user_password(
            password,
            &info.user_key,
            &info.owner_key,
            info.permissions,
            &document_id,
        ) {
            debug!("password verified on the user path");
            password.to_vec()
        } else if handler.is_owner_password(
            password,
            &info.user_key,
            &info.owner_key,
            info.permissions,
            &document_id,
        ) {
            debug!("password verified on the owner path");
            handler.recover_user_password(password, &info.owner_key)
        } else {
            return Err(PdfError::InvalidPassword);
        };

        let file_key = handler.compute_file_key(
            &user_password,
            &info.owner_key,
            info.permissions,
            &document_id,
        );
        Ok(Self {
            handler,
            file_key,
            visited: HashSet::new(),
            skip,
        })
    }

    /// Walker for the encrypt path, where the key is freshly derived and
    /// no encryption dictionary lives in the pool yet.
    fn for_encryption(handler: StandardSecurityHandler, file_key: Vec<u8>) -> Self {
        Self {
            handler,
            file_key,
            visited: HashSet::new(),
            skip: None,
        }
    }

    pub fn file_key(&self) -> &[u8] {
        &self.file_key
    }

    /// Apply the cipher to every unvisited slot in the pool.
    ///
    /// Slots already in the visited set are skipped, so calling this a
    /// second time on the same walker is a no-op.
    pub fn process_pool(&mut self, pool: &mut ObjectPool) -> Result<()> {
        for key in pool.keys() {
            if Some(key) == self.skip {
                continue;
            }
            if !self.visited.insert(key) {
                continue;
            }
            let Some(mut object) = pool.take(key) else {
                debug!(object = %key, "skipping unfilled pool slot");
                continue;
            };
            let outcome = self.process_object(&mut object, key);
            pool.restore(key, object);
            outcome?;
        }
        Ok(())
    }

    /// Rewrite the strings and stream payload of one object in place.
    ///
    /// Nested containers are handled with an explicit work stack, so
    /// adversarially deep nesting cannot exhaust the call stack. Indirect
    /// references are left alone; their targets are separate pool slots.
    fn process_object(&self, object: &mut CosObject, key: ObjectKey) -> Result<()> {
        let object_key = self.handler.object_key(&self.file_key, key);
        let mut stack: Vec<&mut CosObject> = vec![object];
        while let Some(node) = stack.pop() {
            match node {
                CosObject::String(CosString(bytes)) => {
                    Rc4::new(&object_key).apply_in_place(bytes);
                }
                CosObject::Stream(stream) => {
                    let mut data = stream.raw_data()?;
                    Rc4::new(&object_key).apply_in_place(&mut data);
                    stream.replace_data(&data)?;
                    stack.extend(stream.dict.values_mut());
                }
                CosObject::Array(array) => stack.extend(array.0.iter_mut()),
                CosObject::Dictionary(dict) => stack.extend(dict.values_mut()),
                _ => {}
            }
        }
        Ok(())
    }
}

/// First element of the trailer `ID` array; empty when absent, which is
/// tolerated on the decrypt path (some producers omit it).
fn document_id_from_trailer(trailer: &CosDictionary) -> Vec<u8> {
    let id = trailer
        .get("ID")
        .and_then(CosObject::as_array)
        .and_then(|a| a.get(0))
        .and_then(CosObject::as_string)
        .map(|s| s.as_bytes().to_vec());
    match id {
        Some(bytes) => bytes,
        None => {
            warn!("trailer has no usable ID array, deriving keys with an empty document id");
            Vec::new()
        }
    }
}

/// Decrypt an already-parsed document in place.
pub fn decrypt_document(
    pool: &mut ObjectPool,
    trailer: &CosDictionary,
    password: &[u8],
) -> Result<()> {
    let mut crypt = DocumentCrypt::for_decryption(trailer, pool, password)?;
    crypt.process_pool(pool)
}

/// Encrypt an already-parsed document in place with the 40-bit standard
/// filter. Returns the populated encryption dictionary and the document
/// id for the caller to place in its trailer.
pub fn encrypt_document(
    pool: &mut ObjectPool,
    owner_password: &[u8],
    user_password: &[u8],
    permissions: Permissions,
    document_id: Option<Vec<u8>>,
) -> Result<(CosDictionary, Vec<u8>)> {
    let handler = StandardSecurityHandler::rc4_40bit();
    let document_id =
        document_id.unwrap_or_else(|| generate_document_id(owner_password, user_password, pool));

    let owner_key = handler.compute_owner_key(owner_password, user_password);
    let file_key = handler.compute_file_key(
        user_password,
        &owner_key,
        permissions.bits(),
        &document_id,
    );
    let user_key = handler.compute_user_key(&file_key, &document_id);

    let mut crypt = DocumentCrypt::for_encryption(handler, file_key);
    crypt.process_pool(pool)?;

    let mut dict = CosDictionary::new();
    dict.insert(CosName::new("Filter"), CosObject::Name(CosName::new("Standard")));
    dict.insert(CosName::new("V"), CosObject::Integer(1));
    dict.insert(CosName::new("R"), CosObject::Integer(2));
    dict.insert(CosName::new("O"), CosObject::String(CosString::new(owner_key)));
    dict.insert(
        CosName::new("U"),
        CosObject::String(CosString::new(user_key.to_vec())),
    );
    dict.insert(CosName::new("P"), CosObject::Integer(permissions.as_p_value()));
    Ok((dict, document_id))
}

/// A fresh document id: digest of the current time, the passwords, and
/// the object count. Uniqueness matters here, unpredictability does not.
fn generate_document_id(
    owner_password: &[u8],
    user_password: &[u8],
    pool: &ObjectPool,
) -> Vec<u8> {
    let mut input = Vec::new();
    input.extend_from_slice(chrono::Utc::now().to_rfc3339().as_bytes());
    input.extend_from_slice(owner_password);
    input.extend_from_slice(user_password);
    input.extend_from_slice(&(pool.len() as u64).to_le_bytes());
    md5::compute(&input).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CosArray;

    fn sample_pool() -> ObjectPool {
        let mut pool = ObjectPool::new();
        let mut dict = CosDictionary::new();
        dict.insert(
            CosName::new("Title"),
            CosObject::String(CosString::new(b"A Document".to_vec())),
        );
        dict.insert(CosName::new("Pages"), CosObject::Reference(ObjectKey::new(2, 0)));
        pool.fill(ObjectKey::new(1, 0), CosObject::Dictionary(dict)).unwrap();

        let mut nested = CosArray::new();
        nested.push(CosObject::String(CosString::new(b"inner".to_vec())));
        nested.push(CosObject::Integer(5));
        pool.fill(ObjectKey::new(2, 0), CosObject::Array(nested)).unwrap();
        pool
    }

    fn string_at(pool: &ObjectPool, key: ObjectKey, entry: &str) -> Vec<u8> {
        pool.get(key)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(entry)
            .unwrap()
            .as_string()
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    fn trailer_for(dict: CosDictionary, pool: &mut ObjectPool, id: &[u8]) -> CosDictionary {
        let key = ObjectKey::new(90, 0);
        pool.fill(key, CosObject::Dictionary(dict)).unwrap();
        let mut trailer = CosDictionary::new();
        trailer.insert(CosName::new("Encrypt"), CosObject::Reference(key));
        let mut ids = CosArray::new();
        ids.push(CosObject::String(CosString::new(id.to_vec())));
        ids.push(CosObject::String(CosString::new(id.to_vec())));
        trailer.insert(CosName::new("ID"), CosObject::Array(ids));
        trailer
    }

    #[test]
    fn test_encrypt_then_decrypt_round_trip() {
        let mut pool = sample_pool();
        let (encrypt_dict, id) =
            encrypt_document(&mut pool, b"owner", b"user", Permissions::none(), None).unwrap();

        // ciphertext differs from the plaintext
        assert_ne!(
            string_at(&pool, ObjectKey::new(1, 0), "Title"),
            b"A Document".to_vec()
        );

        let trailer = trailer_for(encrypt_dict, &mut pool, &id);
        decrypt_document(&mut pool, &trailer, b"user").unwrap();
        assert_eq!(
            string_at(&pool, ObjectKey::new(1, 0), "Title"),
            b"A Document".to_vec()
        );
    }

    #[test]
    fn test_owner_password_also_decrypts() {
        let mut pool = sample_pool();
        let (encrypt_dict, id) =
            encrypt_document(&mut pool, b"owner", b"user", Permissions::none(), None).unwrap();
        let trailer = trailer_for(encrypt_dict, &mut pool, &id);
        decrypt_document(&mut pool, &trailer, b"owner").unwrap();
        assert_eq!(
            string_at(&pool, ObjectKey::new(1, 0), "Title"),
            b"A Document".to_vec()
        );
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let mut pool = sample_pool();
        let (encrypt_dict, id) =
            encrypt_document(&mut pool, b"owner", b"user", Permissions::none(), None).unwrap();
        let trailer = trailer_for(encrypt_dict, &mut pool, &id);
        let err = decrypt_document(&mut pool, &trailer, b"intruder").unwrap_err();
        assert!(matches!(err, PdfError::InvalidPassword));
    }

    #[test]
    fn test_empty_passwords_authenticate_with_empty_string() {
        let mut pool = sample_pool();
        let (encrypt_dict, id) =
            encrypt_document(&mut pool, b"", b"", Permissions::none(), None).unwrap();
        let trailer = trailer_for(encrypt_dict, &mut pool, &id);
        decrypt_document(&mut pool, &trailer, b"").unwrap();
        assert_eq!(
            string_at(&pool, ObjectKey::new(1, 0), "Title"),
            b"A Document".to_vec()
        );
    }

    #[test]
    fn test_second_walk_is_a_no_op() {
        let mut pool = sample_pool();
        let (encrypt_dict, id) =
            encrypt_document(&mut pool, b"", b"", Permissions::none(), None).unwrap();
        let trailer = trailer_for(encrypt_dict, &mut pool, &id);

        let mut crypt = DocumentCrypt::for_decryption(&trailer, &pool, b"").unwrap();
        crypt.process_pool(&mut pool).unwrap();
        let decrypted = string_at(&pool, ObjectKey::new(1, 0), "Title");
        assert_eq!(decrypted, b"A Document".to_vec());

        // same walker again: visited set protects the plaintext
        crypt.process_pool(&mut pool).unwrap();
        assert_eq!(string_at(&pool, ObjectKey::new(1, 0), "Title"), decrypted);
    }

    #[test]
    fn test_encrypt_dictionary_slot_is_not_rewritten() {
        let mut pool = sample_pool();
        let (encrypt_dict, id) =
            encrypt_document(&mut pool, b"", b"", Permissions::none(), None).unwrap();
        let stored_owner_key = encrypt_dict
            .get("O")
            .unwrap()
            .as_string()
            .unwrap()
            .as_bytes()
            .to_vec();
        let trailer = trailer_for(encrypt_dict, &mut pool, &id);

        decrypt_document(&mut pool, &trailer, b"").unwrap();
        assert_eq!(
            string_at(&pool, ObjectKey::new(90, 0), "O"),
            stored_owner_key
        );
    }

    #[test]
    fn test_unsupported_revision_is_distinguishable() {
        let mut dict = CosDictionary::new();
        dict.insert(CosName::new("Filter"), CosObject::Name(CosName::new("Standard")));
        dict.insert(CosName::new("R"), CosObject::Integer(4));
        dict.insert(CosName::new("V"), CosObject::Integer(4));
        let err = EncryptionInfo::from_dictionary(&dict).unwrap_err();
        assert!(matches!(err, PdfError::Unsupported(_)));
    }

    #[test]
    fn test_non_standard_filter_is_unsupported() {
        let mut dict = CosDictionary::new();
        dict.insert(CosName::new("Filter"), CosObject::Name(CosName::new("Custom")));
        let err = EncryptionInfo::from_dictionary(&dict).unwrap_err();
        assert!(matches!(err, PdfError::Unsupported(_)));
    }
}
