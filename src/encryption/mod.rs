//! Document encryption
//!
//! The standard security handler (revisions 2 and 3, RC4) and the graph
//! walker that applies it to a parsed document: password authentication,
//! file-key derivation, per-object keys, and in-place rewriting of every
//! string and stream payload exactly once.

pub mod document;
pub mod permissions;
pub mod rc4;
pub mod standard_security;

pub use self::document::{decrypt_document, encrypt_document, DocumentCrypt, EncryptionInfo};
pub use self::permissions::{PermissionFlags, Permissions};
pub use self::rc4::Rc4;
pub use self::standard_security::{
    SecurityRevision, StandardSecurityHandler, PASSWORD_PADDING,
};
