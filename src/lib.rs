//! # cosparse
//!
//! A parser and decryption engine for the COS ("Carousel Object System")
//! object layer of PDF documents.
//!
//! The crate turns a raw byte stream into a graph of typed [`CosObject`]
//! nodes connected by indirect references, delimits embedded stream
//! payloads whose declared length is unreliable, and, for
//! password-protected documents, recovers the document encryption key and
//! decrypts every string and payload in the graph exactly once.
//!
//! ```no_run
//! use std::io::Cursor;
//! use cosparse::parser::{CosParser, ObjectKey};
//!
//! let bytes = b"1 0 obj << /Type /Catalog >> endobj";
//! let mut parser = CosParser::new(Cursor::new(&bytes[..])).unwrap();
//! parser.parse_indirect_object(ObjectKey::new(1, 0)).unwrap();
//! let pool = parser.into_pool();
//! let catalog = pool.get(ObjectKey::new(1, 0)).unwrap();
//! assert!(catalog.as_dict().is_some());
//! ```
//!
//! Higher layers (cross-reference loading, document model, writers) are
//! expected to drive this crate: the xref loader seeds the parser with
//! byte offsets and shares its object space through
//! [`CosParser::get_object_from_pool`], and the decryption caller hands a
//! fully parsed pool to [`encryption::DocumentCrypt`].
//!
//! [`CosObject`]: parser::objects::CosObject
//! [`CosParser::get_object_from_pool`]: parser::CosParser::get_object_from_pool

pub mod encryption;
pub mod error;
pub mod parser;

pub use error::{PdfError, Result};
pub use parser::objects::{CosArray, CosDictionary, CosName, CosObject, CosStream, CosString};
pub use parser::pool::{ObjectKey, ObjectPool, XrefSegment};
pub use parser::CosParser;
