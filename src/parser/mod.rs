//! COS object parser
//!
//! This module implements a native parser for the COS object syntax used by
//! PDF documents: a byte cursor with push-back, a lexical scanner, a
//! recursive-descent value parser backed by an object pool for indirect
//! references, a content-scanning stream payload extractor, and a tokenizer
//! for the embedded content-stream operator language.

pub mod content;
pub mod cursor;
pub mod object_parser;
pub mod objects;
pub mod pool;
pub mod scanner;
pub mod stream;

pub use self::content::{ContentParser, ContentToken};
pub use self::object_parser::CosParser;
pub use self::objects::{CosArray, CosDictionary, CosName, CosObject, CosStream, CosString};
pub use self::pool::{ObjectKey, ObjectPool, XrefSegment};
pub use self::stream::ScratchFile;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parser errors
///
/// Structural errors (keyword/delimiter mismatch where the syntax is
/// unambiguous) abort the current parse. Lenient conditions (wrong stream
/// lengths, sloppy escapes, unknown bare tokens) are absorbed with a
/// diagnostic and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error at byte {position}: {message}")]
    SyntaxError { position: u64, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Push-back buffer overflow (capacity {capacity} bytes)")]
    PushbackOverflow { capacity: usize },

    #[error("Object {0} parsed twice")]
    DuplicateObject(crate::parser::pool::ObjectKey),
}
