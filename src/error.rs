use thiserror::Error;

use crate::parser::ParseError;

/// Crate-level error type.
///
/// Structural parse failures keep their own [`ParseError`] detail; password
/// authentication failure is a distinct variant so callers can tell a bad
/// password apart from a damaged document.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("The supplied password does not match either the owner or user password in the document")]
    InvalidPassword,

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_password_display() {
        let err = PdfError::InvalidPassword;
        assert!(err.to_string().contains("owner or user password"));
    }

    #[test]
    fn test_parse_error_wraps() {
        let parse = ParseError::MissingKey("Length".to_string());
        let err = PdfError::from(parse);
        assert!(matches!(err, PdfError::Parse(_)));
        assert!(err.to_string().contains("Length"));
    }

    #[test]
    fn test_unsupported_distinguishable() {
        let err = PdfError::Unsupported("revision 5".to_string());
        assert!(!matches!(err, PdfError::InvalidPassword));
        assert_eq!(err.to_string(), "Unsupported feature: revision 5");
    }
}
