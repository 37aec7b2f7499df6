//! Lexical scanner
//!
//! Low-level token reading shared by the value parser and the content
//! tokenizer: whitespace/comment skipping, bare tokens, and raw integers.

use super::cursor::PushbackReader;
use super::{ParseError, ParseResult};
use std::io::Read;

/// Byte classes used throughout the parser.
///
/// Whitespace is NUL, tab, LF, form feed, CR and space; delimiters add the
/// eight structural characters that terminate names and bare tokens.
pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

pub fn is_delimiter(byte: u8) -> bool {
    is_whitespace(byte) || matches!(byte, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'/')
}

pub fn is_eol(byte: u8) -> bool {
    byte == 0x0A || byte == 0x0D
}

/// Lexical scanner over a [`PushbackReader`].
pub struct Scanner<R> {
    cursor: PushbackReader<R>,
}

impl<R: Read> Scanner<R> {
    pub fn new(source: R) -> Self {
        Self {
            cursor: PushbackReader::new(source),
        }
    }

    /// Access to the underlying cursor for raw byte operations.
    pub fn cursor(&mut self) -> &mut PushbackReader<R> {
        &mut self.cursor
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn is_eof(&mut self) -> ParseResult<bool> {
        self.cursor.is_eof()
    }

    pub fn peek_byte(&mut self) -> ParseResult<Option<u8>> {
        self.cursor.peek_byte()
    }

    pub fn read_byte(&mut self) -> ParseResult<Option<u8>> {
        self.cursor.read_byte()
    }

    /// Skip whitespace and `%` comments.
    ///
    /// Comments run through the end of the line. Never consumes past the
    /// first byte that is neither whitespace nor part of a comment.
    pub fn skip_spaces(&mut self) -> ParseResult<()> {
        while let Some(b) = self.cursor.peek_byte()? {
            if b == b'%' {
                // comment runs to end of line
                while let Some(c) = self.cursor.peek_byte()? {
                    if is_eol(c) {
                        break;
                    }
                    self.cursor.read_byte()?;
                }
            } else if is_whitespace(b) {
                self.cursor.read_byte()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Read a bare token: bytes up to the next delimiter.
    ///
    /// Used for keywords (`true`, `null`, `stream`, `endobj`, ...) and for
    /// content-stream operator names. Leading whitespace is skipped. The
    /// terminating delimiter is left in the stream.
    pub fn read_bare_token(&mut self) -> ParseResult<String> {
        self.skip_spaces()?;
        let mut token = String::new();
        while let Some(b) = self.cursor.peek_byte()? {
            if is_delimiter(b) {
                break;
            }
            self.cursor.read_byte()?;
            token.push(b as char);
        }
        Ok(token)
    }

    /// Read an unsigned integer terminated by whitespace or end of stream.
    ///
    /// Anything non-numeric before the terminator is a fatal parse error.
    pub fn read_integer(&mut self) -> ParseResult<i64> {
        self.skip_spaces()?;
        let mut digits = String::new();
        while let Some(b) = self.cursor.read_byte()? {
            if is_whitespace(b) {
                break;
            }
            if is_delimiter(b) {
                self.cursor.unread_byte(b)?;
                break;
            }
            digits.push(b as char);
        }
        digits.parse::<i64>().map_err(|_| ParseError::SyntaxError {
            position: self.cursor.position(),
            message: format!("expected an integer, actual='{digits}'"),
        })
    }

    /// Consume a single end-of-line sequence: CR, LF, or CRLF.
    ///
    /// A lone CR not followed by LF is accepted; a missing terminator is
    /// pushed back and tolerated (lenient, some producers omit it).
    pub fn read_newline(&mut self) -> ParseResult<()> {
        match self.cursor.read_byte()? {
            Some(0x0D) => {
                if let Some(b) = self.cursor.read_byte()? {
                    if b != 0x0A {
                        self.cursor.unread_byte(b)?;
                    }
                }
                Ok(())
            }
            Some(0x0A) => Ok(()),
            Some(other) => {
                self.cursor.unread_byte(other)?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}
