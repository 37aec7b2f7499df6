//! Buffered byte cursor with push-back
//!
//! Forward-only reading over a buffered source, with a bounded push-back
//! buffer so callers can peek and un-consume bytes while scanning for
//! keywords in malformed input.

use super::{ParseError, ParseResult};
use std::io::{BufReader, Read};

/// Maximum number of bytes that may be pushed back at once.
pub const PUSHBACK_CAPACITY: usize = 4096;

/// A forward-reading byte cursor over a buffered source.
///
/// Supports peeking without consuming and pushing back previously read
/// bytes. Exceeding the push-back capacity is a fatal error, not silent
/// truncation.
pub struct PushbackReader<R> {
    inner: BufReader<R>,
    // Stack of pushed-back bytes; the top is the next byte to read.
    pushback: Vec<u8>,
    position: u64,
}

impl<R: Read> PushbackReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::with_capacity(16384, source),
            pushback: Vec::new(),
            position: 0,
        }
    }

    /// Read the next byte, or `None` at end of stream.
    pub fn read_byte(&mut self) -> ParseResult<Option<u8>> {
        if let Some(b) = self.pushback.pop() {
            self.position += 1;
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => {
                self.position += 1;
                Ok(Some(buf[0]))
            }
        }
    }

    /// Look at the next byte without consuming it.
    ///
    /// Implemented as read-then-unread, so the logical position is
    /// unchanged.
    pub fn peek_byte(&mut self) -> ParseResult<Option<u8>> {
        match self.read_byte()? {
            Some(b) => {
                self.unread_byte(b)?;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    /// Push a single byte back; it becomes the next byte read.
    pub fn unread_byte(&mut self, byte: u8) -> ParseResult<()> {
        if self.pushback.len() >= PUSHBACK_CAPACITY {
            return Err(ParseError::PushbackOverflow {
                capacity: PUSHBACK_CAPACITY,
            });
        }
        self.pushback.push(byte);
        self.position = self.position.saturating_sub(1);
        Ok(())
    }

    /// Push a run of bytes back so they are re-read in the same order.
    pub fn unread(&mut self, bytes: &[u8]) -> ParseResult<()> {
        if self.pushback.len() + bytes.len() > PUSHBACK_CAPACITY {
            return Err(ParseError::PushbackOverflow {
                capacity: PUSHBACK_CAPACITY,
            });
        }
        for &b in bytes.iter().rev() {
            self.pushback.push(b);
        }
        self.position = self.position.saturating_sub(bytes.len() as u64);
        Ok(())
    }

    /// True when no further byte can be read.
    pub fn is_eof(&mut self) -> ParseResult<bool> {
        Ok(self.peek_byte()?.is_none())
    }

    /// Read up to `buf.len()` bytes, returning the amount read.
    pub fn read(&mut self, buf: &mut [u8]) -> ParseResult<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_byte()? {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    /// Logical byte position: bytes consumed so far, net of push-back.
    pub fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_and_peek() {
        let mut r = PushbackReader::new(Cursor::new(b"abc"));
        assert_eq!(r.peek_byte().unwrap(), Some(b'a'));
        assert_eq!(r.peek_byte().unwrap(), Some(b'a'));
        assert_eq!(r.read_byte().unwrap(), Some(b'a'));
        assert_eq!(r.read_byte().unwrap(), Some(b'b'));
        assert_eq!(r.read_byte().unwrap(), Some(b'c'));
        assert_eq!(r.read_byte().unwrap(), None);
        assert!(r.is_eof().unwrap());
    }

    #[test]
    fn test_peek_does_not_advance_position() {
        let mut r = PushbackReader::new(Cursor::new(b"xy"));
        assert_eq!(r.position(), 0);
        r.peek_byte().unwrap();
        assert_eq!(r.position(), 0);
        r.read_byte().unwrap();
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn test_unread_restores_exact_bytes() {
        let mut r = PushbackReader::new(Cursor::new(b"hello"));
        let a = r.read_byte().unwrap().unwrap();
        let b = r.read_byte().unwrap().unwrap();
        r.unread_byte(b).unwrap();
        r.unread_byte(a).unwrap();
        assert_eq!(r.read_byte().unwrap(), Some(b'h'));
        assert_eq!(r.read_byte().unwrap(), Some(b'e'));
    }

    #[test]
    fn test_unread_run_preserves_order() {
        let mut r = PushbackReader::new(Cursor::new(b"xyz"));
        r.read_byte().unwrap();
        r.read_byte().unwrap();
        r.read_byte().unwrap();
        r.unread(b"endstream").unwrap();
        let mut buf = [0u8; 9];
        assert_eq!(r.read(&mut buf).unwrap(), 9);
        assert_eq!(&buf, b"endstream");
    }

    #[test]
    fn test_pushback_overflow_is_fatal() {
        let mut r = PushbackReader::new(Cursor::new(b""));
        let big = vec![0u8; PUSHBACK_CAPACITY];
        r.unread(&big).unwrap();
        let result = r.unread_byte(0);
        assert!(matches!(
            result,
            Err(ParseError::PushbackOverflow { .. })
        ));
    }

    #[test]
    fn test_read_buffer_stops_at_eof() {
        let mut r = PushbackReader::new(Cursor::new(b"ab"));
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
    }
}
