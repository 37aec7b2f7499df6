//! Stream payloads and scratch storage
//!
//! Stream payloads are spooled to an anonymous scratch file instead of
//! being held in the node, so arbitrarily large payloads never live in
//! memory alongside the object graph. The extractor here finds the payload
//! boundary by scanning for the `endstream` keyword; the declared `Length`
//! is never trusted to delimit the payload.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use tracing::warn;

use super::objects::CosDictionary;
use super::scanner::{is_delimiter, Scanner};
use super::{ParseError, ParseResult};

const ENDSTREAM: &[u8] = b"endstream";

/// Shared handle to one anonymous scratch file.
///
/// Cloning shares the underlying file; segments are append-only and the
/// file is removed by the OS when the last handle drops. Not safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct ScratchFile {
    file: Rc<RefCell<File>>,
}

impl ScratchFile {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            file: Rc::new(RefCell::new(tempfile::tempfile()?)),
        })
    }

    /// Append a segment, returning its `(offset, len)` geometry.
    fn write_segment(&self, data: &[u8]) -> std::io::Result<(u64, u64)> {
        let mut file = self.file.borrow_mut();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        Ok((offset, data.len() as u64))
    }

    fn read_segment(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// A stream node: a dictionary plus a payload stored in scratch.
#[derive(Debug, Clone)]
pub struct CosStream {
    pub dict: CosDictionary,
    scratch: ScratchFile,
    offset: u64,
    len: u64,
}

impl CosStream {
    /// Spool `data` into `scratch` and wrap it with its dictionary.
    pub fn spool(dict: CosDictionary, scratch: &ScratchFile, data: &[u8]) -> std::io::Result<Self> {
        let (offset, len) = scratch.write_segment(data)?;
        Ok(Self {
            dict,
            scratch: scratch.clone(),
            offset,
            len,
        })
    }

    /// The payload length in bytes, as scanned.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the payload back from scratch.
    pub fn raw_data(&self) -> std::io::Result<Vec<u8>> {
        self.scratch.read_segment(self.offset, self.len)
    }

    /// Replace the payload. The new bytes are appended as a fresh segment
    /// and the stream repointed; the old segment is left dead in scratch.
    pub fn replace_data(&mut self, data: &[u8]) -> std::io::Result<()> {
        let (offset, len) = self.scratch.write_segment(data)?;
        self.offset = offset;
        self.len = len;
        Ok(())
    }
}

// Equality is dictionary plus payload geometry within one scratch file.
impl PartialEq for CosStream {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict
            && self.offset == other.offset
            && self.len == other.len
            && Rc::ptr_eq(&self.scratch.file, &other.scratch.file)
    }
}

/// Buffered writer for one in-progress scratch segment.
///
/// Appends go through a chunk buffer so the payload scan does not issue a
/// write per byte; nothing else may append to the scratch file while a
/// segment is open.
struct SegmentWriter<'a> {
    scratch: &'a ScratchFile,
    offset: u64,
    len: u64,
    buf: Vec<u8>,
}

const SEGMENT_CHUNK: usize = 8192;

impl<'a> SegmentWriter<'a> {
    fn begin(scratch: &'a ScratchFile) -> std::io::Result<Self> {
        let offset = scratch.file.borrow_mut().seek(SeekFrom::End(0))?;
        Ok(Self {
            scratch,
            offset,
            len: 0,
            buf: Vec::with_capacity(SEGMENT_CHUNK),
        })
    }

    fn push(&mut self, byte: u8) -> std::io::Result<()> {
        self.buf.push(byte);
        self.len += 1;
        if self.buf.len() >= SEGMENT_CHUNK {
            self.flush()?;
        }
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.buf.extend_from_slice(bytes);
        self.len += bytes.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.buf.is_empty() {
            let mut file = self.scratch.file.borrow_mut();
            file.seek(SeekFrom::End(0))?;
            file.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    fn finish(mut self) -> std::io::Result<(u64, u64)> {
        self.flush()?;
        Ok((self.offset, self.len))
    }
}

/// Extract a stream payload by terminator scan, spooling it to scratch.
///
/// Call with the cursor just past the `stream` keyword. Consumes the EOL
/// after the keyword, then writes bytes through to a scratch segment while
/// watching a sliding window for `endstream`; only the window and the EOL
/// that may precede it are held in memory. A window match is only accepted
/// when the keyword ends at a token boundary; one false match (e.g.
/// `endstreamX` inside the payload) is folded back into the data and the
/// scan resumes, a second is fatal.
///
/// `declared` is the resolved `Length` value, used only to cross-check the
/// scanned boundary. A single EOL immediately before `endstream` belongs
/// to the markup, not the payload, unless the declared length says
/// otherwise.
pub fn extract_stream<R: Read>(
    scanner: &mut Scanner<R>,
    dict: CosDictionary,
    scratch: &ScratchFile,
    declared: Option<i64>,
) -> ParseResult<CosStream> {
    scanner.read_newline()?;

    // held back from the segment: the keyword window plus the up to two
    // EOL bytes that may precede it
    const HOLD: usize = ENDSTREAM.len() + 2;
    let mut writer = SegmentWriter::begin(scratch)?;
    let mut tail: Vec<u8> = Vec::with_capacity(HOLD + 1);
    let mut resynced = false;
    loop {
        let Some(b) = scanner.read_byte()? else {
            return Err(ParseError::SyntaxError {
                position: scanner.position(),
                message: "'endstream' not found before end of input".to_string(),
            });
        };
        tail.push(b);
        if tail.len() > HOLD {
            writer.push(tail.remove(0))?;
        }
        if !tail.ends_with(ENDSTREAM) {
            continue;
        }
        match scanner.peek_byte()? {
            Some(next) if !is_delimiter(next) => {
                if resynced {
                    return Err(ParseError::SyntaxError {
                        position: scanner.position(),
                        message: "expected 'endstream' at payload boundary".to_string(),
                    });
                }
                warn!(
                    position = scanner.position(),
                    "false 'endstream' match inside stream payload, resuming scan"
                );
                resynced = true;
            }
            _ => {
                tail.truncate(tail.len() - ENDSTREAM.len());
                break;
            }
        }
    }

    // the tail now holds the last bytes of the payload, enough to decide
    // whether it ends in markup EOL
    let scanned = writer.len + tail.len() as u64;
    let trimmed = scanned - trailing_eol_len(&tail) as u64;
    let keep = match declared {
        Some(n) if n >= 0 && n as u64 == scanned => scanned,
        Some(n) if n >= 0 && n as u64 == trimmed => trimmed,
        Some(n) => {
            warn!(
                declared = n,
                scanned = trimmed,
                "stream /Length does not match scanned payload"
            );
            trimmed
        }
        None => trimmed,
    };
    writer.extend(&tail[..(keep - writer.len) as usize])?;
    let (offset, len) = writer.finish()?;
    Ok(CosStream {
        dict,
        scratch: scratch.clone(),
        offset,
        len,
    })
}

/// Length in bytes of one trailing CRLF, LF, or CR.
fn trailing_eol_len(tail: &[u8]) -> usize {
    if tail.ends_with(b"\r\n") {
        2
    } else if tail.ends_with(b"\n") || tail.ends_with(b"\r") {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{CosName, CosObject};
    use std::io::Cursor;

    fn scan(input: &[u8], declared: Option<i64>) -> ParseResult<Vec<u8>> {
        let mut scanner = Scanner::new(Cursor::new(input.to_vec()));
        let scratch = ScratchFile::new().unwrap();
        let stream = extract_stream(&mut scanner, CosDictionary::new(), &scratch, declared)?;
        Ok(stream.raw_data().unwrap())
    }

    #[test]
    fn test_scratch_round_trip() {
        let scratch = ScratchFile::new().unwrap();
        let a = CosStream::spool(CosDictionary::new(), &scratch, b"first").unwrap();
        let b = CosStream::spool(CosDictionary::new(), &scratch, b"second").unwrap();
        assert_eq!(a.raw_data().unwrap(), b"first");
        assert_eq!(b.raw_data().unwrap(), b"second");
    }

    #[test]
    fn test_replace_data_repoints() {
        let scratch = ScratchFile::new().unwrap();
        let mut s = CosStream::spool(CosDictionary::new(), &scratch, b"plaintext!").unwrap();
        s.replace_data(b"xyz").unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.raw_data().unwrap(), b"xyz");
    }

    #[test]
    fn test_extract_ignores_wrong_declared_length() {
        // declares 3, actual payload is 10 bytes
        let data = scan(b"\n0123456789endstream", Some(3)).unwrap();
        assert_eq!(data, b"0123456789");
    }

    #[test]
    fn test_extract_strips_markup_eol() {
        let data = scan(b"\r\nhello\r\nendstream", None).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_extract_keeps_trailing_newline_when_length_says_so() {
        // a payload genuinely ending in LF, vouched for by /Length
        let data = scan(b"\nbinary\ndata\nendstream", Some(12)).unwrap();
        assert_eq!(data, b"binary\ndata\n");
    }

    #[test]
    fn test_extract_resyncs_once_on_false_match() {
        let data = scan(b"\nabcendstreamXdefendstream", None).unwrap();
        assert_eq!(data, b"abcendstreamXdef");
    }

    #[test]
    fn test_extract_second_false_match_is_fatal() {
        let result = scan(b"\naendstreamXbendstreamYendstream", None);
        assert!(matches!(result, Err(ParseError::SyntaxError { .. })));
    }

    #[test]
    fn test_extract_missing_terminator_is_fatal() {
        let result = scan(b"\nno terminator here", None);
        assert!(matches!(result, Err(ParseError::SyntaxError { .. })));
    }

    #[test]
    fn test_extract_writes_through_past_chunk_size() {
        // a payload several chunks long must round-trip through scratch;
        // the byte cycle never forms the terminator keyword
        let body: Vec<u8> = (0..3 * SEGMENT_CHUNK as u32).map(|i| (i % 251) as u8).collect();
        let mut input = vec![b'\n'];
        input.extend_from_slice(&body);
        input.extend_from_slice(b"endstream");
        let data = scan(&input, Some(body.len() as i64)).unwrap();
        assert_eq!(data, body);
    }

    #[test]
    fn test_extract_empty_payload() {
        let data = scan(b"\nendstream", None).unwrap();
        assert_eq!(data, b"");
    }

    #[test]
    fn test_stream_equality_is_geometry() {
        let scratch = ScratchFile::new().unwrap();
        let mut dict = CosDictionary::new();
        dict.insert(CosName::new("Length"), CosObject::Integer(4));
        let a = CosStream::spool(dict.clone(), &scratch, b"data").unwrap();
        let b = a.clone();
        assert_eq!(a, b);

        let c = CosStream::spool(dict, &scratch, b"data").unwrap();
        assert_ne!(a, c);
    }
}
