//! Recursive-descent value parser
//!
//! Parses COS values from a byte source, resolving indirect references
//! through an owned [`ObjectPool`] and handing dictionaries followed by
//! `stream` off to the payload extractor. The parser is lenient where
//! real-world producers are sloppy (unknown bare tokens, missing `endobj`,
//! wrong `Length`) and strict where the syntax is unambiguous (malformed
//! literals, unclosed dictionaries).

use std::io::Read;

use tracing::{debug, warn};

use super::objects::{CosArray, CosDictionary, CosName, CosObject, CosString};
use super::pool::{ObjectKey, ObjectPool, XrefSegment};
use super::scanner::{is_delimiter, is_eol, Scanner};
use super::stream::{extract_stream, ScratchFile};
use super::{ParseError, ParseResult};

/// Outcome of one dispatch step: either a value node, or a bare word the
/// caller decides how to treat (`R` in arrays, keywords, junk).
pub(crate) enum ParsedValue {
    Object(CosObject),
    BareWord(String),
}

/// COS object parser over a byte source.
///
/// Owns the object pool and the scratch file for stream payloads, so one
/// parser instance defines one object space. The external xref/trailer
/// loader positions the underlying source and calls
/// [`parse_indirect_object`](Self::parse_indirect_object) per entry.
pub struct CosParser<R> {
    scanner: Scanner<R>,
    pool: ObjectPool,
    scratch: ScratchFile,
}

impl<R: Read> CosParser<R> {
    pub fn new(source: R) -> ParseResult<Self> {
        Ok(Self {
            scanner: Scanner::new(source),
            pool: ObjectPool::new(),
            scratch: ScratchFile::new()?,
        })
    }

    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ObjectPool {
        &mut self.pool
    }

    /// Consume the parser, yielding its object pool.
    pub fn into_pool(self) -> ObjectPool {
        self.pool
    }

    /// Shared object space for the xref/trailer loader: reserves the slot
    /// if the key has never been seen.
    pub fn get_object_from_pool(&mut self, key: ObjectKey) -> Option<&CosObject> {
        self.pool.reserve(key);
        self.pool.get(key)
    }

    /// Record a cross-reference subsection discovered by the loader.
    pub fn add_xref(&mut self, start: u32, count: u32) {
        self.pool.add_xref(start, count);
    }

    pub fn xrefs(&self) -> &[XrefSegment] {
        self.pool.xrefs()
    }

    pub(crate) fn scanner(&mut self) -> &mut Scanner<R> {
        &mut self.scanner
    }

    /// Parse `N G obj <value> endobj` at the current position and fill the
    /// pool slot. A header disagreeing with `key` is logged and the parsed
    /// header wins; a missing `endobj` is tolerated.
    pub fn parse_indirect_object(&mut self, key: ObjectKey) -> ParseResult<ObjectKey> {
        let number = self.scanner.read_integer()?;
        let generation = self.scanner.read_integer()?;
        let token = self.scanner.read_bare_token()?;
        if token != "obj" {
            return Err(ParseError::UnexpectedToken {
                expected: "obj".to_string(),
                found: token,
            });
        }

        let parsed = object_key_from_header(number, generation, self.scanner.position())?;
        if parsed != key {
            warn!(requested = %key, header = %parsed, "object header disagrees with xref entry");
        }

        let mut object = self.parse_direct_object()?;
        if let CosObject::Dictionary(_) = object {
            object = self.check_for_stream(object)?;
        }

        self.scanner.skip_spaces()?;
        if !self.scanner.is_eof()? {
            let trailer = self.scanner.read_bare_token()?;
            if trailer != "endobj" {
                warn!(token = %trailer, object = %parsed, "missing 'endobj' after object body");
                self.scanner.cursor().unread(trailer.as_bytes())?;
            }
        }

        self.pool.fill(parsed, object)?;
        Ok(parsed)
    }

    /// Parse one directly-embedded value at the current position.
    ///
    /// Unknown bare words are discarded with a diagnostic and parsing
    /// retries, so one piece of producer junk does not abort the object.
    pub fn parse_direct_object(&mut self) -> ParseResult<CosObject> {
        loop {
            match self.parse_value()? {
                ParsedValue::Object(obj) => return Ok(obj),
                ParsedValue::BareWord(word) => {
                    warn!(token = %word, position = self.scanner.position(), "discarding unexpected token");
                    if self.scanner.is_eof()? {
                        return Err(ParseError::SyntaxError {
                            position: self.scanner.position(),
                            message: "unexpected end of input".to_string(),
                        });
                    }
                }
            }
        }
    }

    /// One dispatch step on the next non-space byte.
    pub(crate) fn parse_value(&mut self) -> ParseResult<ParsedValue> {
        self.scanner.skip_spaces()?;
        let byte = self.scanner.peek_byte()?.ok_or_else(|| ParseError::SyntaxError {
            position: self.scanner.position(),
            message: "unexpected end of input".to_string(),
        })?;

        let obj = match byte {
            b'/' => CosObject::Name(self.parse_name()?),
            b'(' => {
                self.scanner.read_byte()?;
                CosObject::String(self.parse_literal_string()?)
            }
            b'<' => {
                self.scanner.read_byte()?;
                if self.scanner.peek_byte()? == Some(b'<') {
                    self.scanner.read_byte()?;
                    CosObject::Dictionary(self.parse_dictionary()?)
                } else {
                    CosObject::String(self.parse_hex_string()?)
                }
            }
            b'[' => {
                self.scanner.read_byte()?;
                CosObject::Array(self.parse_array()?)
            }
            b'0'..=b'9' | b'-' | b'+' | b'.' => self.parse_number()?,
            b't' | b'f' => {
                let token = self.scanner.read_bare_token()?;
                match token.as_str() {
                    "true" => CosObject::Boolean(true),
                    "false" => CosObject::Boolean(false),
                    _ => {
                        return Err(ParseError::UnexpectedToken {
                            expected: "true or false".to_string(),
                            found: token,
                        })
                    }
                }
            }
            b'n' => {
                let token = self.scanner.read_bare_token()?;
                if token == "null" {
                    CosObject::Null
                } else {
                    return Err(ParseError::UnexpectedToken {
                        expected: "null".to_string(),
                        found: token,
                    });
                }
            }
            b']' => {
                // some producers leave a stray closer at value position
                self.scanner.read_byte()?;
                debug!(position = self.scanner.position(), "stray ']' treated as null");
                CosObject::Null
            }
            _ => {
                let word = self.scanner.read_bare_token()?;
                if word.is_empty() {
                    // delimiter byte nothing claims; consume it so the
                    // caller cannot spin on it
                    self.scanner.read_byte()?;
                }
                return Ok(ParsedValue::BareWord(word));
            }
        };
        Ok(ParsedValue::Object(obj))
    }

    /// Parse a name, consuming the leading `/`.
    ///
    /// `#XX` with two hex digits unescapes to one byte; a `#` not followed
    /// by two hex digits is kept literally.
    fn parse_name(&mut self) -> ParseResult<CosName> {
        let slash = self.scanner.read_byte()?;
        debug_assert_eq!(slash, Some(b'/'));
        let mut name = String::new();
        while let Some(b) = self.scanner.peek_byte()? {
            if is_delimiter(b) {
                break;
            }
            self.scanner.read_byte()?;
            if b == b'#' {
                match self.read_hex_escape()? {
                    Some(decoded) => name.push(decoded as char),
                    None => name.push('#'),
                }
            } else {
                name.push(b as char);
            }
        }
        Ok(CosName::new(name))
    }

    /// Try to read two hex digits after a `#`; restores the stream and
    /// returns `None` when they are not there.
    fn read_hex_escape(&mut self) -> ParseResult<Option<u8>> {
        let Some(hi) = self.scanner.read_byte()? else {
            return Ok(None);
        };
        let Some(hi_val) = hex_value(hi) else {
            self.scanner.cursor().unread_byte(hi)?;
            return Ok(None);
        };
        let Some(lo) = self.scanner.read_byte()? else {
            self.scanner.cursor().unread_byte(hi)?;
            return Ok(None);
        };
        let Some(lo_val) = hex_value(lo) else {
            self.scanner.cursor().unread(&[hi, lo])?;
            return Ok(None);
        };
        Ok(Some(hi_val << 4 | lo_val))
    }

    /// Parse a balanced-parenthesis literal string; the opening `(` is
    /// already consumed.
    fn parse_literal_string(&mut self) -> ParseResult<CosString> {
        let mut bytes = Vec::new();
        let mut depth = 1u32;
        loop {
            let Some(b) = self.scanner.read_byte()? else {
                return Err(ParseError::SyntaxError {
                    position: self.scanner.position(),
                    message: "unterminated literal string".to_string(),
                });
            };
            match b {
                b'(' => {
                    depth += 1;
                    bytes.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(b);
                }
                b'\\' => self.parse_string_escape(&mut bytes)?,
                _ => bytes.push(b),
            }
        }
        Ok(CosString::new(bytes))
    }

    fn parse_string_escape(&mut self, bytes: &mut Vec<u8>) -> ParseResult<()> {
        let Some(c) = self.scanner.read_byte()? else {
            return Err(ParseError::SyntaxError {
                position: self.scanner.position(),
                message: "unterminated escape in literal string".to_string(),
            });
        };
        match c {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0C),
            b'(' | b')' | b'\\' => bytes.push(c),
            b'0'..=b'7' => {
                let mut value = (c - b'0') as u16;
                for _ in 0..2 {
                    match self.scanner.peek_byte()? {
                        Some(d @ b'0'..=b'7') => {
                            self.scanner.read_byte()?;
                            value = value * 8 + (d - b'0') as u16;
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            0x0D | 0x0A => {
                // escaped line break is elided, together with any
                // immediately following terminators
                while let Some(next) = self.scanner.peek_byte()? {
                    if !is_eol(next) {
                        break;
                    }
                    self.scanner.read_byte()?;
                }
            }
            other => {
                // producers misuse the escape; keep both bytes
                debug!(escaped = %(other as char), "unknown string escape kept literally");
                bytes.push(b'\\');
                bytes.push(other);
            }
        }
        Ok(())
    }

    /// Parse a hex string; the opening `<` is already consumed.
    ///
    /// Non-hex bytes before the closing `>` are skipped; an odd digit
    /// count is completed with a trailing zero nibble.
    fn parse_hex_string(&mut self) -> ParseResult<CosString> {
        let mut nibbles = Vec::new();
        loop {
            let Some(b) = self.scanner.read_byte()? else {
                return Err(ParseError::SyntaxError {
                    position: self.scanner.position(),
                    message: "unterminated hex string".to_string(),
                });
            };
            if b == b'>' {
                break;
            }
            match hex_value(b) {
                Some(v) => nibbles.push(v),
                None => {
                    if !super::scanner::is_whitespace(b) {
                        debug!(byte = b, "skipping non-hex byte in hex string");
                    }
                }
            }
        }
        let mut bytes = Vec::with_capacity(nibbles.len().div_ceil(2));
        for pair in nibbles.chunks(2) {
            let hi = pair[0];
            let lo = pair.get(1).copied().unwrap_or(0);
            bytes.push(hi << 4 | lo);
        }
        Ok(CosString::new(bytes))
    }

    /// Parse a dictionary; the opening `<<` is already consumed.
    fn parse_dictionary(&mut self) -> ParseResult<CosDictionary> {
        let mut dict = CosDictionary::new();
        loop {
            self.scanner.skip_spaces()?;
            match self.scanner.peek_byte()? {
                None => {
                    return Err(ParseError::SyntaxError {
                        position: self.scanner.position(),
                        message: "dictionary not closed with '>>'".to_string(),
                    })
                }
                Some(b'>') => {
                    self.scanner.read_byte()?;
                    if self.scanner.read_byte()? != Some(b'>') {
                        return Err(ParseError::SyntaxError {
                            position: self.scanner.position(),
                            message: "dictionary not closed with '>>'".to_string(),
                        });
                    }
                    return Ok(dict);
                }
                Some(b'/') => {
                    let key = self.parse_name()?;
                    let value = self.parse_dictionary_value()?;
                    dict.insert(key, value);
                    self.skip_def_token()?;
                }
                Some(other) => {
                    return Err(ParseError::SyntaxError {
                        position: self.scanner.position(),
                        message: format!("expected '/' or '>>' in dictionary, found 0x{other:02x}"),
                    })
                }
            }
        }
    }

    /// Embedded character-map resources follow dictionary entries with a
    /// trailing `def` token; swallow it when present.
    fn skip_def_token(&mut self) -> ParseResult<()> {
        self.scanner.skip_spaces()?;
        if self.scanner.peek_byte()? == Some(b'd') {
            let token = self.scanner.read_bare_token()?;
            if token != "def" {
                self.scanner.cursor().unread(token.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Parse a dictionary value, recognizing the `N G R` indirect
    /// reference form: the first integer was the object number, the next
    /// integer the generation, and `R` seals the pair.
    fn parse_dictionary_value(&mut self) -> ParseResult<CosObject> {
        let value = self.parse_direct_object()?;
        let CosObject::Integer(number) = value else {
            return Ok(value);
        };
        self.scanner.skip_spaces()?;
        match self.scanner.peek_byte()? {
            Some(b'0'..=b'9') => {}
            _ => return Ok(value),
        }
        let generation = self.scanner.read_integer()?;
        let token = self.scanner.read_bare_token()?;
        if token != "R" {
            return Err(ParseError::UnexpectedToken {
                expected: "R".to_string(),
                found: token,
            });
        }
        let key = object_key_from_header(number, generation, self.scanner.position())?;
        self.pool.reserve(key);
        Ok(CosObject::Reference(key))
    }

    /// Parse an array; the opening `[` is already consumed.
    ///
    /// The bare word `R` collapses the two preceding integer entries into
    /// one indirect-reference entry.
    fn parse_array(&mut self) -> ParseResult<CosArray> {
        let mut array = CosArray::new();
        loop {
            self.scanner.skip_spaces()?;
            match self.scanner.peek_byte()? {
                None => {
                    return Err(ParseError::SyntaxError {
                        position: self.scanner.position(),
                        message: "array not closed with ']'".to_string(),
                    })
                }
                Some(b']') => {
                    self.scanner.read_byte()?;
                    return Ok(array);
                }
                _ => {}
            }
            match self.parse_value()? {
                ParsedValue::Object(obj) => array.push(obj),
                ParsedValue::BareWord(word) => match word.as_str() {
                    "R" => {
                        let generation = array.0.pop().and_then(|o| o.as_integer());
                        let number = array.0.pop().and_then(|o| o.as_integer());
                        let (Some(number), Some(generation)) = (number, generation) else {
                            return Err(ParseError::SyntaxError {
                                position: self.scanner.position(),
                                message: "'R' not preceded by two integers in array".to_string(),
                            });
                        };
                        let key =
                            object_key_from_header(number, generation, self.scanner.position())?;
                        self.pool.reserve(key);
                        array.push(CosObject::Reference(key));
                    }
                    "endobj" | "endstream" => {
                        // closing bracket went missing; stop here and let
                        // the object parser see the keyword
                        warn!(token = %word, "array not closed before object keyword");
                        self.scanner.cursor().unread(word.as_bytes())?;
                        return Ok(array);
                    }
                    _ => {
                        warn!(token = %word, "discarding unexpected token in array");
                    }
                },
            }
        }
    }

    /// Parse a number: digits, sign, decimal point, exponent marker.
    fn parse_number(&mut self) -> ParseResult<CosObject> {
        let mut text = String::new();
        while let Some(b) = self.scanner.peek_byte()? {
            if !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            self.scanner.read_byte()?;
            text.push(b as char);
        }
        let is_real = text.contains(['.', 'e', 'E']);
        if !is_real {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(CosObject::Integer(i));
            }
        }
        text.parse::<f64>()
            .map(CosObject::Real)
            .map_err(|_| ParseError::SyntaxError {
                position: self.scanner.position(),
                message: format!("malformed number '{text}'"),
            })
    }

    /// After a dictionary body, a `stream` keyword switches to payload
    /// extraction; anything else is pushed back untouched.
    fn check_for_stream(&mut self, object: CosObject) -> ParseResult<CosObject> {
        self.scanner.skip_spaces()?;
        if self.scanner.peek_byte()? != Some(b's') {
            return Ok(object);
        }
        let token = self.scanner.read_bare_token()?;
        if token != "stream" {
            self.scanner.cursor().unread(token.as_bytes())?;
            return Ok(object);
        }
        let CosObject::Dictionary(dict) = object else {
            unreachable!("stream check is only run on dictionaries");
        };
        let declared = self.resolve_declared_length(&dict);
        let stream = extract_stream(&mut self.scanner, dict, &self.scratch, declared)?;
        Ok(CosObject::Stream(stream))
    }

    /// The declared `/Length`, following one level of indirection when the
    /// target object is already in the pool. Used as a cross-check only.
    fn resolve_declared_length(&self, dict: &CosDictionary) -> Option<i64> {
        match dict.get("Length")? {
            CosObject::Integer(n) => Some(*n),
            CosObject::Reference(key) => self.pool.get(*key).and_then(CosObject::as_integer),
            _ => None,
        }
    }
}

/// Validate a parsed `N G` header pair into an [`ObjectKey`].
fn object_key_from_header(number: i64, generation: i64, position: u64) -> ParseResult<ObjectKey> {
    let number = u32::try_from(number).map_err(|_| ParseError::SyntaxError {
        position,
        message: format!("object number {number} out of range"),
    })?;
    let generation = u16::try_from(generation).map_err(|_| ParseError::SyntaxError {
        position,
        message: format!("generation number {generation} out of range"),
    })?;
    Ok(ObjectKey::new(number, generation))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
