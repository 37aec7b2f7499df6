//! Content-stream tokenizer
//!
//! Splits a content stream into operand values and operator tokens,
//! reusing the value parser's dispatch for operands. Inline images get
//! special handling: their parameter dictionary is parsed, then the raw
//! pixel data is scanned for the `EI` end marker with a byte-count gate so
//! an `EI` occurring inside the pixel bytes does not end the image early.

use std::io::Read;

use tracing::warn;

use super::object_parser::{CosParser, ParsedValue};
use super::objects::{CosDictionary, CosObject};
use super::scanner::{is_delimiter, is_whitespace};
use super::{ParseError, ParseResult};

/// One token of a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken {
    /// An operand value preceding an operator.
    Object(CosObject),
    /// A bare operator name.
    Operator(String),
    /// An inline image: its parameter dictionary and raw data bytes.
    InlineImage {
        params: CosDictionary,
        data: Vec<u8>,
    },
}

/// Tokenizer over a content stream.
pub struct ContentParser<R> {
    parser: CosParser<R>,
}

impl<R: Read> ContentParser<R> {
    pub fn new(source: R) -> ParseResult<Self> {
        Ok(Self {
            parser: CosParser::new(source)?,
        })
    }

    /// The next token, or `None` at end of stream.
    pub fn next_token(&mut self) -> ParseResult<Option<ContentToken>> {
        self.parser.scanner().skip_spaces()?;
        let Some(byte) = self.parser.scanner().peek_byte()? else {
            return Ok(None);
        };

        match byte {
            // ']' rides along so a stray closer becomes a lenient null
            // instead of stopping tokenization
            b'/' | b'(' | b'<' | b'[' | b']' | b'0'..=b'9' | b'-' | b'+' | b'.' => {
                match self.parser.parse_value()? {
                    ParsedValue::Object(obj) => Ok(Some(ContentToken::Object(obj))),
                    ParsedValue::BareWord(word) => Ok(Some(ContentToken::Operator(word))),
                }
            }
            _ => {
                let op = self.read_operator()?;
                match op.as_str() {
                    "" => {
                        // corrupt stream; nothing more can be tokenized
                        warn!(
                            position = self.parser.scanner().position(),
                            "empty operator token, stopping content tokenization"
                        );
                        Ok(None)
                    }
                    "true" => Ok(Some(ContentToken::Object(CosObject::Boolean(true)))),
                    "false" => Ok(Some(ContentToken::Object(CosObject::Boolean(false)))),
                    "null" => Ok(Some(ContentToken::Object(CosObject::Null))),
                    "BI" => self.parse_inline_image().map(Some),
                    _ => Ok(Some(ContentToken::Operator(op))),
                }
            }
        }
    }

    /// Read an operator name: stops at whitespace, delimiters, and digits
    /// (operands following an operator are often not separated).
    fn read_operator(&mut self) -> ParseResult<String> {
        let scanner = self.parser.scanner();
        scanner.skip_spaces()?;
        let mut op = String::new();
        while let Some(b) = scanner.peek_byte()? {
            if is_delimiter(b) || b.is_ascii_digit() {
                break;
            }
            scanner.read_byte()?;
            op.push(b as char);
        }
        Ok(op)
    }

    /// Parse the body of an inline image; the `BI` operator is already
    /// consumed. Consumes through the image data and pushes the `EI`
    /// marker back so the caller sees it as an ordinary operator.
    fn parse_inline_image(&mut self) -> ParseResult<ContentToken> {
        let mut params = CosDictionary::new();
        loop {
            self.parser.scanner().skip_spaces()?;
            match self.parser.scanner().peek_byte()? {
                Some(b'/') => {
                    let key = match self.parser.parse_value()? {
                        ParsedValue::Object(CosObject::Name(name)) => name,
                        other => {
                            return Err(ParseError::SyntaxError {
                                position: self.parser.scanner().position(),
                                message: format!(
                                    "expected image parameter name, found {}",
                                    describe(&other)
                                ),
                            })
                        }
                    };
                    let value = match self.parser.parse_value()? {
                        ParsedValue::Object(obj) => obj,
                        ParsedValue::BareWord(word) => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "image parameter value".to_string(),
                                found: word,
                            })
                        }
                    };
                    params.insert(key, value);
                }
                _ => {
                    let token = self.parser.scanner().read_bare_token()?;
                    if token == "ID" {
                        break;
                    }
                    return Err(ParseError::UnexpectedToken {
                        expected: "ID".to_string(),
                        found: token,
                    });
                }
            }
        }

        // exactly one separator byte between ID and the data
        if let Some(b) = self.parser.scanner().read_byte()? {
            if !is_whitespace(b) {
                self.parser.scanner().cursor().unread_byte(b)?;
            }
        }

        let expected = expected_data_bytes(&params);
        let data = self.scan_image_data(expected)?;
        Ok(ContentToken::InlineImage { params, data })
    }

    /// Scan raw image bytes until `[ws] E I [ws]` with at least `expected`
    /// data bytes consumed. The separator whitespace before `EI` is not
    /// part of the data; `E`,`I` are pushed back for the outer loop.
    fn scan_image_data(&mut self, expected: usize) -> ParseResult<Vec<u8>> {
        let mut data = Vec::new();
        loop {
            let Some(b) = self.parser.scanner().read_byte()? else {
                return Err(ParseError::SyntaxError {
                    position: self.parser.scanner().position(),
                    message: "inline image data not terminated by 'EI'".to_string(),
                });
            };
            data.push(b);

            let n = data.len();
            if n < 2 || data[n - 2] != b'E' || data[n - 1] != b'I' {
                continue;
            }
            // the marker needs a separator before it; the start of the
            // data counts, so a zero-length image is `ID EI`
            let body = if n == 2 {
                0
            } else if is_whitespace(data[n - 3]) {
                n - 3
            } else {
                continue;
            };
            match self.parser.scanner().peek_byte()? {
                Some(next) if !is_whitespace(next) => continue,
                _ => {}
            }
            if body < expected {
                continue;
            }
            data.truncate(body);
            self.parser.scanner().cursor().unread(b"EI")?;
            return Ok(data);
        }
    }
}

/// Expected image data size from the parameter dictionary, in bytes,
/// rounded up to whole bytes. Parameters may use abbreviated or full
/// names; a missing dimension disables the count gate.
fn expected_data_bytes(params: &CosDictionary) -> usize {
    let get = |short: &str, long: &str| {
        params
            .get(short)
            .or_else(|| params.get(long))
            .and_then(CosObject::as_integer)
    };
    let width = get("W", "Width").unwrap_or(0);
    let height = get("H", "Height").unwrap_or(0);
    let bpc = get("BPC", "BitsPerComponent").unwrap_or(8);
    if width <= 0 || height <= 0 || bpc <= 0 {
        return 0;
    }
    let bits = width.saturating_mul(height).saturating_mul(bpc);
    (bits.saturating_add(7) / 8) as usize
}

fn describe(value: &ParsedValue) -> String {
    match value {
        ParsedValue::Object(obj) => format!("{obj:?}"),
        ParsedValue::BareWord(word) => format!("'{word}'"),
    }
}
