//! Restricted parser for string-encoded lists of strings.
//!
//! Test sets store the retrieved contexts of each answer as a single CSV cell.
//! Depending on who wrote the file that cell is either a JSON array or a
//! Python list repr such as `['first chunk', "it's second"]`. This parser
//! accepts exactly those two shapes: a bracketed, comma-separated sequence of
//! quoted strings. Nothing is ever evaluated.

use crate::error::LiteralError;

/// Parse a list-of-strings literal.
pub fn parse_string_list(input: &str) -> Result<Vec<String>, LiteralError> {
    if input.trim().is_empty() {
        return Err(LiteralError::Empty);
    }
    let mut parser = Parser {
        src: input,
        pos: 0,
    };
    parser.skip_ws();
    parser.expect('[', "'['")?;

    let mut items = Vec::new();
    loop {
        parser.skip_ws();
        match parser.peek() {
            Some(']') => {
                parser.bump();
                break;
            }
            Some('\'') | Some('"') => items.push(parser.string()?),
            _ => {
                return Err(LiteralError::Unexpected {
                    expected: "quoted string or ']'",
                    offset: parser.pos,
                });
            }
        }
        parser.skip_ws();
        match parser.peek() {
            Some(',') => parser.bump(),
            Some(']') => {
                parser.bump();
                break;
            }
            _ => {
                return Err(LiteralError::Unexpected {
                    expected: "',' or ']'",
                    offset: parser.pos,
                });
            }
        }
    }

    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(LiteralError::TrailingInput { offset: parser.pos });
    }
    Ok(items)
}

/// Encode a list of strings as a JSON array, the format written by this crate.
pub fn encode_string_list(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), LiteralError> {
        if self.peek() == Some(want) {
            self.bump();
            Ok(())
        } else {
            Err(LiteralError::Unexpected {
                expected,
                offset: self.pos,
            })
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let Some(quote) = self.peek() else {
            return Err(LiteralError::UnterminatedString { offset: start });
        };
        self.bump();

        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(LiteralError::UnterminatedString { offset: start });
            };
            self.bump();
            match c {
                c if c == quote => return Ok(out),
                '\\' => out.push(self.escape()?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, LiteralError> {
        let at = self.pos - 1;
        let Some(c) = self.peek() else {
            return Err(LiteralError::InvalidEscape { offset: at });
        };
        self.bump();
        let decoded = match c {
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '/' => '/',
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            'x' => self.hex(2, at)?,
            'u' => self.utf16(at)?,
            'U' => self.hex(8, at)?,
            _ => return Err(LiteralError::InvalidEscape { offset: at }),
        };
        Ok(decoded)
    }

    /// `\uXXXX`, joining a high surrogate with the `\uXXXX` low surrogate after it.
    fn utf16(&mut self, at: usize) -> Result<char, LiteralError> {
        let high = self.code_unit(4, at)?;
        if !(0xD800..0xDC00).contains(&high) {
            return char::from_u32(high).ok_or(LiteralError::InvalidEscape { offset: at });
        }
        if !self.src[self.pos..].starts_with("\\u") {
            return Err(LiteralError::InvalidEscape { offset: at });
        }
        self.pos += 2;
        let low = self.code_unit(4, at)?;
        if !(0xDC00..0xE000).contains(&low) {
            return Err(LiteralError::InvalidEscape { offset: at });
        }
        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(code).ok_or(LiteralError::InvalidEscape { offset: at })
    }

    fn hex(&mut self, digits: usize, at: usize) -> Result<char, LiteralError> {
        let code = self.code_unit(digits, at)?;
        char::from_u32(code).ok_or(LiteralError::InvalidEscape { offset: at })
    }

    fn code_unit(&mut self, digits: usize, at: usize) -> Result<u32, LiteralError> {
        let end = self.pos + digits;
        let code = self
            .src
            .get(self.pos..end)
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .ok_or(LiteralError::InvalidEscape { offset: at })?;
        self.pos = end;
        Ok(code)
    }
}
