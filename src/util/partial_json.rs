//! Best-effort parsing of JSON documents that are still being streamed.
//!
//! Tool-call arguments arrive as string fragments. Between fragments the
//! accumulated text is usually not valid JSON yet, but the caller still wants
//! to show (or inspect) whatever structure is already there. [`parse_partial`]
//! treats every unterminated string, array and object as if it were closed at
//! the current end of input.

use serde_json::{Map, Number, Value};

/// Parse `input`, closing any unterminated string, array or object at the end
/// of the input.
///
/// Incomplete keys and values that cannot be recovered (a key without its
/// value, a lone `-`) are left out. Never fails: input that is malformed
/// rather than merely incomplete yields an empty object.
pub fn parse_partial(input: &str) -> Value {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return empty_object();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    let mut parser = PartialParser::new(trimmed);
    match parser.parse_value() {
        Ok(Some(value)) => {
            parser.skip_whitespace();
            if parser.at_end() {
                value
            } else {
                empty_object()
            }
        }
        Ok(None) | Err(Malformed) => empty_object(),
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Input that can never become valid JSON by appending more text.
struct Malformed;

struct PartialParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PartialParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            self.pos += 1;
        }
    }

    /// `Ok(None)` means the input ended before a usable value was read.
    fn parse_value(&mut self) -> Result<Option<Value>, Malformed> {
        self.skip_whitespace();
        let Some(byte) = self.peek() else {
            return Ok(None);
        };
        match byte {
            b'{' => self.parse_object().map(Some),
            b'[' => self.parse_array().map(Some),
            b'"' => self.parse_string().map(|s| Some(Value::String(s))),
            b't' => self.parse_literal("true", Value::Bool(true)),
            b'f' => self.parse_literal("false", Value::Bool(false)),
            b'n' => self.parse_literal("null", Value::Null),
            b'-' | b'0'..=b'9' => Ok(self.parse_number()),
            _ => Err(Malformed),
        }
    }

    fn parse_object(&mut self) -> Result<Value, Malformed> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(Value::Object(map)),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(b'"') => {}
                Some(_) => return Err(Malformed),
            }

            let key = self.parse_string()?;
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(Value::Object(map)),
                Some(b':') => self.pos += 1,
                Some(_) => return Err(Malformed),
            }

            match self.parse_value()? {
                Some(value) => {
                    map.insert(key, value);
                }
                None if self.at_end() => return Ok(Value::Object(map)),
                None => {}
            }

            self.skip_whitespace();
            match self.peek() {
                None => return Ok(Value::Object(map)),
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(_) => return Err(Malformed),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Value, Malformed> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(Value::Array(items)),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(_) => {}
            }

            match self.parse_value()? {
                Some(value) => items.push(value),
                None if self.at_end() => return Ok(Value::Array(items)),
                None => {}
            }

            self.skip_whitespace();
            match self.peek() {
                None => return Ok(Value::Array(items)),
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(_) => return Err(Malformed),
            }
        }
    }

    /// Reads a string starting at the opening quote. An unterminated string
    /// (including one cut inside an escape sequence) ends at end of input.
    fn parse_string(&mut self) -> Result<String, Malformed> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(byte) = self.peek() else {
                return Ok(out);
            };
            match byte {
                b'"' => {
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    let Some(escape) = self.bytes.get(self.pos + 1).copied() else {
                        self.pos = self.bytes.len();
                        return Ok(out);
                    };
                    self.pos += 2;
                    match escape {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{0008}'),
                        b'f' => out.push('\u{000c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => match self.parse_unicode_escape()? {
                            Some(ch) => out.push(ch),
                            None => {
                                self.pos = self.bytes.len();
                                return Ok(out);
                            }
                        },
                        _ => return Err(Malformed),
                    }
                }
                _ => {
                    let start = self.pos;
                    while let Some(b) = self.peek() {
                        if b == b'"' || b == b'\\' {
                            break;
                        }
                        self.pos += 1;
                    }
                    out.push_str(&self.src[start..self.pos]);
                }
            }
        }
    }

    /// `Ok(None)` when the escape is cut off by the end of input.
    fn parse_unicode_escape(&mut self) -> Result<Option<char>, Malformed> {
        let Some(high) = self.read_hex4()? else {
            return Ok(None);
        };
        if !(0xD800..0xDC00).contains(&high) {
            return Ok(Some(
                char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER),
            ));
        }

        match (self.peek(), self.bytes.get(self.pos + 1).copied()) {
            (None, _) | (Some(b'\\'), None) => Ok(None),
            (Some(b'\\'), Some(b'u')) => {
                self.pos += 2;
                match self.read_hex4()? {
                    None => Ok(None),
                    Some(low) if (0xDC00..0xE000).contains(&low) => {
                        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                        Ok(Some(
                            char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
                        ))
                    }
                    Some(_) => Err(Malformed),
                }
            }
            _ => Ok(Some(char::REPLACEMENT_CHARACTER)),
        }
    }

    fn read_hex4(&mut self) -> Result<Option<u32>, Malformed> {
        let mut value = 0u32;
        for _ in 0..4 {
            let Some(byte) = self.peek() else {
                return Ok(None);
            };
            let digit = char::from(byte).to_digit(16).ok_or(Malformed)?;
            value = value * 16 + digit;
            self.pos += 1;
        }
        Ok(Some(value))
    }

    /// Literals cut short (`tr`, `nu`) are completed.
    fn parse_literal(&mut self, word: &str, value: Value) -> Result<Option<Value>, Malformed> {
        let rest = &self.bytes[self.pos..];
        let word = word.as_bytes();
        let len = rest.len().min(word.len());
        if rest[..len] != word[..len] {
            return Err(Malformed);
        }
        self.pos += len;
        Ok(Some(value))
    }

    /// Numbers cut short (`1.`, `2e`) fall back to their longest valid prefix.
    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
        ) {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        if let Ok(number) = serde_json::from_str::<Number>(text) {
            return Some(Value::Number(number));
        }
        let trimmed = text.trim_end_matches(['.', 'e', 'E', '+', '-']);
        serde_json::from_str::<Number>(trimmed)
            .ok()
            .map(Value::Number)
    }
}
