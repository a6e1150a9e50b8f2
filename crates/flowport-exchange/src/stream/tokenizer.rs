//! Incremental JSON tokenizer.
//!
//! Bytes are fed in arbitrary chunks. Whenever a value is complete (a scalar,
//! or a container once its closing bracket arrives) the sink is called with
//! the value and its path from the root. The sink decides whether the value
//! stays attached to its parent container (`Some`) or is detached (`None`),
//! so a caller can claim large subtrees without the tokenizer keeping them.
//!
//! The result never depends on where chunk boundaries fall.

use std::fmt;

use serde_json::{Map, Number, Value};

use crate::{ExchangeError, Result};

/// One step of the path from the document root to a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, ".{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A completed value and where it sits in the document.
#[derive(Debug)]
pub struct ValueEvent<'a> {
    pub path: &'a [PathSegment],
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringState {
    Normal,
    Escape,
    Unicode { digits: u8, unit: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Value,
    ArrayFirst,
    ObjectFirst,
    ObjectKey,
    Colon,
    AfterValue,
    String(StringState),
    Number,
    Literal {
        expected: &'static [u8],
        matched: usize,
    },
    Done,
}

impl State {
    fn expecting(&self) -> &'static str {
        match self {
            Self::Value => "a value",
            Self::ArrayFirst => "a value or ']'",
            Self::ObjectFirst => "a key or '}'",
            Self::ObjectKey => "a key",
            Self::Colon => "':'",
            Self::AfterValue => "',' or a closing bracket",
            Self::String(StringState::Normal) => "a string character",
            Self::String(StringState::Escape) => "an escape character",
            Self::String(StringState::Unicode { .. }) => "a hex digit",
            Self::Number => "a digit",
            Self::Literal { .. } => "a literal",
            Self::Done => "end of input",
        }
    }
}

#[derive(Debug)]
enum Frame {
    Object(Map<String, Value>),
    Array(Vec<Value>),
}

/// Push-based JSON tokenizer.
#[derive(Debug)]
pub struct Tokenizer {
    state: State,
    frames: Vec<Frame>,
    /// One segment per open frame: the key or index currently being filled.
    path: Vec<PathSegment>,
    /// Bytes of the string or number being read.
    buf: Vec<u8>,
    string_is_key: bool,
    /// Leading surrogate awaiting its trailing half.
    pending_high: Option<u16>,
    offset: u64,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            state: State::Value,
            frames: Vec::new(),
            path: Vec::new(),
            buf: Vec::new(),
            string_is_key: false,
            pending_high: None,
            offset: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether a complete top-level value has been read.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feed the next chunk of the document.
    pub fn write<F>(&mut self, chunk: &[u8], sink: &mut F) -> Result<()>
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        for &byte in chunk {
            while !self.step(byte, sink)? {}
            self.offset += 1;
        }
        Ok(())
    }

    /// Signal the end of the document.
    pub fn end<F>(&mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        if self.state == State::Number {
            self.finish_number(sink)?;
        }
        if self.state != State::Done {
            return Err(ExchangeError::DocumentSyntax(format!(
                "unexpected end of input at byte {}, expected {}",
                self.offset,
                self.state.expecting()
            )));
        }
        Ok(())
    }

    /// Process one byte. Returns `false` if the byte must be processed again
    /// in the new state.
    fn step<F>(&mut self, byte: u8, sink: &mut F) -> Result<bool>
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        match self.state {
            State::Value => self.begin_value(byte)?,
            State::ArrayFirst => match byte {
                _ if is_whitespace(byte) => {}
                b']' => self.close_container(sink),
                _ => self.begin_value(byte)?,
            },
            State::ObjectFirst => match byte {
                _ if is_whitespace(byte) => {}
                b'}' => self.close_container(sink),
                b'"' => self.begin_string(true),
                _ => return Err(self.unexpected(byte)),
            },
            State::ObjectKey => match byte {
                _ if is_whitespace(byte) => {}
                b'"' => self.begin_string(true),
                _ => return Err(self.unexpected(byte)),
            },
            State::Colon => match byte {
                _ if is_whitespace(byte) => {}
                b':' => self.state = State::Value,
                _ => return Err(self.unexpected(byte)),
            },
            State::AfterValue => {
                let in_array = matches!(self.frames.last(), Some(Frame::Array(_)));
                match byte {
                    _ if is_whitespace(byte) => {}
                    b',' if in_array => self.state = State::Value,
                    b',' => self.state = State::ObjectKey,
                    b']' if in_array => self.close_container(sink),
                    b'}' if !in_array => self.close_container(sink),
                    _ => return Err(self.unexpected(byte)),
                }
            }
            State::String(string) => self.string_byte(string, byte, sink)?,
            State::Number => {
                if matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                    self.buf.push(byte);
                } else {
                    self.finish_number(sink)?;
                    return Ok(false);
                }
            }
            State::Literal { expected, matched } => {
                if expected.get(matched) != Some(&byte) {
                    return Err(self.unexpected(byte));
                }
                if matched + 1 == expected.len() {
                    let value = match expected[0] {
                        b't' => Value::Bool(true),
                        b'f' => Value::Bool(false),
                        _ => Value::Null,
                    };
                    self.complete_value(value, sink);
                } else {
                    self.state = State::Literal {
                        expected,
                        matched: matched + 1,
                    };
                }
            }
            State::Done => {
                if !is_whitespace(byte) {
                    return Err(self.unexpected(byte));
                }
            }
        }
        Ok(true)
    }

    fn begin_value(&mut self, byte: u8) -> Result<()> {
        match byte {
            _ if is_whitespace(byte) => {}
            b'{' => {
                self.frames.push(Frame::Object(Map::new()));
                self.path.push(PathSegment::Key(String::new()));
                self.state = State::ObjectFirst;
            }
            b'[' => {
                self.frames.push(Frame::Array(Vec::new()));
                self.path.push(PathSegment::Index(0));
                self.state = State::ArrayFirst;
            }
            b'"' => self.begin_string(false),
            b'-' | b'0'..=b'9' => {
                self.buf.clear();
                self.buf.push(byte);
                self.state = State::Number;
            }
            b't' => self.begin_literal(b"true"),
            b'f' => self.begin_literal(b"false"),
            b'n' => self.begin_literal(b"null"),
            _ => return Err(self.unexpected(byte)),
        }
        Ok(())
    }

    fn begin_string(&mut self, is_key: bool) {
        self.buf.clear();
        self.string_is_key = is_key;
        self.state = State::String(StringState::Normal);
    }

    fn begin_literal(&mut self, expected: &'static [u8]) {
        self.state = State::Literal {
            expected,
            matched: 1,
        };
    }

    fn string_byte<F>(&mut self, string: StringState, byte: u8, sink: &mut F) -> Result<()>
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        match string {
            StringState::Normal => {
                if self.pending_high.is_some() && byte != b'\\' {
                    return Err(self.syntax("unpaired surrogate in string"));
                }
                match byte {
                    b'"' => self.finish_string(sink)?,
                    b'\\' => self.state = State::String(StringState::Escape),
                    0x00..=0x1f => return Err(self.unexpected(byte)),
                    _ => self.buf.push(byte),
                }
            }
            StringState::Escape => {
                if self.pending_high.is_some() && byte != b'u' {
                    return Err(self.syntax("unpaired surrogate in string"));
                }
                let unescaped = match byte {
                    b'"' => b'"',
                    b'\\' => b'\\',
                    b'/' => b'/',
                    b'b' => 0x08,
                    b'f' => 0x0c,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'u' => {
                        self.state = State::String(StringState::Unicode { digits: 0, unit: 0 });
                        return Ok(());
                    }
                    _ => return Err(self.unexpected(byte)),
                };
                self.buf.push(unescaped);
                self.state = State::String(StringState::Normal);
            }
            StringState::Unicode { digits, unit } => {
                let digit = (byte as char)
                    .to_digit(16)
                    .ok_or_else(|| self.unexpected(byte))?;
                let unit = (unit << 4) | digit as u16;
                if digits < 3 {
                    self.state = State::String(StringState::Unicode {
                        digits: digits + 1,
                        unit,
                    });
                    return Ok(());
                }
                self.push_code_unit(unit)?;
                self.state = State::String(StringState::Normal);
            }
        }
        Ok(())
    }

    fn push_code_unit(&mut self, unit: u16) -> Result<()> {
        let code_point = match (self.pending_high.take(), unit) {
            (None, 0xd800..=0xdbff) => {
                self.pending_high = Some(unit);
                return Ok(());
            }
            (Some(high), 0xdc00..=0xdfff) => {
                0x10000 + ((u32::from(high) - 0xd800) << 10) + (u32::from(unit) - 0xdc00)
            }
            (None, 0xdc00..=0xdfff) | (Some(_), _) => {
                return Err(self.syntax("unpaired surrogate in string"));
            }
            (None, unit) => u32::from(unit),
        };
        let ch = char::from_u32(code_point).ok_or_else(|| self.syntax("invalid unicode escape"))?;
        let mut encoded = [0u8; 4];
        self.buf.extend_from_slice(ch.encode_utf8(&mut encoded).as_bytes());
        Ok(())
    }

    fn finish_string<F>(&mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        let text = String::from_utf8(std::mem::take(&mut self.buf))
            .map_err(|_| self.syntax("invalid UTF-8 in string"))?;
        if self.string_is_key {
            if let Some(segment) = self.path.last_mut() {
                *segment = PathSegment::Key(text);
            }
            self.state = State::Colon;
        } else {
            self.complete_value(Value::String(text), sink);
        }
        Ok(())
    }

    fn finish_number<F>(&mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        let number: Number = serde_json::from_slice(&self.buf).map_err(|_| {
            self.syntax(&format!(
                "invalid number '{}'",
                String::from_utf8_lossy(&self.buf)
            ))
        })?;
        self.buf.clear();
        self.complete_value(Value::Number(number), sink);
        Ok(())
    }

    fn close_container<F>(&mut self, sink: &mut F)
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        self.path.pop();
        let value = match self.frames.pop() {
            Some(Frame::Object(map)) => Value::Object(map),
            Some(Frame::Array(items)) => Value::Array(items),
            None => Value::Null,
        };
        self.complete_value(value, sink);
    }

    /// Hand a finished value to the sink and attach whatever it returns to
    /// the enclosing container.
    fn complete_value<F>(&mut self, value: Value, sink: &mut F)
    where
        F: FnMut(ValueEvent<'_>) -> Option<Value>,
    {
        let kept = sink(ValueEvent {
            path: &self.path,
            value,
        });

        match (self.frames.last_mut(), self.path.last_mut()) {
            (Some(Frame::Object(map)), Some(PathSegment::Key(key))) => {
                if let Some(value) = kept {
                    map.insert(std::mem::take(key), value);
                }
                self.state = State::AfterValue;
            }
            (Some(Frame::Array(items)), Some(PathSegment::Index(index))) => {
                if let Some(value) = kept {
                    items.push(value);
                }
                *index += 1;
                self.state = State::AfterValue;
            }
            _ => self.state = State::Done,
        }
    }

    fn unexpected(&self, byte: u8) -> ExchangeError {
        let found = if byte.is_ascii_graphic() {
            format!("'{}'", byte as char)
        } else {
            format!("byte 0x{byte:02x}")
        };
        ExchangeError::DocumentSyntax(format!(
            "unexpected {found} at byte {}, expected {}",
            self.offset,
            self.state.expecting()
        ))
    }

    fn syntax(&self, message: &str) -> ExchangeError {
        ExchangeError::DocumentSyntax(format!("{message} at byte {}", self.offset))
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
