//! Framing for a top-level JSON array streamed element by element
//!
//! The codec does not parse JSON. It only tracks string/escape state and
//! bracket depth, enough to find where each element ends.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::{Frame, UTF8_BOM};
use crate::error::{ConsumeError, Fault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the opening '['
    Start,
    /// Expecting an element (or ']' if the array is still empty)
    BeforeItem { first: bool },
    /// Inside an element that began at the front of the buffer
    InItem,
    /// Expecting ',' or ']'
    AfterItem,
    /// The closing ']' was seen; only whitespace may follow
    Done,
    /// [`Frame::End`] was emitted at end of input
    Ended,
}

/// Splits `[a, b, c]` into frames `a`, `b`, `c` followed by [`Frame::End`]
///
/// `End` is only emitted at end of input, once the bytes after the closing
/// `]` are known to be whitespace.
#[derive(Debug)]
pub struct JsonArrayCodec {
    state: State,
    max_item_bytes: usize,
    /// Stream offset of the front of the buffer, for error messages
    offset: usize,
    /// How far into the current element we have scanned
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonArrayCodec {
    pub fn new(max_item_bytes: usize) -> Self {
        Self {
            state: State::Start,
            max_item_bytes,
            offset: 0,
            scanned: 0,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    fn advance(&mut self, src: &mut BytesMut, n: usize) {
        src.advance(n);
        self.offset += n;
    }

    /// Drop leading whitespace; returns the next significant byte, if any
    fn skip_whitespace(&mut self, src: &mut BytesMut) -> Option<u8> {
        let n = src
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.advance(src, n);
        src.first().copied()
    }

    fn unexpected(&self, found: u8, expected: &'static str) -> Fault {
        ConsumeError::Framing {
            found: found as char,
            offset: self.offset,
            expected,
        }
        .into()
    }

    fn begin_item(&mut self) {
        self.state = State::InItem;
        self.scanned = 0;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }

    /// Length of the element at the front of `src`, once it is complete
    fn scan_item(&mut self, src: &BytesMut) -> Result<Option<usize>, Fault> {
        for (i, &byte) in src.iter().enumerate().skip(self.scanned) {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Ok(Some(i + 1));
                    }
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Ok(Some(i + 1));
                    }
                }
                // Separators inside a container belong to the element
                _ if self.depth > 0 => {}
                // A scalar runs until the next delimiter, which stays in the buffer
                b',' | b']' => return Ok(Some(i)),
                b'}' => return Err(self.unexpected(byte, "a value")),
                b if b.is_ascii_whitespace() => return Ok(Some(i)),
                _ => {}
            }
        }

        self.scanned = src.len();
        if self.scanned > self.max_item_bytes {
            return Err(ConsumeError::ItemTooLarge {
                limit: self.max_item_bytes,
            }
            .into());
        }
        Ok(None)
    }
}

impl Decoder for JsonArrayCodec {
    type Item = Frame;
    type Error = Fault;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Fault> {
        loop {
            match self.state {
                State::Start => {
                    if self.offset == 0 && src.starts_with(UTF8_BOM) {
                        self.advance(src, UTF8_BOM.len());
                    } else if self.offset == 0
                        && !src.is_empty()
                        && UTF8_BOM.starts_with(&src[..])
                    {
                        // Partial BOM; wait for the rest
                        return Ok(None);
                    }
                    match self.skip_whitespace(src) {
                        None => return Ok(None),
                        Some(b'[') => {
                            self.advance(src, 1);
                            self.state = State::BeforeItem { first: true };
                        }
                        Some(byte) => return Err(self.unexpected(byte, "'['")),
                    }
                }
                State::BeforeItem { first } => match self.skip_whitespace(src) {
                    None => return Ok(None),
                    Some(b']') if first => {
                        self.advance(src, 1);
                        self.state = State::Done;
                    }
                    Some(byte @ (b']' | b',')) => return Err(self.unexpected(byte, "a value")),
                    Some(_) => self.begin_item(),
                },
                State::InItem => match self.scan_item(src)? {
                    None => return Ok(None),
                    Some(len) => {
                        if len > self.max_item_bytes {
                            return Err(ConsumeError::ItemTooLarge {
                                limit: self.max_item_bytes,
                            }
                            .into());
                        }
                        let item = src.split_to(len).freeze();
                        self.offset += len;
                        self.state = State::AfterItem;
                        return Ok(Some(Frame::Item(item)));
                    }
                },
                State::AfterItem => match self.skip_whitespace(src) {
                    None => return Ok(None),
                    Some(b',') => {
                        self.advance(src, 1);
                        self.state = State::BeforeItem { first: false };
                    }
                    Some(b']') => {
                        self.advance(src, 1);
                        self.state = State::Done;
                    }
                    Some(byte) => return Err(self.unexpected(byte, "',' or ']'")),
                },
                State::Done => match self.skip_whitespace(src) {
                    None => return Ok(None),
                    Some(byte) => return Err(self.unexpected(byte, "end of stream")),
                },
                State::Ended => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Fault> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match self.state {
            State::Done => {
                self.state = State::Ended;
                Ok(Some(Frame::End))
            }
            State::Ended => Ok(None),
            // A bare scalar is only complete once its delimiter arrives
            _ => Err(ConsumeError::Truncated.into()),
        }
    }
}
