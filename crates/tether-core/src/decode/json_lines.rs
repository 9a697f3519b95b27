//! Framing for newline-delimited JSON

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use super::{Frame, UTF8_BOM};
use crate::error::{ConsumeError, Fault};

/// One frame per non-blank line; a trailing `\r` is dropped
#[derive(Debug)]
pub struct JsonLinesCodec {
    max_item_bytes: usize,
    /// Bytes already searched for a newline
    scanned: usize,
    /// Nothing consumed yet, so a BOM may still be pending
    at_start: bool,
}

impl JsonLinesCodec {
    pub fn new(max_item_bytes: usize) -> Self {
        Self {
            max_item_bytes,
            scanned: 0,
            at_start: true,
        }
    }

    /// Drop a leading BOM; `false` while a partial one waits for more bytes
    fn skip_bom(&mut self, src: &mut BytesMut) -> bool {
        if !self.at_start {
            return true;
        }
        if src.starts_with(UTF8_BOM) {
            src.advance(UTF8_BOM.len());
        } else if UTF8_BOM.starts_with(&src[..]) {
            return false;
        }
        self.at_start = false;
        true
    }

    fn frame(&self, mut line: Bytes) -> Result<Option<Frame>, Fault> {
        if line.ends_with(b"\n") {
            line.truncate(line.len() - 1);
        }
        if line.ends_with(b"\r") {
            line.truncate(line.len() - 1);
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        if line.len() > self.max_item_bytes {
            return Err(ConsumeError::ItemTooLarge {
                limit: self.max_item_bytes,
            }
            .into());
        }
        Ok(Some(Frame::Item(line)))
    }
}

impl Decoder for JsonLinesCodec {
    type Item = Frame;
    type Error = Fault;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Fault> {
        if !self.skip_bom(src) {
            return Ok(None);
        }
        loop {
            let Some(pos) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = src.len();
                if self.scanned > self.max_item_bytes {
                    return Err(ConsumeError::ItemTooLarge {
                        limit: self.max_item_bytes,
                    }
                    .into());
                }
                return Ok(None);
            };

            let line = src.split_to(self.scanned + pos + 1).freeze();
            self.scanned = 0;
            if let Some(frame) = self.frame(line)? {
                return Ok(Some(frame));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Fault> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Final line without a terminator
        let line = src.copy_to_bytes(src.len());
        self.scanned = 0;
        self.frame(line)
    }
}
