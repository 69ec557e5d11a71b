//! The byte streamer (spec. 2, "Byte streamer") and the cursor-tracking
//! lexing buffer built on top of it. Grounded on the teacher's
//! `html::lex::Lex` cursor/position bookkeeping, generalized to pull its
//! bytes lazily from any [Read] instead of holding the whole document in
//! memory up front.

use std::io::Read;

use crate::{err_at, token::Position, Error, Result};

/// Reads a byte source in fixed-size blocks. Each block returned is a valid
/// UTF-8 boundary: if a read ends mid-codepoint, the incomplete trailing
/// bytes are held back and prefixed onto the next block instead of being
/// handed to the caller, so every block [`BlockReader::next_block`] returns
/// is safe to treat as its own `&str`.
pub struct BlockReader<R> {
    inner: R,
    block_size: usize,
    carry: Vec<u8>,
    eof: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(inner: R, block_size: usize) -> BlockReader<R> {
        BlockReader { inner, block_size, carry: Vec::new(), eof: false }
    }

    /// Returns the next overlap-safe block, or `None` once the source and
    /// any deferred bytes are exhausted.
    pub fn next_block(&mut self) -> Result<Option<String>> {
        if self.eof && self.carry.is_empty() {
            return Ok(None);
        }

        let mut buf = std::mem::take(&mut self.carry);
        let start = buf.len();
        buf.resize(start + self.block_size, 0);
        let n = err_at!(IOError, self.inner.read(&mut buf[start..]))?;
        buf.truncate(start + n);
        if n == 0 {
            self.eof = true;
        }

        if buf.is_empty() {
            return Ok(None);
        }

        let valid_upto = match std::str::from_utf8(&buf) {
            Ok(_) => buf.len(),
            Err(e) => e.valid_up_to(),
        };

        // At true EOF an incomplete tail is malformed input, not a boundary
        // to defer; surface the whole buffer and let the tokenizer reject it.
        let valid_upto = if self.eof { buf.len() } else { valid_upto };

        self.carry = buf[valid_upto..].to_vec();
        let text = err_at!(MalformedInput, String::from_utf8(buf[..valid_upto].to_vec()))?;
        if text.is_empty() && !self.eof {
            return self.next_block();
        }
        Ok(Some(text))
    }
}

/// A growing text buffer with a cursor, fed lazily from a [BlockReader].
/// Consumed text is periodically dropped from the front so memory use stays
/// bounded by the distance between the cursor and the start of the current
/// token, not by the size of the whole stream.
pub struct Lex<R> {
    reader: BlockReader<R>,
    buf: String,
    base_row: usize,
    base_col: usize,
    cursor: usize,
    closed: bool,
}

impl<R: Read> Lex<R> {
    pub fn new(inner: R, block_size: usize) -> Lex<R> {
        Lex {
            reader: BlockReader::new(inner, block_size),
            buf: String::new(),
            base_row: 0,
            base_col: 0,
            cursor: 0,
            closed: false,
        }
    }

    fn refill(&mut self) -> Result<bool> {
        match self.reader.next_block()? {
            Some(text) => {
                self.buf.push_str(&text);
                Ok(true)
            }
            None => {
                self.closed = true;
                Ok(false)
            }
        }
    }

    /// Ensure at least `n` bytes are available past the cursor, refilling
    /// from the source as needed. Returns `false` if the source closed
    /// before `n` bytes became available.
    pub fn ensure(&mut self, n: usize) -> Result<bool> {
        while self.buf.len() - self.cursor < n && !self.closed {
            self.refill()?;
        }
        Ok(self.buf.len() - self.cursor >= n)
    }

    /// Pull more input until the cursor view is non-empty or the source is
    /// exhausted. Used by the tokenizer to distinguish "need more bytes"
    /// from "truly at end of input".
    pub fn fill_some(&mut self) -> Result<()> {
        while self.buf.len() == self.cursor && !self.closed {
            self.refill()?;
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.buf[self.cursor..]
    }

    pub fn is_eof(&self) -> bool {
        self.closed && self.cursor >= self.buf.len()
    }

    /// True once the underlying source has signalled end-of-stream, even if
    /// buffered bytes past the cursor remain to be consumed.
    pub fn is_source_closed(&self) -> bool {
        self.closed
    }

    pub fn to_position(&self) -> Position {
        Position(self.base_row + 1, self.base_col + 1)
    }

    pub fn move_cursor(&mut self, n: usize) {
        for ch in self.buf[self.cursor..(self.cursor + n)].chars() {
            match ch {
                '\n' => {
                    self.base_row += 1;
                    self.base_col = 0;
                }
                _ => self.base_col += 1,
            }
        }
        self.cursor += n;

        // Compact once the consumed prefix grows past a few blocks' worth;
        // keeps a long-running stream from pinning the whole document.
        if self.cursor > 1 << 20 {
            self.buf.drain(..self.cursor);
            self.cursor = 0;
        }
    }
}
