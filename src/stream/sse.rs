//! Incremental decoding and line framing for upstream `data:` streams.
//!
//! Bytes arrive in arbitrary chunks: a chunk may end in the middle of a
//! multi-byte character or in the middle of a line. [`Utf8ChunkDecoder`]
//! carries the incomplete character over to the next chunk and
//! [`DataLineParser`] carries the incomplete line, so the payloads handed to
//! the caller never depend on where the transport split the input.

use memchr::memchr_iter;

const DATA_PREFIX: &str = "data: ";
const COMPACT_THRESHOLD: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// Utf8ChunkDecoder
// ---------------------------------------------------------------------------

/// Stateful UTF-8 decoder.
///
/// Invalid sequences are replaced with U+FFFD; an incomplete sequence at the
/// end of a chunk is held back until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    remainder: Vec<u8>,
}

impl Utf8ChunkDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and append the text to `out`.
    pub fn decode_into(&mut self, chunk: &[u8], out: &mut String) {
        if self.remainder.is_empty() {
            if let Ok(text) = std::str::from_utf8(chunk) {
                out.push_str(text);
                return;
            }
            let tail = decode_lossy_prefix(chunk, out);
            self.remainder.extend_from_slice(tail);
            return;
        }

        let mut joined = std::mem::take(&mut self.remainder);
        joined.extend_from_slice(chunk);
        let tail = decode_lossy_prefix(&joined, out);
        self.remainder.extend_from_slice(tail);
    }

    /// Flush a dangling incomplete sequence at end of input.
    pub fn finish_into(&mut self, out: &mut String) {
        if !self.remainder.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.remainder));
            self.remainder.clear();
        }
    }

    /// Number of bytes held back waiting for the rest of a character.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.remainder.len()
    }
}

/// Decode as much of `bytes` as possible into `out`, returning the trailing
/// incomplete sequence (empty when the input ends on a character boundary).
fn decode_lossy_prefix<'a>(mut bytes: &'a [u8], out: &mut String) -> &'a [u8] {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                out.push_str(text);
                return &[];
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if let Ok(text) = std::str::from_utf8(&bytes[..valid_up_to]) {
                    out.push_str(text);
                }
                match e.error_len() {
                    Some(invalid_len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        bytes = &bytes[valid_up_to + invalid_len..];
                    }
                    None => return &bytes[valid_up_to..],
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DataLineParser
// ---------------------------------------------------------------------------

/// Incremental line splitter that surfaces `data: ` payloads.
///
/// Feed it decoded text; every complete line starting with `data: ` yields
/// its trimmed payload. Blank lines, comments, `event:` lines and anything
/// else without the prefix are ignored. The last, possibly incomplete line is
/// kept until more text arrives or [`DataLineParser::finish`] is called.
#[derive(Debug, Default)]
pub struct DataLineParser {
    buffer: String,
    read_offset: usize,
}

impl DataLineParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed decoded text, calling `on_payload` for each complete data line.
    pub fn feed<F>(&mut self, text: &str, mut on_payload: F)
    where
        F: FnMut(&str),
    {
        self.buffer.push_str(text);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        for rel_pos in memchr_iter(b'\n', &self.buffer.as_bytes()[scan_start..]) {
            let line_end = scan_start + rel_pos;
            if let Some(payload) = extract_data_payload(&self.buffer[processed_up_to..line_end]) {
                on_payload(payload);
            }
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2
                || self.read_offset >= COMPACT_THRESHOLD);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Treat whatever is left in the buffer as a final line.
    pub fn finish<F>(&mut self, mut on_payload: F)
    where
        F: FnMut(&str),
    {
        if let Some(payload) = extract_data_payload(&self.buffer[self.read_offset..]) {
            on_payload(payload);
        }
        self.buffer.clear();
        self.read_offset = 0;
    }

    /// Bytes of the incomplete trailing line currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() - self.read_offset
    }
}

/// Extract the trimmed payload of a `data: ` line.
///
/// Returns `None` for blank lines and lines without the prefix.
#[must_use]
pub fn extract_data_payload(line: &str) -> Option<&str> {
    if line.trim().is_empty() {
        return None;
    }
    line.strip_prefix(DATA_PREFIX).map(str::trim)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
