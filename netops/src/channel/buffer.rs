//! Accumulates device output and looks for prompts near its end.
//!
//! A prompt can only appear at the end of what the device has sent, so only
//! a fixed-size window at the tail is searched. A long `show running-config`
//! costs the same to check as a one-line reply.

use std::fmt;

use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Buffer for accumulating device output and searching it for patterns.
///
/// Escape sequences are stripped on the way in, so patterns are always
/// matched against the visible text. The stripping state survives across
/// calls to [`extend`](Self::extend), so an escape sequence split over two
/// reads is still removed.
pub struct PatternBuffer {
    /// Visible output accumulated so far.
    text: VisibleText,

    parser: Parser,

    /// Bytes from the end that pattern searches look at.
    search_depth: usize,
}

/// `vte` performer that keeps printable characters and line control only.
#[derive(Default)]
struct VisibleText {
    bytes: Vec<u8>,
}

impl Perform for VisibleText {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.bytes
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\r' | b'\t' => self.bytes.push(byte),
            // backspace erases, as pagers use it to wipe "--More--"
            0x08 => {
                self.bytes.pop();
            }
            _ => {}
        }
    }
}

impl PatternBuffer {
    /// Create an empty buffer whose pattern searches look at most
    /// `search_depth` bytes back from the end.
    pub fn new(search_depth: usize) -> Self {
        Self {
            text: VisibleText {
                bytes: Vec::with_capacity(4096),
            },
            parser: Parser::new(),
            search_depth,
        }
    }

    /// Feed raw device bytes through the escape parser.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.text, data);
    }

    /// The searchable window at the end of the visible text.
    fn tail(&self) -> &[u8] {
        let bytes = &self.text.bytes;
        &bytes[bytes.len().saturating_sub(self.search_depth)..]
    }

    /// First match of `pattern` inside the tail window. Offsets are relative
    /// to the window, not to the whole buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        pattern.find(self.tail())
    }

    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        pattern.is_match(self.tail())
    }

    /// Hand the accumulated text to the caller, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.text.bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.text.bytes
    }

    /// Visible text so far, for timeout diagnostics.
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.text.bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.text.bytes.is_empty()
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.text.bytes.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}
