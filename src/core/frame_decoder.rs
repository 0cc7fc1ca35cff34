//! Incremental decoder for blank-line delimited `data:` event streams.
//!
//! The backend sends records separated by an empty line (`\n\n` or
//! `\r\n\r\n`). A record may carry a `data:` field prefix or be a bare
//! payload. The literal `[DONE]` marks the logical end of the stream even if
//! the connection stays open.
//!
//! Chunk boundaries from the transport are arbitrary, so the decoder keeps the
//! raw bytes after the last complete separator and only decodes UTF-8 once a
//! whole frame is available. A multi-byte character split across two chunks is
//! therefore never decoded half-way.

use memchr::memchr;
use std::error::Error as StdError;
use std::fmt;
use tracing::debug;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// A frame that could not be turned into a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame bytes are not valid UTF-8.
    InvalidUtf8 {
        /// Number of leading bytes that did decode.
        valid_up_to: usize,
        /// Total length of the frame in bytes.
        frame_len: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidUtf8 {
                valid_up_to,
                frame_len,
            } => write!(
                f,
                "Invalid UTF-8 in stream frame ({frame_len} bytes, valid up to byte {valid_up_to})"
            ),
        }
    }
}

impl StdError for FrameError {}

/// One decoded frame: a data payload, or a frame-local failure.
pub type FrameResult = Result<String, FrameError>;

enum Boundary {
    /// A blank line ends here; the next frame starts at the contained index.
    Separator(usize),
    NotSeparator,
    /// Not enough lookahead yet to decide.
    Pending,
}

enum FrameOutcome {
    Skip,
    Data(String),
    Done,
    Invalid(FrameError),
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
    // Bytes of `carry` before this offset cannot start a separator.
    search_from: usize,
    terminated: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Bytes retained from previous chunks that do not yet form a frame.
    pub fn carry(&self) -> &[u8] {
        &self.carry
    }

    /// Appends `chunk` and returns every frame it completed, in stream order.
    ///
    /// Returns nothing once the sentinel has been seen.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameResult> {
        let mut decoded = Vec::new();
        if self.terminated {
            return decoded;
        }

        self.carry.extend_from_slice(chunk);

        let mut frame_start = 0;
        let mut search = self.search_from;

        while let Some(offset) = memchr(b'\n', &self.carry[search..]) {
            let newline = search + offset;
            match boundary_after(&self.carry, newline) {
                Boundary::Separator(next_start) => {
                    let frame_end =
                        if newline > frame_start && self.carry[newline - 1] == b'\r' {
                            newline - 1
                        } else {
                            newline
                        };

                    match interpret_frame(&self.carry[frame_start..frame_end]) {
                        FrameOutcome::Skip => {}
                        FrameOutcome::Data(payload) => decoded.push(Ok(payload)),
                        FrameOutcome::Invalid(err) => decoded.push(Err(err)),
                        FrameOutcome::Done => {
                            debug!(frames = decoded.len(), "Stream sentinel received");
                            self.terminate();
                            return decoded;
                        }
                    }

                    frame_start = next_start;
                    search = next_start;
                }
                Boundary::NotSeparator => search = newline + 1,
                Boundary::Pending => break,
            }
        }

        if memchr(b'\n', &self.carry[search..]).is_none() {
            search = self.carry.len();
        }

        self.carry.drain(..frame_start);
        self.search_from = search - frame_start;
        decoded
    }

    /// Flushes whatever is left in the carry as a final frame and terminates.
    ///
    /// Called when the transport reports end of stream. Servers that omit the
    /// trailing blank line still get their last record delivered.
    pub fn finalize(&mut self) -> Vec<FrameResult> {
        if self.terminated {
            return Vec::new();
        }

        let mut end = self.carry.len();
        while end > 0 && matches!(self.carry[end - 1], b'\n' | b'\r') {
            end -= 1;
        }

        let outcome = interpret_frame(&self.carry[..end]);
        self.terminate();

        match outcome {
            FrameOutcome::Data(payload) => vec![Ok(payload)],
            FrameOutcome::Invalid(err) => vec![Err(err)],
            FrameOutcome::Skip | FrameOutcome::Done => Vec::new(),
        }
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.carry = Vec::new();
        self.search_from = 0;
    }
}

fn boundary_after(buffer: &[u8], newline: usize) -> Boundary {
    match buffer.get(newline + 1) {
        None => Boundary::Pending,
        Some(b'\n') => Boundary::Separator(newline + 2),
        Some(b'\r') => match buffer.get(newline + 2) {
            None => Boundary::Pending,
            Some(b'\n') => Boundary::Separator(newline + 3),
            Some(_) => Boundary::NotSeparator,
        },
        Some(_) => Boundary::NotSeparator,
    }
}

fn interpret_frame(raw: &[u8]) -> FrameOutcome {
    let start = raw
        .iter()
        .position(|byte| !matches!(byte, b'\n' | b'\r'))
        .unwrap_or(raw.len());
    let raw = &raw[start..];

    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(err) => {
            return FrameOutcome::Invalid(FrameError::InvalidUtf8 {
                valid_up_to: err.valid_up_to(),
                frame_len: raw.len(),
            })
        }
    };

    if text.trim().is_empty() {
        return FrameOutcome::Skip;
    }

    let payload = strip_data_prefix(text);
    if payload == DONE_SENTINEL {
        FrameOutcome::Done
    } else if payload.is_empty() {
        FrameOutcome::Skip
    } else {
        FrameOutcome::Data(payload.to_string())
    }
}

/// Removes a leading `data:` marker and at most one space after it.
///
/// Only the start of the frame is considered; `data:` appearing later in the
/// payload is left alone.
pub fn strip_data_prefix(frame: &str) -> &str {
    match frame.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => frame,
    }
}
