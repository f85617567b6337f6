//! Incremental line framer for the session byte stream.
//!
//! TCP is a *stream* protocol: a single `read()` may return half a command, or
//! three commands at once.  [`LineFramer`] accumulates bytes across reads and
//! hands out complete lines one at a time, so the session can change mode
//! between two lines that arrived in the same chunk.
//!
//! ```text
//! chunk 1: "DI"          -> buffer "DI"            -> no line yet
//! chunk 2: "R\nREAD f\n" -> lines "DIR", "READ f"  -> buffer ""
//! ```

use thiserror::Error;

/// Newline byte that terminates every line.
pub const LINE_DELIMITER: u8 = b'\n';

/// Default upper bound on a single buffered line (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Errors reported for an individual line.  None of them poison the framer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The line is not valid UTF-8.
    #[error("Unable to decode input as UTF-8 (invalid byte at offset {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    /// A line grew past the configured limit and was discarded.
    #[error("Line too long: exceeded {limit} bytes and was discarded")]
    LineTooLong { limit: usize },
}

/// Splits an inbound byte stream into `\n`-terminated lines.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_bytes: usize,
    /// Set once an overlong partial line was dropped; the rest of that line
    /// (up to its delimiter) is skipped rather than framed as a new line.
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineFramer {
    /// Creates a framer that refuses lines longer than `max_line_bytes`.
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(256),
            max_line_bytes: max_line_bytes.max(1),
            discarding: false,
        }
    }

    /// Appends a chunk received from the transport.
    ///
    /// Returns [`FrameError::LineTooLong`] when the pending partial line now
    /// exceeds the limit.  The oversized data is dropped and the framer keeps
    /// working: the tail of that line is skipped up to its delimiter.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<(), FrameError> {
        let mut chunk = chunk;

        if self.discarding {
            match chunk.iter().position(|&b| b == LINE_DELIMITER) {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return Ok(()),
            }
        }

        self.buffer.extend_from_slice(chunk);

        // Only the bytes after the last delimiter form the pending partial line.
        let partial_len = match self.buffer.iter().rposition(|&b| b == LINE_DELIMITER) {
            Some(pos) => self.buffer.len() - pos - 1,
            None => self.buffer.len(),
        };

        if partial_len > self.max_line_bytes {
            let keep = self.buffer.len() - partial_len;
            self.buffer.truncate(keep);
            self.discarding = true;
            return Err(FrameError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }

        Ok(())
    }

    /// Removes and returns the next complete line, without its delimiter.
    ///
    /// A complete line longer than the limit (possible when it arrived inside
    /// a single chunk) is dropped and reported as
    /// [`FrameError::LineTooLong`]; the following lines are unaffected.
    pub fn next_line(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        let pos = self.buffer.iter().position(|&b| b == LINE_DELIMITER)?;
        if pos > self.max_line_bytes {
            self.buffer.drain(..=pos);
            return Some(Err(FrameError::LineTooLong {
                limit: self.max_line_bytes,
            }));
        }
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(Ok(line))
    }

    /// Bytes received but not yet resolved into a complete line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

/// Decodes a framed line as UTF-8.
///
/// # Errors
///
/// Returns [`FrameError::InvalidUtf8`] for malformed input.  The caller
/// reports it and moves on to the next line.
pub fn decode_line(line: Vec<u8>) -> Result<String, FrameError> {
    String::from_utf8(line).map_err(|e| FrameError::InvalidUtf8 {
        valid_up_to: e.utf8_error().valid_up_to(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(framer: &mut LineFramer) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| framer.next_line())
            .map(|line| line.unwrap())
            .collect()
    }

    #[test]
    fn test_single_complete_line() {
        let mut framer = LineFramer::default();
        framer.extend(b"DIR\n").unwrap();
        assert_eq!(drain(&mut framer), vec![b"DIR".to_vec()]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_line_split_across_two_chunks_is_one_line() {
        // Arrange
        let mut framer = LineFramer::default();

        // Act: "DIR" then "\n" delivered separately
        framer.extend(b"DIR").unwrap();
        let first = drain(&mut framer);
        framer.extend(b"\n").unwrap();
        let second = drain(&mut framer);

        // Assert
        assert!(first.is_empty(), "no line before the delimiter arrives");
        assert_eq!(second, vec![b"DIR".to_vec()]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk_keep_order() {
        let mut framer = LineFramer::default();
        framer.extend(b"WRITE - f\nhello\nEOF\nREA").unwrap();

        assert_eq!(
            drain(&mut framer),
            vec![b"WRITE - f".to_vec(), b"hello".to_vec(), b"EOF".to_vec()]
        );
        assert_eq!(framer.pending(), b"REA");
    }

    #[test]
    fn test_empty_line_is_emitted() {
        let mut framer = LineFramer::default();
        framer.extend(b"\n").unwrap();
        assert_eq!(drain(&mut framer), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_carriage_return_is_preserved() {
        let mut framer = LineFramer::default();
        framer.extend(b"DIR\r\n").unwrap();
        assert_eq!(framer.next_line(), Some(Ok(b"DIR\r".to_vec())));
    }

    #[test]
    fn test_overlong_partial_line_is_discarded_until_delimiter() {
        // Arrange
        let mut framer = LineFramer::new(4);
        framer.extend(b"ok\n").unwrap();

        // Act: "toolong" overflows; the tail "xx" belongs to the same line
        let err = framer.extend(b"toolong").unwrap_err();
        framer.extend(b"xx\nDIR\n").unwrap();

        // Assert: the good lines before and after survive
        assert_eq!(err, FrameError::LineTooLong { limit: 4 });
        assert_eq!(drain(&mut framer), vec![b"ok".to_vec(), b"DIR".to_vec()]);
    }

    #[test]
    fn test_overlong_complete_line_in_one_chunk_is_rejected() {
        // Arrange
        let mut framer = LineFramer::new(8);

        // Act: the whole line and the next one arrive together
        framer.extend(b"0123456789\nDIR\n").unwrap();
        let first = framer.next_line();
        let second = framer.next_line();

        // Assert
        assert_eq!(first, Some(Err(FrameError::LineTooLong { limit: 8 })));
        assert_eq!(second, Some(Ok(b"DIR".to_vec())));
        assert_eq!(framer.next_line(), None);
    }

    #[test]
    fn test_line_exactly_at_limit_is_accepted() {
        let mut framer = LineFramer::new(3);
        framer.extend(b"DIR\n").unwrap();
        assert_eq!(drain(&mut framer), vec![b"DIR".to_vec()]);
    }

    #[test]
    fn test_decode_line_accepts_utf8() {
        assert_eq!(decode_line("héllo".as_bytes().to_vec()).unwrap(), "héllo");
    }

    #[test]
    fn test_decode_line_reports_invalid_utf8() {
        let err = decode_line(vec![b'a', 0xFF, b'b']).unwrap_err();
        assert_eq!(err, FrameError::InvalidUtf8 { valid_up_to: 1 });
    }
}
