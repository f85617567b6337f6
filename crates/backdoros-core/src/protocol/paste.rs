//! Paste capture: accumulate raw lines until the `EOF` sentinel.
//!
//! `WRITE - notes.txt` puts the session into paste mode.  Every following line
//! is appended (with its newline) to a buffer.  As soon as the buffer contains
//! the sentinel `EOF`, the first occurrence is removed and the rest becomes
//! the file content:
//!
//! ```text
//! hello          buffer: "hello\n"
//! EOF            buffer: "hello\nEOF\n" -> commit "hello\n"
//! ```
//!
//! When removing the sentinel leaves its line empty, that line's newline goes
//! too (`\r\n` for CRLF clients), so the line that carried `EOF` leaves no
//! trace.  Text sharing a line
//! with the sentinel is kept: `tailEOF` commits `tail\n`.

/// Token that ends a paste.
pub const PASTE_SENTINEL: &str = "EOF";

/// In-progress paste for one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteCapture {
    target: String,
    buffer: String,
}

impl PasteCapture {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            buffer: String::new(),
        }
    }

    /// Name of the file the paste will be stored under.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Text accumulated so far.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Appends one framed line.
    ///
    /// Returns the committed content once the sentinel has been seen, or
    /// `None` while more lines are expected.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        // Earlier lines held no sentinel and the buffer ends in '\n', so only
        // the newly appended line needs searching.
        let start = self.buffer.len();
        self.buffer.push_str(line);
        self.buffer.push('\n');

        let at = start + self.buffer[start..].find(PASTE_SENTINEL)?;
        let mut content = std::mem::take(&mut self.buffer);
        content.replace_range(at..at + PASTE_SENTINEL.len(), "");

        let line_start = at == 0 || content.as_bytes()[at - 1] == b'\n';
        if line_start {
            let rest = &content[at..];
            let ending = if rest.starts_with("\r\n") {
                2
            } else if rest.starts_with('\n') {
                1
            } else {
                0
            };
            content.replace_range(at..at + ending, "");
        }
        Some(content)
    }
}
