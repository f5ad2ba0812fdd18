//! Re-segmentation of raw process output into complete lines
//!
//! Pipes hand us arbitrary chunks: a chunk may end in the middle of a line,
//! in the middle of a multi-byte line break, or in the middle of a UTF-8
//! character. [`LineBuffer`] accumulates bytes and only releases complete
//! lines, holding the trailing fragment back until the rest of it arrives.
//!
//! Segmentation runs on bytes. A line is decoded only once it is complete,
//! so a character split across two chunks is reassembled before decoding.

/// Default line break sequence used to split packager output
pub const DEFAULT_LINE_BREAK: &str = "\n";

/// Accumulating buffer for a single output channel (stdout or stderr)
///
/// After every [`push`](Self::push) the buffer holds exactly the trailing
/// partial line (possibly empty). Everything before it has been returned
/// as complete lines exactly once, in order.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    /// Bytes received but not yet resolved into a complete line
    pending: Vec<u8>,
    /// Line break sequence (never empty)
    delimiter: Vec<u8>,
    /// Offset in `pending` before which no delimiter can start
    scan_from: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create a buffer splitting on [`DEFAULT_LINE_BREAK`]
    pub fn new() -> Self {
        Self::with_delimiter(DEFAULT_LINE_BREAK)
    }

    /// Create a buffer splitting on a custom line break sequence.
    ///
    /// An empty delimiter falls back to [`DEFAULT_LINE_BREAK`].
    pub fn with_delimiter(delimiter: impl AsRef<[u8]>) -> Self {
        let delimiter = delimiter.as_ref();
        let delimiter = if delimiter.is_empty() {
            DEFAULT_LINE_BREAK.as_bytes().to_vec()
        } else {
            delimiter.to_vec()
        };
        Self {
            pending: Vec::new(),
            delimiter,
            scan_from: 0,
        }
    }

    /// Append a chunk and return every line it completed.
    ///
    /// Returned lines do not include the line break. When the chunk ends
    /// exactly on a line break the fragment is reset to empty.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut cursor = self.scan_from;

        while let Some(offset) = find(&self.pending[cursor..], &self.delimiter) {
            let line_end = cursor + offset;
            lines.push(decode(&self.pending[line_start..line_end]));
            line_start = line_end + self.delimiter.len();
            cursor = line_start;
        }

        if line_start > 0 {
            self.pending.drain(..line_start);
        }

        // A partial delimiter may sit at the tail; rescan from where it could start
        self.scan_from = self
            .pending
            .len()
            .saturating_sub(self.delimiter.len() - 1);

        lines
    }

    /// Convenience wrapper around [`push`](Self::push) for text chunks
    pub fn push_str(&mut self, chunk: &str) -> Vec<String> {
        self.push(chunk.as_bytes())
    }

    /// Flush the trailing fragment as a final line.
    ///
    /// Returns `None` when no partial line is pending. Used when the stream
    /// ends without a final line break.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode(&self.pending);
        self.clear();
        Some(line)
    }

    /// The bytes of the current incomplete fragment
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// True if no partial line is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard any buffered fragment
    pub fn clear(&mut self) {
        self.pending.clear();
        self.scan_from = 0;
    }

    /// The line break sequence this buffer splits on
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
