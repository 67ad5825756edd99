//! Scrollback buffer for session output

/// `ED 3`: erase saved lines. Shells emit it for `clear`.
pub const CLEAR_SCROLLBACK: &str = "\x1b[3J";

/// In-memory scrollback with a byte cap.
///
/// Holds decoded text. When the cap is exceeded the oldest text is dropped,
/// always at a character boundary.
#[derive(Debug)]
pub struct ScrollbackBuffer {
    buffer: String,
    capacity: usize,
}

impl ScrollbackBuffer {
    /// Create buffer with specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: String::new(),
            capacity,
        }
    }

    /// Create buffer pre-filled with recovered history
    pub fn with_contents(capacity: usize, contents: &str) -> Self {
        let mut buffer = Self::new(capacity);
        buffer.append(contents);
        buffer
    }

    /// Append text, dropping oldest text if over capacity
    pub fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
        if self.buffer.len() > self.capacity {
            let mut cut = self.buffer.len() - self.capacity;
            while !self.buffer.is_char_boundary(cut) {
                cut += 1;
            }
            self.buffer.drain(..cut);
        }
    }

    /// Get all buffered text for replay
    pub fn contents(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Current buffer size in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Result of scanning one output chunk for [`CLEAR_SCROLLBACK`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Scanned {
    /// A clear sequence was seen; everything kept so far must be discarded
    pub cleared: bool,
    /// Text to keep, with no clear-sequence bytes in it
    pub keep: String,
}

/// Finds clear-scrollback sequences in a stream of chunks.
///
/// Only text after the last sequence in a chunk is kept. A chunk ending in
/// a prefix of the sequence has that prefix held back until the next chunk
/// shows whether the sequence completes.
#[derive(Debug, Default)]
pub struct ClearScrollbackScanner {
    carry: String,
}

impl ClearScrollbackScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan(&mut self, chunk: &str) -> Scanned {
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(chunk);

        let cleared = match text.rfind(CLEAR_SCROLLBACK) {
            Some(pos) => {
                text.drain(..pos + CLEAR_SCROLLBACK.len());
                true
            }
            None => false,
        };

        let held = partial_sequence_len(&text);
        self.carry = text.split_off(text.len() - held);
        Scanned {
            cleared,
            keep: text,
        }
    }

    /// Release any held-back text once the stream has ended.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.carry)
    }
}

/// Length of the longest proper prefix of the sequence that `text` ends with
fn partial_sequence_len(text: &str) -> usize {
    (1..CLEAR_SCROLLBACK.len())
        .rev()
        .find(|&n| text.ends_with(&CLEAR_SCROLLBACK[..n]))
        .unwrap_or(0)
}
