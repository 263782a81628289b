//! Fixed-window text chunking with overlap.

/// A window of text with its character offsets in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Character offset of the window start.
    pub start: usize,
    /// Character offset one past the window end.
    pub end: usize,
}

/// Splits text into fixed-size overlapping windows.
///
/// Windows are exact: each starts `window - overlap` characters after
/// the previous one, and the final window runs to the end of the text.
/// Offsets are character offsets, not byte offsets, so multi-byte text
/// never splits inside a code point.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    window: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(window: usize, overlap: usize) -> Self {
        Self { window, overlap }
    }

    fn step(&self) -> usize {
        self.window.saturating_sub(self.overlap).max(1)
    }

    /// Split text into overlapping windows. Text no longer than one
    /// window yields a single chunk; empty text yields none.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        if total == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let step = self.step();
        let mut start = 0;

        loop {
            let end = (start + self.window).min(total);
            chunks.push(Chunk {
                text: chars[start..end].iter().collect(),
                start,
                end,
            });

            if end == total {
                break;
            }
            start += step;
        }

        chunks
    }
}
