//! Per-attempt accumulator for streamed text.

/// Accumulates text chunks for one attempt. Owned by the aggregator and
/// dropped when the attempt concludes.
#[derive(Debug, Default)]
pub struct RawResponseBuffer {
    text: String,
    chunks: usize,
}

impl RawResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.chunks += 1;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Characters received so far.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
