//! JSON extraction from raw model output.
//!
//! Models wrap the payload in prose or markdown fences. The candidate is the
//! span from the first `{` to the last `}`. When the object opened by the
//! first `{` never closes, the candidate runs to the end of the text so the
//! truncation pass can see the partial tail.

use formsmith_types::error::GenerationError;

use super::scan::{Scanner, Step};

/// Candidate JSON text. No validity guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedJson {
    text: String,
    open_ended: bool,
}

impl ExtractedJson {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            open_ended: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// The outermost object never closed in the raw text.
    pub fn is_open_ended(&self) -> bool {
        self.open_ended
    }
}

/// Isolate the candidate JSON object in `raw`.
pub fn extract_json(raw: &str) -> Result<ExtractedJson, GenerationError> {
    let start = raw.find('{').ok_or(GenerationError::NoJsonFound)?;
    let tail = &raw[start..];

    if closes(tail) {
        // `closes` saw a `}` after `start`, so `rfind` lands at or after it.
        let end = raw.rfind('}').ok_or(GenerationError::NoJsonFound)?;
        return Ok(ExtractedJson::new(&raw[start..=end]));
    }

    let text = strip_trailing_fence(tail);
    tracing::debug!(
        candidate_len = text.len(),
        "outermost object never closes, keeping partial tail"
    );
    Ok(ExtractedJson {
        text: text.to_string(),
        open_ended: true,
    })
}

/// Whether a string-aware depth walk from the opening `{` returns to zero.
fn closes(tail: &str) -> bool {
    let mut scanner = Scanner::new();
    let mut depth: usize = 0;
    for ch in tail.chars() {
        if let Step::Structural(c) = scanner.feed(ch) {
            match c {
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
    }
    false
}

fn strip_trailing_fence(text: &str) -> &str {
    let trimmed = text.trim_end();
    match trimmed.strip_suffix("```") {
        Some(rest) => rest.trim_end(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_code_fence() {
        let raw = "Here you go:\n```json\n{\"sections\":[]}\n```\nEnjoy!";
        let extracted = extract_json(raw).unwrap();
        assert_eq!(extracted.as_str(), "{\"sections\":[]}");
        assert!(!extracted.is_open_ended());
    }

    #[test]
    fn test_first_open_to_last_close() {
        let raw = "prefix {\"a\":{\"b\":1}} middle } suffix";
        let extracted = extract_json(raw).unwrap();
        assert_eq!(extracted.as_str(), "{\"a\":{\"b\":1}} middle }");
    }

    #[test]
    fn test_no_brace_is_no_json() {
        assert_eq!(
            extract_json("I cannot help with that."),
            Err(GenerationError::NoJsonFound)
        );
        assert_eq!(extract_json(""), Err(GenerationError::NoJsonFound));
    }

    #[test]
    fn test_truncated_object_keeps_tail() {
        let raw = "```json\n{\"sections\":[{\"id\":\"s1\",\"title\":\"T\"";
        let extracted = extract_json(raw).unwrap();
        assert!(extracted.is_open_ended());
        assert_eq!(extracted.as_str(), "{\"sections\":[{\"id\":\"s1\",\"title\":\"T\"");
    }

    #[test]
    fn test_truncated_object_drops_trailing_fence() {
        let raw = "{\"sections\":[{\"id\":\"s1\"\n```\n";
        let extracted = extract_json(raw).unwrap();
        assert_eq!(extracted.as_str(), "{\"sections\":[{\"id\":\"s1\"");
    }

    #[test]
    fn test_brace_inside_string_does_not_close() {
        let raw = "{\"label\":\"use } carefully\"";
        let extracted = extract_json(raw).unwrap();
        assert!(extracted.is_open_ended());
    }
}
