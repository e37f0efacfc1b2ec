//! Newline-delimited JSON progress-line decoding.
//!
//! Bytes are buffered across chunk boundaries so a line (or a multi-byte
//! UTF-8 sequence) split over network chunks is reassembled before parsing.
//! Each provider supplies its own line parser.

use futures_util::{Stream, StreamExt};

use formsmith_types::error::ProviderError;
use formsmith_types::llm::StreamEvent;

use crate::llm::provider::EventStream;

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed. Blank lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1])? {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// The final unterminated line, if any.
    pub fn finish(&mut self) -> Result<Option<String>, ProviderError> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<String>, ProviderError> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = std::str::from_utf8(raw)
        .map_err(|e| ProviderError::unknown(format!("invalid UTF-8 in progress line: {e}")))?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

/// Turn a byte stream of progress lines into provider events.
///
/// `parse_line` returns `Ok(None)` for lines that carry nothing (keep-alives).
/// The stream ends after the first `Done` event.
pub fn ndjson_events<S, B, F>(bytes: S, mut parse_line: F) -> EventStream
where
    S: Stream<Item = Result<B, ProviderError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    F: FnMut(&str) -> Result<Option<StreamEvent>, ProviderError> + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = LineDecoder::new();
        let mut finished = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for line in decoder.push(chunk.as_ref())? {
                if let Some(event) = parse_line(&line)? {
                    finished = matches!(event, StreamEvent::Done { .. });
                    yield event;
                    if finished {
                        break;
                    }
                }
            }
            if finished {
                break;
            }
        }

        if !finished {
            if let Some(line) = decoder.finish()? {
                if let Some(event) = parse_line(&line)? {
                    yield event;
                }
            }
        }
    })
}
