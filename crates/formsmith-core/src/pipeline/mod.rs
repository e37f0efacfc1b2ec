//! The structured-output pipeline.
//!
//! Orchestrator -> (per provider) -> Aggregator -> Extractor -> Repair Engine
//! -> Validator. The first attempt whose output survives all stages wins.

pub mod aggregator;
pub mod backoff;
pub mod buffer;
pub mod cascade;
pub mod extractor;
pub mod lines;
pub mod repair;
pub mod scan;
pub mod validator;

use formsmith_types::document::GeneratedDocument;
use formsmith_types::error::GenerationError;
use formsmith_types::generation::DocumentBounds;

use self::extractor::extract_json;
use self::repair::{repair_json, RepairKind};
use self::validator::validate_document;

/// A raw response turned into a validated document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub document: GeneratedDocument,
    pub repairs: Vec<RepairKind>,
    pub warnings: Vec<String>,
}

/// Run extraction, repair, and validation on one raw response.
pub fn process_response(
    raw: &str,
    bounds: &DocumentBounds,
) -> Result<ProcessedDocument, GenerationError> {
    let extracted = extract_json(raw)?;
    let repaired = repair_json(&extracted)?;
    let repairs = repaired.repairs().to_vec();
    let validated = validate_document(repaired.value(), bounds)?;

    let mut warnings = Vec::with_capacity(validated.warnings.len() + 1);
    if !repairs.is_empty() {
        let applied: Vec<String> = repairs.iter().map(ToString::to_string).collect();
        warnings.push(format!("response repaired: {}", applied.join(", ")));
    }
    warnings.extend(validated.warnings);

    Ok(ProcessedDocument {
        document: validated.document,
        repairs,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_fenced_response() {
        let raw = "Sure!\n```json\n{\"sections\":[{\"id\":\"s1\",\"title\":\"Intro\",\"questions\":[{\"id\":\"q1\",\"label\":\"Name\",\"type\":\"text\"}]}]}\n```";
        let processed = process_response(raw, &DocumentBounds::default()).unwrap();
        assert_eq!(processed.document.question_count(), 1);
        assert!(processed.repairs.is_empty());
        assert!(processed.warnings.is_empty());
    }

    #[test]
    fn test_process_truncated_response_warns() {
        let raw = r#"{"sections":[{"id":"s1","title":"T","questions":[{"id":"q1","label":"L","type"#;
        let processed = process_response(raw, &DocumentBounds::default()).unwrap();
        assert_eq!(processed.repairs, vec![RepairKind::Truncation]);
        assert_eq!(processed.warnings[0], "response repaired: truncation");
        assert_eq!(processed.document.sections[0].questions.len(), 0);
    }

    #[test]
    fn test_process_prose_only_fails() {
        let err = process_response("As an assistant I cannot", &DocumentBounds::default())
            .unwrap_err();
        assert_eq!(err, GenerationError::NoJsonFound);
    }
}
