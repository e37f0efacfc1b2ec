//! Pre-baked fallback document returned with every `Failure`.

use formsmith_types::document::{
    GeneratedDocument, Question, QuestionOption, QuestionType, Section, ValidationRules,
};
use formsmith_types::error::ConfigError;
use formsmith_types::generation::DocumentBounds;

use crate::pipeline::validator::validate_document;

fn question(id: &str, label: &str, question_type: QuestionType, required: bool) -> Question {
    Question {
        id: id.to_string(),
        label: label.to_string(),
        question_type,
        required,
        description: None,
        help_text: None,
        placeholder: None,
        options: Vec::new(),
        min: None,
        max: None,
        step: None,
        validation: None,
    }
}

/// The built-in three-section questionnaire.
pub fn builtin_fallback_document() -> GeneratedDocument {
    let mut email = question("contact_email", "Email address", QuestionType::Email, true);
    email.placeholder = Some("name@example.com".to_string());

    let mut role = question("role", "What best describes your role?", QuestionType::Select, false);
    role.options = ["Individual", "Team lead", "Manager", "Other"]
        .into_iter()
        .map(QuestionOption::from_label)
        .collect();

    let mut goals = question("goals", "What would you like to achieve?", QuestionType::Textarea, true);
    goals.help_text = Some("A few sentences is plenty.".to_string());
    goals.validation = Some(ValidationRules {
        max_length: Some(2_000),
        ..Default::default()
    });

    let mut satisfaction = question(
        "satisfaction",
        "How satisfied are you with your current process?",
        QuestionType::Scale,
        false,
    );
    satisfaction.min = Some(1.0);
    satisfaction.max = Some(5.0);
    satisfaction.step = Some(1.0);

    GeneratedDocument {
        sections: vec![
            Section {
                id: "about_you".to_string(),
                title: "About you".to_string(),
                description: Some("A little context helps us tailor what comes next.".to_string()),
                questions: vec![
                    question("full_name", "Full name", QuestionType::Text, true),
                    email,
                    role,
                ],
            },
            Section {
                id: "goals".to_string(),
                title: "Your goals".to_string(),
                description: None,
                questions: vec![
                    goals,
                    question("timeline", "When do you need this by?", QuestionType::Date, false),
                ],
            },
            Section {
                id: "feedback".to_string(),
                title: "Feedback".to_string(),
                description: None,
                questions: vec![
                    satisfaction,
                    question("anything_else", "Anything else we should know?", QuestionType::Textarea, false),
                ],
            },
        ],
    }
}

/// Parse and validate a fallback document override.
pub fn parse_fallback_document(json: &str) -> Result<GeneratedDocument, ConfigError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidFallback(e.to_string()))?;
    let validated = validate_document(&value, &DocumentBounds::default())
        .map_err(|e| ConfigError::InvalidFallback(e.to_string()))?;
    for warning in &validated.warnings {
        tracing::warn!(warning = %warning, "fallback document normalized");
    }
    Ok(validated.document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_fallback_is_valid() {
        let doc = builtin_fallback_document();
        assert_eq!(doc.sections.len(), 3);
        let value = serde_json::to_value(&doc).unwrap();
        let validated = validate_document(&value, &DocumentBounds::default()).unwrap();
        assert!(validated.warnings.is_empty(), "{:?}", validated.warnings);
        assert_eq!(validated.document, doc);
    }

    #[test]
    fn test_parse_fallback_override() {
        let json = r#"{"sections":[{"id":"s","title":"Only","questions":[{"id":"q","label":"Why?","type":"paragraph"}]}]}"#;
        let doc = parse_fallback_document(json).unwrap();
        assert_eq!(doc.sections[0].questions[0].question_type, QuestionType::Textarea);
    }

    #[test]
    fn test_parse_fallback_rejects_invalid() {
        assert!(matches!(
            parse_fallback_document("{\"sections\":[]}"),
            Err(ConfigError::InvalidFallback(_))
        ));
        assert!(matches!(
            parse_fallback_document("not json"),
            Err(ConfigError::InvalidFallback(_))
        ));
    }
}
