//! Generated questionnaire document types.
//!
//! A `GeneratedDocument` is an ordered list of sections, each an ordered list
//! of questions. The serialized form uses camelCase keys because that is the
//! shape the model is prompted to produce and the surrounding product stores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The validated output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDocument {
    pub sections: Vec<Section>,
}

impl GeneratedDocument {
    /// Total number of questions across all sections.
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// Look up a question by id anywhere in the document.
    pub fn find_question(&self, id: &str) -> Option<&Question> {
        self.sections
            .iter()
            .flat_map(|s| s.questions.iter())
            .find(|q| q.id == id)
    }
}

/// An ordered group of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<Question>,
}

/// A single question with its type-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
}

/// A selectable option for choice-style questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    pub value: String,
}

impl QuestionOption {
    /// An option whose value is derived from its label.
    pub fn from_label(label: impl Into<String>) -> Self {
        let label = label.into();
        let value = label
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        Self { label, value }
    }
}

/// Free-text validation rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Question type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Textarea,
    Number,
    Email,
    Date,
    Select,
    MultiSelect,
    Radio,
    Checkbox,
    Boolean,
    Scale,
}

impl QuestionType {
    /// Whether the type needs a non-empty `options` list to be answerable.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionType::Select
                | QuestionType::MultiSelect
                | QuestionType::Radio
                | QuestionType::Checkbox
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::Text => "text",
            QuestionType::Textarea => "textarea",
            QuestionType::Number => "number",
            QuestionType::Email => "email",
            QuestionType::Date => "date",
            QuestionType::Select => "select",
            QuestionType::MultiSelect => "multi_select",
            QuestionType::Radio => "radio",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Boolean => "boolean",
            QuestionType::Scale => "scale",
        };
        write!(f, "{s}")
    }
}

impl FromStr for QuestionType {
    type Err = String;

    /// Parses canonical names plus the aliases models tend to produce.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "text" | "short_text" | "string" => Ok(QuestionType::Text),
            "textarea" | "long_text" | "paragraph" => Ok(QuestionType::Textarea),
            "number" | "numeric" | "integer" => Ok(QuestionType::Number),
            "email" => Ok(QuestionType::Email),
            "date" => Ok(QuestionType::Date),
            "select" | "dropdown" => Ok(QuestionType::Select),
            "multi_select" | "multiselect" => Ok(QuestionType::MultiSelect),
            "radio" | "single_choice" | "multiple_choice" => Ok(QuestionType::Radio),
            "checkbox" | "checkboxes" => Ok(QuestionType::Checkbox),
            "boolean" | "yes_no" | "yesno" => Ok(QuestionType::Boolean),
            "scale" | "rating" | "likert" => Ok(QuestionType::Scale),
            other => Err(format!("unknown question type: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_aliases() {
        assert_eq!("dropdown".parse::<QuestionType>().unwrap(), QuestionType::Select);
        assert_eq!("Long Text".parse::<QuestionType>().unwrap(), QuestionType::Textarea);
        assert_eq!("yes-no".parse::<QuestionType>().unwrap(), QuestionType::Boolean);
        assert_eq!("rating".parse::<QuestionType>().unwrap(), QuestionType::Scale);
        assert!("hologram".parse::<QuestionType>().is_err());
    }

    #[test]
    fn test_question_type_display_matches_serde() {
        for qt in [QuestionType::MultiSelect, QuestionType::Textarea, QuestionType::Scale] {
            let json = serde_json::to_string(&qt).unwrap();
            assert_eq!(json, format!("\"{qt}\""));
        }
    }

    #[test]
    fn test_question_serializes_camel_case() {
        let question = Question {
            id: "q1".into(),
            label: "Name".into(),
            question_type: QuestionType::Text,
            required: true,
            description: None,
            help_text: Some("Your full name".into()),
            placeholder: None,
            options: vec![],
            min: None,
            max: None,
            step: None,
            validation: Some(ValidationRules {
                max_length: Some(80),
                ..Default::default()
            }),
        };
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["helpText"], "Your full name");
        assert_eq!(json["validation"]["maxLength"], 80);
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_option_from_label() {
        let opt = QuestionOption::from_label("Very Satisfied");
        assert_eq!(opt.value, "very_satisfied");
        assert_eq!(opt.label, "Very Satisfied");
    }
}
