//! Schema validation and sanitization of repaired JSON.
//!
//! Hard requirements fail with `InvalidStructure` naming the offending path.
//! Count bounds and normalizations produce warnings only: the document is
//! still usable, so the caller gets it along with the list of what was fixed.

use std::collections::HashSet;

use serde_json::{Map, Value};

use formsmith_types::document::{
    GeneratedDocument, Question, QuestionOption, QuestionType, Section, ValidationRules,
};
use formsmith_types::error::GenerationError;
use formsmith_types::generation::DocumentBounds;

/// A schema-conformant document plus the soft warnings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument {
    pub document: GeneratedDocument,
    pub warnings: Vec<String>,
}

/// Validate and sanitize a parsed candidate into a `GeneratedDocument`.
pub fn validate_document(
    value: &Value,
    bounds: &DocumentBounds,
) -> Result<ValidatedDocument, GenerationError> {
    let mut ctx = Validation::default();

    let root = value
        .as_object()
        .ok_or_else(|| GenerationError::invalid("$", "expected a JSON object"))?;
    let raw_sections = match root.get("sections") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) => return Err(GenerationError::invalid("sections", "empty")),
        Some(_) => return Err(GenerationError::invalid("sections", "expected an array")),
        None => return Err(GenerationError::invalid("sections", "missing")),
    };

    let mut sections = Vec::with_capacity(raw_sections.len());
    for (si, raw) in raw_sections.iter().enumerate() {
        sections.push(ctx.section(raw, &format!("sections[{si}]"))?);
    }

    if sections.len() < bounds.min_sections || sections.len() > bounds.max_sections {
        ctx.warn(format!(
            "document has {} sections, expected {}..={}",
            sections.len(),
            bounds.min_sections,
            bounds.max_sections
        ));
    }
    for section in &sections {
        let count = section.questions.len();
        if count < bounds.min_questions_per_section || count > bounds.max_questions_per_section {
            ctx.warn(format!(
                "section '{}' has {count} questions, expected {}..={}",
                section.id, bounds.min_questions_per_section, bounds.max_questions_per_section
            ));
        }
    }

    Ok(ValidatedDocument {
        document: GeneratedDocument { sections },
        warnings: ctx.warnings,
    })
}

/// Trim and drop control characters. Line breaks and tabs become spaces.
pub fn sanitize_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    cleaned.trim().to_string()
}

#[derive(Default)]
struct Validation {
    section_ids: HashSet<String>,
    question_ids: HashSet<String>,
    warnings: Vec<String>,
}

impl Validation {
    fn warn(&mut self, message: String) {
        tracing::warn!(warning = %message, "document normalized");
        self.warnings.push(message);
    }

    fn section(&mut self, raw: &Value, path: &str) -> Result<Section, GenerationError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| GenerationError::invalid(path, "expected an object"))?;

        let id = required_text(obj, "id", path)?;
        let title = required_text(obj, "title", path)?;
        let description = self.free_text(obj, "description", path);

        let raw_questions = match obj.get("questions") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(GenerationError::invalid(
                    format!("{path}.questions"),
                    "expected an array",
                ));
            }
            None => return Err(GenerationError::invalid(format!("{path}.questions"), "missing")),
        };

        let id = unique_id(&mut self.section_ids, id, path, &mut self.warnings);

        let mut questions = Vec::with_capacity(raw_questions.len());
        for (qi, raw_q) in raw_questions.iter().enumerate() {
            questions.push(self.question(raw_q, &format!("{path}.questions[{qi}]"))?);
        }

        Ok(Section {
            id,
            title,
            description,
            questions,
        })
    }

    fn question(&mut self, raw: &Value, path: &str) -> Result<Question, GenerationError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| GenerationError::invalid(path, "expected an object"))?;

        let id = required_text(obj, "id", path)?;
        let label = required_text(obj, "label", path)?;
        let raw_type = match obj.get("type") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) => {
                return Err(GenerationError::invalid(format!("{path}.type"), "empty"));
            }
            Some(_) => {
                return Err(GenerationError::invalid(
                    format!("{path}.type"),
                    "expected a string",
                ));
            }
            None => return Err(GenerationError::invalid(format!("{path}.type"), "missing")),
        };

        let question_type = match raw_type.parse::<QuestionType>() {
            Ok(qt) => qt,
            Err(_) => {
                self.warn(format!("{path}.type '{raw_type}' is unknown, using text"));
                QuestionType::Text
            }
        };

        let id = unique_id(&mut self.question_ids, id, path, &mut self.warnings);
        let required = self.flag(obj, "required", path);
        let description = self.free_text(obj, "description", path);
        let help_text = self.free_text(obj, "helpText", path);
        let placeholder = self.free_text(obj, "placeholder", path);
        let options = self.options(obj, path);
        let min = self.number(obj, "min", path);
        let max = self.number(obj, "max", path);
        let step = self.number(obj, "step", path);
        let validation = self.validation(obj, path);

        if question_type.is_choice() && options.is_empty() {
            self.warn(format!("{path} is a {question_type} question with no options"));
        }

        Ok(Question {
            id,
            label,
            question_type,
            required,
            description,
            help_text,
            placeholder,
            options,
            min,
            max,
            step,
            validation,
        })
    }

    /// Optional free text. Non-string scalars are coerced to their string form.
    fn free_text(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        let text = match obj.get(key)? {
            Value::Null => return None,
            Value::String(s) => sanitize_text(s),
            other => {
                self.warn(format!("{path}.{key} was not a string, coerced"));
                match other {
                    Value::Array(items) => items
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            v => v.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(", "),
                    v => v.to_string(),
                }
            }
        };
        let text = sanitize_text(&text);
        (!text.is_empty()).then_some(text)
    }

    fn flag(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> bool {
        match obj.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => {
                    self.warn(format!("{path}.{key} was a string, coerced to true"));
                    true
                }
                _ => {
                    self.warn(format!("{path}.{key} was a string, coerced to false"));
                    false
                }
            },
            Some(Value::Number(n)) => {
                self.warn(format!("{path}.{key} was a number, coerced"));
                n.as_f64().is_some_and(|f| f != 0.0)
            }
            Some(_) => {
                self.warn(format!("{path}.{key} is not a flag, using false"));
                false
            }
        }
    }

    fn number(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<f64> {
        match obj.get(key)? {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => {
                    self.warn(format!("{path}.{key} was a numeric string, coerced"));
                    Some(f)
                }
                _ => {
                    self.warn(format!("{path}.{key} '{s}' is not numeric, dropped"));
                    None
                }
            },
            _ => {
                self.warn(format!("{path}.{key} is not numeric, dropped"));
                None
            }
        }
    }

    fn options(&mut self, obj: &Map<String, Value>, path: &str) -> Vec<QuestionOption> {
        let items = match obj.get("options") {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.warn(format!("{path}.options is not an array, dropped"));
                return Vec::new();
            }
        };

        let mut options = Vec::with_capacity(items.len());
        let mut coerced = false;
        for (oi, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => {
                    let label = sanitize_text(s);
                    if !label.is_empty() {
                        options.push(QuestionOption::from_label(label));
                        coerced = true;
                    }
                }
                Value::Number(_) | Value::Bool(_) => {
                    options.push(QuestionOption::from_label(item.to_string()));
                    coerced = true;
                }
                Value::Object(opt) => {
                    let label = opt.get("label").and_then(scalar_text);
                    let value = opt.get("value").and_then(scalar_text);
                    match (label, value) {
                        (Some(label), Some(value)) => options.push(QuestionOption { label, value }),
                        (Some(label), None) => options.push(QuestionOption::from_label(label)),
                        (None, Some(value)) => options.push(QuestionOption {
                            label: value.clone(),
                            value,
                        }),
                        (None, None) => {
                            self.warn(format!("{path}.options[{oi}] has no label, dropped"));
                        }
                    }
                }
                _ => self.warn(format!("{path}.options[{oi}] is not an option, dropped")),
            }
        }
        if coerced {
            self.warn(format!("{path}.options contained plain values, coerced"));
        }
        options
    }

    fn validation(&mut self, obj: &Map<String, Value>, path: &str) -> Option<ValidationRules> {
        let rules = match obj.get("validation")? {
            Value::Null => return None,
            Value::Object(rules) => rules,
            _ => {
                self.warn(format!("{path}.validation is not an object, dropped"));
                return None;
            }
        };
        let vpath = format!("{path}.validation");
        let length = |this: &mut Self, key: &str| {
            this.number(rules, key, &vpath)
                .filter(|f| *f >= 0.0)
                .map(|f| f.round() as u32)
        };
        let min_length = length(self, "minLength");
        let max_length = length(self, "maxLength");
        let pattern = rules.get("pattern").and_then(scalar_text);
        let message = self.free_text(rules, "message", &vpath);

        let parsed = ValidationRules {
            min_length,
            max_length,
            pattern,
            message,
        };
        (parsed != ValidationRules::default()).then_some(parsed)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => sanitize_text(s),
        Value::Number(_) | Value::Bool(_) => value.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// A required, non-empty identifier or title. Numbers are accepted as text.
fn required_text(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<String, GenerationError> {
    match obj.get(key) {
        Some(Value::String(s)) => {
            let text = sanitize_text(s);
            if text.is_empty() {
                Err(GenerationError::invalid(format!("{path}.{key}"), "empty"))
            } else {
                Ok(text)
            }
        }
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(GenerationError::invalid(
            format!("{path}.{key}"),
            "expected a string",
        )),
        None => Err(GenerationError::invalid(format!("{path}.{key}"), "missing")),
    }
}

/// Make `id` unique within `seen` by suffixing `-2`, `-3`, ...
fn unique_id(seen: &mut HashSet<String>, id: String, path: &str, warnings: &mut Vec<String>) -> String {
    if seen.insert(id.clone()) {
        return id;
    }
    let mut n = 2;
    let renamed = loop {
        let candidate = format!("{id}-{n}");
        if seen.insert(candidate.clone()) {
            break candidate;
        }
        n += 1;
    };
    let message = format!("{path}.id '{id}' is duplicated, renamed to '{renamed}'");
    tracing::warn!(warning = %message, "document normalized");
    warnings.push(message);
    renamed
}
