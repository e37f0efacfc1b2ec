//! Prompt template collaborator.
//!
//! Templates turn the request's context map into the system/user prompt pair
//! by `{{key}}` substitution. The pipeline treats them as opaque; the only
//! failure that matters is a missing template.

use serde_json::{Map, Value};

use formsmith_types::error::TemplateError;

/// Rendered prompt pair handed to every provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Produces prompts from a context map.
pub trait PromptTemplate: Send + Sync {
    fn render(&self, context: &Map<String, Value>) -> Result<RenderedPrompt, TemplateError>;
}

/// Template held in memory.
#[derive(Debug, Clone)]
pub struct InlineTemplate {
    system: String,
    user: String,
}

impl InlineTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

impl PromptTemplate for InlineTemplate {
    fn render(&self, context: &Map<String, Value>) -> Result<RenderedPrompt, TemplateError> {
        Ok(RenderedPrompt {
            system: substitute(&self.system, context),
            user: substitute(&self.user, context),
        })
    }
}

/// Replace every `{{key}}` with the context value for `key`.
///
/// String values are inserted verbatim, other values as compact JSON.
/// `{{context}}` expands to the whole map when no `context` key exists.
/// Unknown keys are left in place.
pub fn substitute(template: &str, context: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after_open[..end].trim();
        match lookup(key, context) {
            Some(value) => out.push_str(&value),
            None => {
                tracing::debug!(key, "template placeholder has no context value");
                out.push_str(&rest[start..start + 2 + end + 2]);
            }
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

fn lookup(key: &str, context: &Map<String, Value>) -> Option<String> {
    match context.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
        None if key == "context" => Some(Value::Object(context.clone()).to_string()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Map<String, Value> {
        json!({"topic": "onboarding", "count": 5, "tags": ["a", "b"]})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_substitutes_strings_and_json() {
        let out = substitute("Make a {{ topic }} form with {{count}} questions {{tags}}", &ctx());
        assert_eq!(out, "Make a onboarding form with 5 questions [\"a\",\"b\"]");
    }

    #[test]
    fn test_unknown_and_unterminated_placeholders_kept() {
        assert_eq!(substitute("{{missing}} and {{topic}}", &ctx()), "{{missing}} and onboarding");
        assert_eq!(substitute("broken {{topic", &ctx()), "broken {{topic");
    }

    #[test]
    fn test_context_placeholder_expands_map() {
        let out = substitute("facts: {{context}}", &ctx());
        assert!(out.starts_with("facts: {"));
        assert!(out.contains("\"topic\":\"onboarding\""));
    }

    #[test]
    fn test_inline_template_renders_both_prompts() {
        let template = InlineTemplate::new("You write {{topic}} forms.", "Topic: {{topic}}");
        let prompt = template.render(&ctx()).unwrap();
        assert_eq!(prompt.system, "You write onboarding forms.");
        assert_eq!(prompt.user, "Topic: onboarding");
    }
}
