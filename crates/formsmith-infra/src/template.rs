//! Directory-backed prompt templates.
//!
//! A template directory holds `system.txt` and `user.txt`. Both are read once
//! at load time; a missing file is kept as the template's error so the
//! pipeline reports it as a configuration failure on first use.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use formsmith_core::template::{InlineTemplate, PromptTemplate, RenderedPrompt};
use formsmith_types::error::TemplateError;

pub const SYSTEM_FILE: &str = "system.txt";
pub const USER_FILE: &str = "user.txt";

const DEFAULT_SYSTEM: &str = r#"You design questionnaires. Reply with a single JSON object and nothing else.

The object has a "sections" array. Each section has "id", "title", an optional
"description", and a "questions" array. Each question has "id", "label", "type"
(one of text, textarea, number, email, date, select, multi_select, radio,
checkbox, boolean, scale), "required", and optionally "description",
"helpText", "placeholder", "options" (for choice types, a list of
{"label", "value"}), "min", "max", "step", and "validation"
({"minLength", "maxLength", "pattern", "message"})."#;

const DEFAULT_USER: &str = "Create a questionnaire for the following context:\n\n{{context}}";

/// The prompt pair used when no template directory is configured.
pub fn default_template() -> InlineTemplate {
    InlineTemplate::new(DEFAULT_SYSTEM, DEFAULT_USER)
}

/// Template loaded from `{dir}/system.txt` and `{dir}/user.txt`.
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    dir: PathBuf,
    loaded: Result<InlineTemplate, TemplateError>,
}

impl FileTemplateStore {
    pub async fn load(dir: &Path) -> Self {
        let loaded = match (
            read_template(dir, SYSTEM_FILE).await,
            read_template(dir, USER_FILE).await,
        ) {
            (Ok(system), Ok(user)) => Ok(InlineTemplate::new(system, user)),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(dir = %dir.display(), error = %e, "prompt template unavailable");
                Err(e)
            }
        };
        Self {
            dir: dir.to_path_buf(),
            loaded,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_available(&self) -> bool {
        self.loaded.is_ok()
    }
}

impl PromptTemplate for FileTemplateStore {
    fn render(&self, context: &Map<String, Value>) -> Result<RenderedPrompt, TemplateError> {
        match &self.loaded {
            Ok(template) => template.render(context),
            Err(e) => Err(e.clone()),
        }
    }
}

async fn read_template(dir: &Path, file: &str) -> Result<String, TemplateError> {
    let path = dir.join(file);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TemplateError::Missing(path.display().to_string()))
        }
        Err(e) => Err(TemplateError::Unreadable {
            name: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}
