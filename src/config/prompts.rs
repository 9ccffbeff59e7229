//! Prompt templates for Screenrag.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// System instruction sent with every generation request.
    pub system: String,
    /// User message template; `{{context}}` and `{{question}}` are substituted.
    pub user: String,
    /// Exact sentence shown (and expected from the model) when evidence is insufficient.
    pub refusal: String,
}

const DEFAULT_REFUSAL: &str =
    "The original trilogy screenplays don't contain enough information to answer this.";

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: format!(
                r#"You are a research assistant with access ONLY to excerpts
from the Star Wars original trilogy screenplays: A New Hope, The Empire
Strikes Back, and Return of the Jedi.

STRICT RULES:
- Answer using ONLY information present in the provided context chunks.
- If the context does not contain enough information, respond with exactly:
  "{DEFAULT_REFUSAL}"
- NEVER use outside knowledge, expanded universe material, or anything
  not explicitly stated in the provided context.
- NEVER speculate or infer beyond what the text directly supports.
- When quoting dialogue, attribute it to the correct character.
- Keep answers concise and grounded in the provided text."#
            ),
            user: "Context from the screenplays:\n\n{{context}}\n\nQuestion: {{question}}".to_string(),
            refusal: DEFAULT_REFUSAL.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
