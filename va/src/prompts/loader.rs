//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Variables available to the `generate` template
#[derive(Debug, Clone, Serialize)]
pub struct GenerationContext {
    /// Import line prepended to every executed program
    pub preamble: String,
    /// Literal path the generated test should read from
    pub input_placeholder: String,
    /// Literal path the generated test should write to
    pub output_placeholder: String,
}

/// Variables available to the `correct` template
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionContext {
    /// Literal standard error of the failed run
    pub error: String,
    pub input_placeholder: String,
    pub output_placeholder: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.vision-agent/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that honours overrides under `{root}/.vision-agent/prompts/`
    pub fn new(root: impl AsRef<Path>) -> Self {
        let user_dir = root.as_ref().join(".vision-agent").join("prompts");
        let user_dir_exists = user_dir.is_dir();
        debug!(?user_dir, %user_dir_exists, "PromptLoader::new: called");

        Self {
            hbs: new_engine(),
            user_dir: user_dir_exists.then_some(user_dir),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: new_engine(),
            user_dir: None,
        }
    }

    /// Load a template by name
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Render the code-generation system prompt
    pub fn generation_prompt(&self, context: &GenerationContext) -> Result<String> {
        self.render("generate", context)
    }

    /// Render the correction request for a failed test run
    pub fn correction_prompt(&self, context: &CorrectionContext) -> Result<String> {
        self.render("correct", context)
    }
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::embedded_only()
    }
}

// Prompts are plain text; HTML escaping would mangle code and tracebacks.
fn new_engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn generation_context() -> GenerationContext {
        GenerationContext {
            preamble: "from vision_agent.tools import load_image, owl_v2".to_string(),
            input_placeholder: "path/to/actual_input_image.jpg".to_string(),
            output_placeholder: "path/to/output_image.jpg".to_string(),
        }
    }

    #[test]
    fn test_generation_prompt_renders_variables() {
        let loader = PromptLoader::embedded_only();
        let prompt = loader.generation_prompt(&generation_context()).unwrap();

        assert!(prompt.contains("from vision_agent.tools import load_image, owl_v2"));
        assert!(prompt.contains("\"path/to/actual_input_image.jpg\""));
        assert!(prompt.contains("\"path/to/output_image.jpg\""));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_correction_prompt_keeps_error_verbatim() {
        let loader = PromptLoader::embedded_only();
        let ctx = CorrectionContext {
            error: "Traceback:\n  File \"<stdin>\"\nValueError: x < 0 & y > 1".to_string(),
            input_placeholder: "in.jpg".to_string(),
            output_placeholder: "out.jpg".to_string(),
        };

        let prompt = loader.correction_prompt(&ctx).unwrap();
        assert!(prompt.contains("ValueError: x < 0 & y > 1"));
        assert!(prompt.contains("File \"<stdin>\""));
    }

    #[test]
    fn test_user_override_wins() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".vision-agent").join("prompts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("generate.pmt"), "custom {{preamble}}").unwrap();

        let loader = PromptLoader::new(temp.path());
        let prompt = loader.generation_prompt(&generation_context()).unwrap();
        assert_eq!(prompt, "custom from vision_agent.tools import load_image, owl_v2");

        // Templates without an override still come from the embedded set
        let ctx = CorrectionContext {
            error: "boom".to_string(),
            input_placeholder: "a".to_string(),
            output_placeholder: "b".to_string(),
        };
        assert!(loader.correction_prompt(&ctx).unwrap().contains("boom"));
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.render("nonexistent-template", &generation_context()).is_err());
    }
}
