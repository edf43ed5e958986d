//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/` directory)
//! so operators can tune the oracle's instructions without recompiling.
//! Resource maps and letters are passed to templates as pre-rendered pretty
//! JSON strings.

use minijinja::Environment;
use serde::Serialize;
use trueque_types::{Letter, OfferAnalysis, ResourceMap};

use crate::error::AgentError;

/// Template files the engine requires, by registered name.
const TEMPLATES: &[(&str, &str)] = &[
    ("system", "system.j2"),
    ("classify", "classify.j2"),
    ("adjudicate", "adjudicate.j2"),
];

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message describing the oracle's role.
    pub system: String,
    /// User message with the task, the snapshot and the letter or offer.
    pub user: String,
}

#[derive(Serialize)]
struct ClassifyContext {
    needs: String,
    surplus: String,
    letter: String,
}

#[derive(Serialize)]
struct AdjudicateContext {
    needs: String,
    surplus: String,
    offer: String,
}

impl PromptEngine {
    /// Create a prompt engine loading templates from the given directory.
    ///
    /// The directory must contain `system.j2`, `classify.j2` and
    /// `adjudicate.j2`.
    pub fn new(templates_dir: &str) -> Result<Self, AgentError> {
        let mut env = Environment::new();
        for (name, file) in TEMPLATES {
            let source = load_template(templates_dir, file)?;
            env.add_template_owned(*name, source)
                .map_err(|e| AgentError::Template(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Render the classification prompt for one letter.
    pub fn render_classify(
        &self,
        letter: &Letter,
        needs: &ResourceMap,
        surplus: &ResourceMap,
    ) -> Result<RenderedPrompt, AgentError> {
        let context = ClassifyContext {
            needs: pretty(needs)?,
            surplus: pretty(surplus)?,
            letter: pretty(letter)?,
        };
        Ok(RenderedPrompt {
            system: self.render("system", &context)?,
            user: self.render("classify", &context)?,
        })
    }

    /// Render the adjudication prompt for a classified offer.
    pub fn render_adjudicate(
        &self,
        analysis: &OfferAnalysis,
        needs: &ResourceMap,
        surplus: &ResourceMap,
    ) -> Result<RenderedPrompt, AgentError> {
        let offer = serde_json::json!({
            "oferta": analysis.offered,
            "pide": analysis.requested,
        });
        let context = AdjudicateContext {
            needs: pretty(needs)?,
            surplus: pretty(surplus)?,
            offer: pretty(&offer)?,
        };
        Ok(RenderedPrompt {
            system: self.render("system", &context)?,
            user: self.render("adjudicate", &context)?,
        })
    }

    fn render<S: Serialize>(&self, name: &str, context: &S) -> Result<String, AgentError> {
        self.env
            .get_template(name)
            .map_err(|e| AgentError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| AgentError::Template(format!("{name} render failed: {e}")))
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String, AgentError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, AgentError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| AgentError::Template(format!("failed to read {path}: {e}")))
}
