//! The reasoning oracle: free-text letters in, structured judgments out.
//!
//! The negotiation loop depends only on the [`Oracle`] trait. Its answers
//! are advisory; the policy in `trueque-core` re-validates everything before
//! acting. Oracle calls never fail from the caller's point of view: backend
//! errors and unparsable replies degrade to the safe default and are never
//! retried.

use std::future::Future;

use tracing::{debug, warn};
use trueque_types::{Adjudication, Letter, OfferAnalysis, ResourceMap};

use crate::llm::LlmBackend;
use crate::parse::{adjudication_schema, parse_adjudication, parse_classification};
use crate::prompt::PromptEngine;

/// Turns letters and offers into structured judgments.
pub trait Oracle {
    /// Classify a letter and extract the resource maps it mentions.
    fn classify(
        &self,
        letter: &Letter,
        needs: &ResourceMap,
        surplus: &ResourceMap,
    ) -> impl Future<Output = OfferAnalysis>;

    /// Decide whether to accept a classified offer, possibly narrowing it.
    fn adjudicate(
        &self,
        analysis: &OfferAnalysis,
        needs: &ResourceMap,
        surplus: &ResourceMap,
    ) -> impl Future<Output = Adjudication>;
}

/// Oracle backed by a language model.
pub struct LlmOracle {
    prompts: PromptEngine,
    backend: LlmBackend,
}

impl LlmOracle {
    /// Combine a prompt engine and a backend.
    pub const fn new(prompts: PromptEngine, backend: LlmBackend) -> Self {
        Self { prompts, backend }
    }
}

impl Oracle for LlmOracle {
    async fn classify(&self, letter: &Letter, needs: &ResourceMap, surplus: &ResourceMap) -> OfferAnalysis {
        let prompt = match self.prompts.render_classify(letter, needs, surplus) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(letter_id = %letter.id, error = %e, "classification prompt failed");
                return OfferAnalysis::other();
            }
        };

        match self.backend.complete(&prompt, None).await {
            Ok(raw) => {
                debug!(letter_id = %letter.id, backend = self.backend.name(), raw_response = raw, "classification reply");
                parse_classification(&raw)
            }
            Err(e) => {
                warn!(letter_id = %letter.id, backend = self.backend.name(), error = %e, "classification call failed");
                OfferAnalysis::other()
            }
        }
    }

    async fn adjudicate(
        &self,
        analysis: &OfferAnalysis,
        needs: &ResourceMap,
        surplus: &ResourceMap,
    ) -> Adjudication {
        let prompt = match self.prompts.render_adjudicate(analysis, needs, surplus) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "adjudication prompt failed");
                return Adjudication::rejected();
            }
        };

        let schema = adjudication_schema();
        match self.backend.complete(&prompt, Some(&schema)).await {
            Ok(raw) => {
                debug!(backend = self.backend.name(), raw_response = raw, "adjudication reply");
                parse_adjudication(&raw)
            }
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "adjudication call failed");
                Adjudication::rejected()
            }
        }
    }
}
