//! Merge engine: ask the LLM to update the field set from the latest user
//! message, then merge the reply into the model.
//!
//! Flow:
//! 1. Build the extraction prompt and call the LLM
//! 2. Parse the reply; unparseable text means "nothing extracted"
//! 3. Merge non-empty values, detect change, validate
//! 4. Replace the model only when the merged result is valid

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{LlmError, ValidationFailure};
use crate::form::model::FieldSet;
use crate::form::prompts::{extraction_prompt, parse_extraction};
use crate::form::registry::PromptExample;
use crate::llm::{CompletionRequest, LlmProvider};

/// Extraction is deterministic.
const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// What one merge attempt did to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing new (including unparseable replies).
    Unchanged,
    /// The model now holds the merged, validated values.
    Updated,
    /// The merged values broke a field constraint; the model is untouched.
    Invalid(ValidationFailure),
}

impl MergeOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }
}

/// Runs the extraction call and merges its result.
pub struct MergeEngine {
    llm: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl MergeEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    /// Ask the LLM for an updated copy of the model's values.
    ///
    /// Returns `Ok(None)` when the reply is not a JSON object.
    pub async fn extract(
        &self,
        model: &FieldSet,
        examples: &[PromptExample],
        user_message: &str,
    ) -> Result<Option<Map<String, Value>>, LlmError> {
        let prompt = extraction_prompt(model, examples, user_message);
        debug!(prompt = %prompt, "Extraction prompt");

        let request = CompletionRequest::prompt(prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(EXTRACTION_TEMPERATURE);
        let response = self.llm.complete(request).await?;

        let extracted = parse_extraction(&response.content);
        if extracted.is_none() {
            warn!(raw = %response.content, "Malformed extraction reply, treating as no update");
        }
        Ok(extracted)
    }

    /// Update `model` from the user's message.
    pub async fn update(
        &self,
        model: &mut FieldSet,
        examples: &[PromptExample],
        user_message: &str,
    ) -> Result<MergeOutcome, LlmError> {
        let Some(extracted) = self.extract(model, examples, user_message).await? else {
            return Ok(MergeOutcome::Unchanged);
        };
        Ok(apply(model, &extracted))
    }
}

/// Merge an extracted object into the model.
pub fn apply(model: &mut FieldSet, extracted: &Map<String, Value>) -> MergeOutcome {
    match model.merge(extracted) {
        Ok(true) => {
            let snapshot = Value::Object(model.get());
            info!(model = %snapshot, "Form model updated");
            MergeOutcome::Updated
        }
        Ok(false) => MergeOutcome::Unchanged,
        Err(failure) => {
            warn!(field = %failure.field, error = %failure.message, "Extracted values failed validation");
            MergeOutcome::Invalid(failure)
        }
    }
}
