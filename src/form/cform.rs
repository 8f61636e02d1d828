//! The conversational form state machine.
//!
//! One `CForm` lives in the session per form type. Each user turn runs one
//! step: merge what the user said, then either let the turn pass through,
//! ask for what is missing, show a summary, or run the terminal action.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::FormConfig;
use crate::error::{LlmError, ValidationFailure};
use crate::form::extraction::{MergeEngine, MergeOutcome};
use crate::form::model::FieldSet;
use crate::form::prompts::{
    DialogueContext, ask_missing_prompt, change_prompt, confirm_prompt, language_prompt,
    parse_confirmation, parse_language, skip_note, summary_prompt, validation_prompt,
};
use crate::form::registry::FormType;
use crate::form::state::CFormState;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::session::Session;

/// Temperature for classification calls (language, confirmation).
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Max tokens for classification calls.
const CLASSIFY_MAX_TOKENS: u32 = 16;

/// Whether the current turn should bypass the form.
///
/// Skips only when nothing was merged, the previous turn was not itself
/// skipped, no confirmation is pending, and some tool ran this turn.
pub fn should_skip(
    model_updated: bool,
    previously_skipped: bool,
    state: CFormState,
    tools_invoked: usize,
) -> bool {
    !model_updated && !previously_skipped && !state.awaits_confirmation() && tools_invoked > 0
}

/// How a step was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// The form was just started by an intent; never skipped.
    Start,
    /// A regular turn of an already running form.
    Continue,
}

/// Result of one dialogue step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Let the underlying agent answer; `note` goes onto the user message.
    Skip { note: String },
    /// Show this text; the form stays alive.
    Reply(String),
    /// The terminal action ran; show its result and drop the form.
    Done(String),
}

/// Collaborators a step needs besides the session.
pub struct StepDeps<'a> {
    pub llm: &'a dyn LlmProvider,
    pub merge: &'a MergeEngine,
    pub config: &'a FormConfig,
}

/// A live conversational form.
#[derive(Debug, Clone)]
pub struct CForm {
    key: String,
    state: CFormState,
    model: FieldSet,
    model_is_updated: bool,
    language: Option<String>,
    dialog_is_skipped: bool,
}

impl CForm {
    /// A fresh form in `AskInformations` with an empty model.
    pub fn new(form_type: &FormType) -> Self {
        Self {
            key: form_type.name().to_string(),
            state: CFormState::default(),
            model: form_type.new_field_set(),
            model_is_updated: false,
            language: None,
            dialog_is_skipped: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> CFormState {
        self.state
    }

    pub fn model(&self) -> &FieldSet {
        &self.model
    }

    pub fn model_is_updated(&self) -> bool {
        self.model_is_updated
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn dialog_is_skipped(&self) -> bool {
        self.dialog_is_skipped
    }

    /// Fields still to ask for, in schema order.
    pub fn ask_for(&self) -> Vec<String> {
        self.model.empty_fields()
    }

    pub fn is_completed(&self) -> bool {
        self.model.is_completed()
    }

    /// Run one dialogue step for the session's latest user message.
    pub async fn step(
        &mut self,
        form_type: &FormType,
        session: &Session,
        deps: &StepDeps<'_>,
        mode: StepMode,
    ) -> Result<Step, LlmError> {
        // The starting turn is usually an intent command, not user prose
        if self.language.is_none() && mode == StepMode::Continue {
            self.language = self.detect_language(session, deps).await?;
        }

        let examples = form_type.prompt_examples();
        let outcome = deps
            .merge
            .update(&mut self.model, &examples, session.user_message())
            .await?;

        let updated = match outcome {
            MergeOutcome::Invalid(failure) => {
                self.model_is_updated = false;
                self.dialog_is_skipped = false;
                return self.explain_invalid(&failure, session, deps).await.map(Step::Reply);
            }
            other => other.is_updated(),
        };
        self.model_is_updated = updated;

        if mode == StepMode::Continue
            && should_skip(updated, self.dialog_is_skipped, self.state, session.tools_invoked())
        {
            self.dialog_is_skipped = true;
            debug!(form = %self.key, "Skipping form dialogue for this turn");
            return Ok(Step::Skip {
                note: skip_note(&self.key, &self.ask_for()),
            });
        }
        self.dialog_is_skipped = false;

        debug!(
            form = %self.key,
            state = %self.state,
            completed = self.is_completed(),
            "Form step"
        );

        if !self.is_completed() {
            let question = self.ask_missing_information(form_type, session, deps).await?;
            self.state = CFormState::AskInformations;
            return Ok(Step::Reply(question));
        }

        match self.state {
            CFormState::AskSummary => {
                if self.check_confirm(session, deps).await? {
                    return Ok(Step::Done(self.execute_action(form_type, session)));
                }
            }
            CFormState::AskInformations => {
                if !deps.config.ask_confirm {
                    return Ok(Step::Done(self.execute_action(form_type, session)));
                }
                let summary = self.show_summary(form_type, session, deps).await?;
                self.state = CFormState::AskSummary;
                info!(form = %self.key, state = %self.state, "Form complete, awaiting confirmation");
                return Ok(Step::Reply(summary));
            }
        }

        // Confirmation declined
        let question = self.ask_what_to_change(form_type, session, deps).await?;
        self.state = CFormState::AskInformations;
        info!(form = %self.key, state = %self.state, "Confirmation declined");
        Ok(Step::Reply(question))
    }

    fn dialogue_context<'a>(
        &'a self,
        form_type: &'a FormType,
        session: &'a Session,
        deps: &'a StepDeps<'_>,
    ) -> DialogueContext<'a> {
        DialogueContext {
            prefix: form_type
                .prompt_prefix()
                .unwrap_or(deps.config.prompt_prefix.as_str()),
            history: session.recent_history(deps.config.history_window),
            user_message: session.user_message(),
            language: self.language_or_default(),
        }
    }

    fn language_or_default(&self) -> &str {
        self.language
            .as_deref()
            .unwrap_or(crate::form::prompts::DEFAULT_LANGUAGE)
    }

    async fn dialogue_call(&self, deps: &StepDeps<'_>, prompt: String) -> Result<String, LlmError> {
        let request =
            CompletionRequest::prompt(prompt).with_temperature(deps.config.dialogue_temperature);
        Ok(deps.llm.complete(request).await?.content.trim().to_string())
    }

    async fn classify_call(&self, deps: &StepDeps<'_>, prompt: String) -> Result<String, LlmError> {
        let request = CompletionRequest::prompt(prompt)
            .with_max_tokens(CLASSIFY_MAX_TOKENS)
            .with_temperature(CLASSIFY_TEMPERATURE);
        Ok(deps.llm.complete(request).await?.content)
    }

    /// `None` when the reply is not a language name; detection is retried next turn.
    async fn detect_language(
        &self,
        session: &Session,
        deps: &StepDeps<'_>,
    ) -> Result<Option<String>, LlmError> {
        let reply = self
            .classify_call(deps, language_prompt(session.user_message()))
            .await?;
        let language = parse_language(&reply);
        match language {
            Some(ref language) => debug!(form = %self.key, language = %language, "Detected user language"),
            None => debug!(form = %self.key, raw = %reply, "No language in detection reply"),
        }
        Ok(language)
    }

    async fn ask_missing_information(
        &self,
        form_type: &FormType,
        session: &Session,
        deps: &StepDeps<'_>,
    ) -> Result<String, LlmError> {
        let ask_for = self.ask_for();
        info!(form = %self.key, missing = ?ask_for, "Asking for missing information");
        let prompt = ask_missing_prompt(&self.dialogue_context(form_type, session, deps), &ask_for);
        self.dialogue_call(deps, prompt).await
    }

    async fn show_summary(
        &self,
        form_type: &FormType,
        session: &Session,
        deps: &StepDeps<'_>,
    ) -> Result<String, LlmError> {
        let prompt = summary_prompt(&self.dialogue_context(form_type, session, deps), &self.model);
        self.dialogue_call(deps, prompt).await
    }

    async fn ask_what_to_change(
        &self,
        form_type: &FormType,
        session: &Session,
        deps: &StepDeps<'_>,
    ) -> Result<String, LlmError> {
        let prompt = change_prompt(&self.dialogue_context(form_type, session, deps), &self.model);
        self.dialogue_call(deps, prompt).await
    }

    async fn check_confirm(&self, session: &Session, deps: &StepDeps<'_>) -> Result<bool, LlmError> {
        let reply = self
            .classify_call(deps, confirm_prompt(session.user_message()))
            .await?;
        let confirmed = parse_confirmation(&reply);
        debug!(form = %self.key, confirmed, "Confirmation check");
        Ok(confirmed)
    }

    async fn explain_invalid(
        &self,
        failure: &ValidationFailure,
        session: &Session,
        deps: &StepDeps<'_>,
    ) -> Result<String, LlmError> {
        let prompt = validation_prompt(failure, session.user_message(), self.language_or_default());
        self.dialogue_call(deps, prompt).await
    }

    fn execute_action(&self, form_type: &FormType, session: &Session) -> String {
        let snapshot = Value::Object(self.model.get());
        info!(form = %self.key, model = %snapshot, "Executing form action");
        form_type.execute(session, &self.model)
    }
}
