//! FormManager: starts, stops and drives forms inside a session.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::FormConfig;
use crate::error::FormError;
use crate::form::cform::{CForm, Step, StepDeps, StepMode};
use crate::form::extraction::MergeEngine;
use crate::form::registry::{FormRegistry, FormType};
use crate::llm::LlmProvider;
use crate::session::Session;

/// A form's reply for the current turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormResponse {
    /// Form key that produced the reply.
    pub form: String,
    /// Text to show the user.
    pub output: String,
    /// The terminal action ran and the form is gone.
    pub completed: bool,
}

/// Coordinates form types, the session's active-form registry, and
/// dialogue steps.
pub struct FormManager {
    llm: Arc<dyn LlmProvider>,
    merge: MergeEngine,
    registry: Arc<FormRegistry>,
    config: FormConfig,
}

impl FormManager {
    pub fn new(llm: Arc<dyn LlmProvider>, registry: Arc<FormRegistry>, config: FormConfig) -> Self {
        let merge = MergeEngine::new(Arc::clone(&llm), config.extraction_max_tokens);
        Self {
            llm,
            merge,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &FormRegistry {
        &self.registry
    }

    fn form_type(&self, name: &str) -> Result<Arc<FormType>, FormError> {
        self.registry
            .get(name)
            .ok_or_else(|| FormError::UnknownFormType {
                name: name.to_string(),
            })
    }

    /// Start (or resume) a form, make it the only active one, and run one step.
    pub async fn start(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Result<Option<FormResponse>, FormError> {
        let form_type = self.form_type(name)?;
        if !session.contains(name) {
            session.set(name, CForm::new(&form_type));
            info!(form = %name, session = %session.id, "Form started");
        }
        session.set_active(name);
        self.run_step(session, &form_type, StepMode::Start).await
    }

    /// Drop a form. Stopping a form that is not running is a no-op.
    pub fn stop(&self, session: &mut Session, name: &str) -> bool {
        session.deactivate(name);
        let stopped = session.delete(name).is_some();
        if stopped {
            info!(form = %name, session = %session.id, "Form stopped");
        } else {
            debug!(form = %name, "Stop requested for a form that is not running");
        }
        stopped
    }

    /// Continue a running form. No instance means no reply.
    pub async fn dialogue(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Result<Option<FormResponse>, FormError> {
        if !session.contains(name) {
            debug!(form = %name, "No running instance, nothing to continue");
            return Ok(None);
        }
        let form_type = self.form_type(name)?;
        self.run_step(session, &form_type, StepMode::Continue).await
    }

    /// Continue whichever form is active in the session, if any.
    pub async fn dialogue_active(
        &self,
        session: &mut Session,
    ) -> Result<Option<FormResponse>, FormError> {
        let Some(name) = session.active_forms().current().map(str::to_string) else {
            return Ok(None);
        };
        self.dialogue(session, &name).await
    }

    async fn run_step(
        &self,
        session: &mut Session,
        form_type: &FormType,
        mode: StepMode,
    ) -> Result<Option<FormResponse>, FormError> {
        let key = form_type.name();
        // Take the form out so the step can read the session while mutating it
        let Some(mut form) = session.delete(key) else {
            return Ok(None);
        };

        let deps = StepDeps {
            llm: self.llm.as_ref(),
            merge: &self.merge,
            config: &self.config,
        };
        // A failed step leaves the form exactly as it was before the turn
        let before = form.clone();
        let step = match form.step(form_type, session, &deps, mode).await {
            Ok(step) => step,
            Err(e) => {
                warn!(form = %key, session = %session.id, error = %e, "Form step failed, state restored");
                session.set(key, before);
                return Err(e.into());
            }
        };

        match step {
            Step::Skip { note } => {
                session.set(key, form);
                session.enrich_user_message(&note);
                Ok(None)
            }
            Step::Reply(output) => {
                session.set(key, form);
                Ok(Some(FormResponse {
                    form: key.to_string(),
                    output,
                    completed: false,
                }))
            }
            Step::Done(output) => {
                session.deactivate(key);
                info!(form = %key, session = %session.id, "Form completed");
                Ok(Some(FormResponse {
                    form: key.to_string(),
                    output,
                    completed: true,
                }))
            }
        }
    }
}
