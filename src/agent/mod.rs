//! Host agent: routes each user turn through forms first, then plain chat.

pub mod submission;

pub use submission::{Submission, SubmissionParser};

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, FormError};
use crate::form::FormManager;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::session::{Session, SessionManager};

/// System prompt for turns no form answers.
const CHAT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant. Answer concisely. \
If the user message carries a reminder about an unfinished form, \
answer the user first and then gently remind them of it.";

/// Number of previous messages sent along with a plain chat turn.
const CHAT_HISTORY_WINDOW: usize = 10;

const HELP_TEXT: &str = "\
Commands:
  /register             start the user registration form
  /form start <name>    start a form
  /form stop <name>     stop a form
  /stop                 stop the active form
  /forms                list available forms
  /time                 current time (a tool)
  /quit                 exit";

/// What the channel should do after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    Reply(String),
    Quit,
}

/// Core dependencies for the agent.
pub struct AgentDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub forms: Arc<FormManager>,
    pub sessions: Arc<SessionManager>,
}

/// The host agent.
pub struct Agent {
    deps: AgentDeps,
}

impl Agent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.deps.sessions
    }

    /// Handle one inbound message for a session, to completion.
    pub async fn handle_message(&self, session_id: Uuid, content: &str) -> Result<TurnResult, Error> {
        let handle = self.deps.sessions.get_or_create(session_id).await;
        let mut session = handle.lock().await;
        session.begin_turn(content);

        let submission = SubmissionParser::parse(content);
        if submission.is_tool() {
            session.record_tool_call();
        }

        let reply = match submission {
            Submission::Quit => return Ok(TurnResult::Quit),
            Submission::Help => HELP_TEXT.to_string(),
            Submission::ListForms => {
                format!("Available forms: {}", self.deps.forms.registry().list().join(", "))
            }
            Submission::StartForm { name } => self.start_form(&mut session, &name).await?,
            Submission::StopForm { name } => self.stop_form(&mut session, &name),
            Submission::StopActiveForm => {
                match session.active_forms().current().map(str::to_string) {
                    Some(name) => self.stop_form(&mut session, &name),
                    None => "There is no form in progress.".to_string(),
                }
            }
            Submission::Time => {
                session.enrich_user_message(&format!(
                    "(Tool time returned: the current UTC time is {})",
                    Utc::now().format("%Y-%m-%d %H:%M:%S")
                ));
                self.converse(&mut session).await?
            }
            Submission::UserInput { .. } => self.converse(&mut session).await?,
        };

        session.record_exchange(content, reply.clone());
        Ok(TurnResult::Reply(reply))
    }

    async fn start_form(&self, session: &mut Session, name: &str) -> Result<String, Error> {
        match self.deps.forms.start(session, name).await {
            Ok(Some(response)) => Ok(response.output),
            Ok(None) => self.chat(session).await,
            Err(FormError::UnknownFormType { name }) => Ok(format!(
                "I don't know a form called '{name}'. Available forms: {}",
                self.deps.forms.registry().list().join(", ")
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn stop_form(&self, session: &mut Session, name: &str) -> String {
        if self.deps.forms.stop(session, name) {
            format!("Okay, I've cancelled the {name} form.")
        } else {
            format!("The {name} form is not in progress.")
        }
    }

    /// Active form first; plain chat when it has nothing to say.
    async fn converse(&self, session: &mut Session) -> Result<String, Error> {
        match self.deps.forms.dialogue_active(session).await? {
            Some(response) => {
                if response.completed {
                    info!(form = %response.form, session = %session.id, "Form finished this turn");
                }
                Ok(response.output)
            }
            None => self.chat(session).await,
        }
    }

    async fn chat(&self, session: &Session) -> Result<String, Error> {
        let mut messages = vec![ChatMessage::system(CHAT_SYSTEM_PROMPT)];
        messages.extend(session.recent_history(CHAT_HISTORY_WINDOW).iter().cloned());
        messages.push(ChatMessage::user(session.user_message()));

        let response = self.deps.llm.complete(CompletionRequest::new(messages)).await?;
        let content = response.content.trim().to_string();
        if content.is_empty() {
            warn!(session = %session.id, "LLM returned empty chat reply");
        }
        Ok(content)
    }
}
