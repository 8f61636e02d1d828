//! Submission types for the host turn loop.
//!
//! Slash commands stand in for the host's intent tools: they start and stop
//! forms, or run a small built-in tool. Everything else is user input that
//! goes through the active form first.

use crate::form::builtin::user_registration::USER_REGISTRATION;

/// Parses user input into Submission types.
pub struct SubmissionParser;

impl SubmissionParser {
    /// Parse message content into a Submission.
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/register" => Submission::StartForm {
                name: USER_REGISTRATION.to_string(),
            },
            "/stop" | "/cancel" => Submission::StopActiveForm,
            "/forms" => Submission::ListForms,
            "/time" => Submission::Time,
            "/help" | "/?" => Submission::Help,
            "/quit" | "/exit" => Submission::Quit,
            _ => parse_form_command(trimmed, &lower).unwrap_or_else(|| Submission::UserInput {
                content: content.to_string(),
            }),
        }
    }
}

/// `/form start <name>` and `/form stop <name>`; names keep their case.
fn parse_form_command(trimmed: &str, lower: &str) -> Option<Submission> {
    if !lower.starts_with("/form ") {
        return None;
    }
    let mut parts = trimmed.split_whitespace().skip(1);
    let verb = parts.next()?.to_lowercase();
    let name = parts.next()?.to_string();
    match verb.as_str() {
        "start" => Some(Submission::StartForm { name }),
        "stop" => Some(Submission::StopForm { name }),
        _ => None,
    }
}

/// A parsed user submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Plain text for the active form or the assistant.
    UserInput { content: String },
    /// Start (or resume) a form by name.
    StartForm { name: String },
    /// Stop a form by name.
    StopForm { name: String },
    /// Stop whichever form is active.
    StopActiveForm,
    /// List registered form types.
    ListForms,
    /// Built-in tool: current time.
    Time,
    Help,
    Quit,
}

impl Submission {
    /// Whether this submission runs a host tool (counted for turn skipping).
    pub fn is_tool(&self) -> bool {
        matches!(
            self,
            Self::StartForm { .. } | Self::StopForm { .. } | Self::StopActiveForm | Self::Time
        )
    }
}
