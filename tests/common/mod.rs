//! Scripted LLM shared by the integration tests.
//!
//! Replies are chosen by prompt shape, so a test only scripts the calls it
//! cares about: extraction replies and YES/NO judgements are queued, every
//! other prompt gets a recognisable canned answer.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use cform::error::LlmError;
use cform::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

pub const SUMMARY_REPLY: &str = "SUMMARY: is this correct?";
pub const CHANGE_REPLY: &str = "CHANGE: what should be changed?";
pub const INVALID_REPLY: &str = "INVALID: please try again";

/// Kind of prompt the mock recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Language,
    Extraction,
    Confirmation,
    Validation,
    AskMissing,
    Summary,
    Change,
    Chat,
}

pub fn classify(prompt: &str) -> PromptKind {
    if prompt.starts_with("Update the following JSON") {
        PromptKind::Extraction
    } else if prompt.starts_with("Identify the natural language") {
        PromptKind::Language
    } else if prompt.starts_with("Respond with either YES") {
        PromptKind::Confirmation
    } else if prompt.starts_with("The information the user just gave could not be accepted") {
        PromptKind::Validation
    } else if prompt.contains("Create a question for the user") {
        PromptKind::AskMissing
    } else if prompt.contains("Show the summary of the data") {
        PromptKind::Summary
    } else if prompt.contains("which information they want to change") {
        PromptKind::Change
    } else {
        PromptKind::Chat
    }
}

pub struct ScriptedLlm {
    language: String,
    languages: Mutex<VecDeque<String>>,
    failing: Mutex<Option<PromptKind>>,
    extractions: Mutex<VecDeque<String>>,
    confirmations: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(PromptKind, String)>>,
    offline: AtomicBool,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            language: "English".to_string(),
            languages: Mutex::new(VecDeque::new()),
            failing: Mutex::new(None),
            extractions: Mutex::new(VecDeque::new()),
            confirmations: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Queue the raw reply for the next language call; afterwards the
    /// default language is answered again.
    pub fn push_language(&self, reply: &str) {
        self.languages.lock().unwrap().push_back(reply.to_string());
    }

    /// Make calls of one prompt kind fail until `clear_failure`.
    pub fn fail_on(&self, kind: PromptKind) {
        *self.failing.lock().unwrap() = Some(kind);
    }

    pub fn clear_failure(&self) {
        *self.failing.lock().unwrap() = None;
    }

    /// Queue the raw reply for the next extraction call.
    pub fn push_extraction(&self, reply: &str) {
        self.extractions.lock().unwrap().push_back(reply.to_string());
    }

    /// Queue the raw reply for the next YES/NO call.
    pub fn push_confirmation(&self, reply: &str) {
        self.confirmations.lock().unwrap().push_back(reply.to_string());
    }

    /// Make every following call fail.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(PromptKind, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: PromptKind) -> usize {
        self.calls.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn last_prompt(&self, kind: PromptKind) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
    }

    fn reply_for(&self, kind: PromptKind, prompt: &str) -> String {
        match kind {
            PromptKind::Language => self
                .languages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.language.clone()),
            PromptKind::Extraction => self
                .extractions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "{}".to_string()),
            PromptKind::Confirmation => self
                .confirmations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "NO".to_string()),
            PromptKind::Validation => INVALID_REPLY.to_string(),
            PromptKind::AskMissing => {
                let list = prompt
                    .lines()
                    .find_map(|l| l.strip_prefix("### ask_for list: "))
                    .unwrap_or("[]");
                format!("ASK {list}")
            }
            PromptKind::Summary => SUMMARY_REPLY.to_string(),
            PromptKind::Change => CHANGE_REPLY.to_string(),
            PromptKind::Chat => format!("CHAT: {prompt}"),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: "offline".to_string(),
            });
        }

        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let kind = classify(&prompt);
        if *self.failing.lock().unwrap() == Some(kind) {
            return Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: format!("{kind:?} unavailable"),
            });
        }
        let content = self.reply_for(kind, &prompt);
        self.calls.lock().unwrap().push((kind, prompt));

        Ok(CompletionResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
        })
    }
}
