//! Per-session working memory.
//!
//! A `Session` is the explicit context every form operation receives: the
//! latest user message, the per-turn tool counter, the conversation so far,
//! the live form instances keyed by form name, and the active-form registry.

pub mod active;
pub mod manager;

pub use active::ActiveForms;
pub use manager::SessionManager;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::form::CForm;
use crate::llm::ChatMessage;

/// One conversation with a single user.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    user_message: String,
    tools_invoked: usize,
    history: Vec<ChatMessage>,
    forms: HashMap<String, CForm>,
    active_forms: ActiveForms,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_active: now,
            user_message: String::new(),
            tools_invoked: 0,
            history: Vec::new(),
            forms: HashMap::new(),
            active_forms: ActiveForms::new(),
        }
    }

    // ── Turn signals ────────────────────────────────────────────────

    /// Start a new turn: store the message and reset the tool counter.
    pub fn begin_turn(&mut self, text: impl Into<String>) {
        self.user_message = text.into();
        self.tools_invoked = 0;
        self.last_active = Utc::now();
    }

    /// Latest user message, possibly enriched by a skipped form.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Append a note to the user message before the agent sees it.
    pub fn enrich_user_message(&mut self, note: &str) {
        self.user_message.push_str("\n\n");
        self.user_message.push_str(note);
    }

    /// Count one tool/procedure invocation in the current turn.
    pub fn record_tool_call(&mut self) {
        self.tools_invoked += 1;
    }

    pub fn tools_invoked(&self) -> usize {
        self.tools_invoked
    }

    // ── Conversation ────────────────────────────────────────────────

    /// Messages of previous turns.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// The last `n` messages of previous turns.
    pub fn recent_history(&self, n: usize) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    /// Record a finished turn.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(ChatMessage::user(user));
        self.history.push(ChatMessage::assistant(assistant));
    }

    // ── Form store ──────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<&CForm> {
        self.forms.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, form: CForm) {
        self.forms.insert(key.into(), form);
    }

    pub fn delete(&mut self, key: &str) -> Option<CForm> {
        self.forms.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.forms.contains_key(key)
    }

    /// Keys of stored form instances, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.forms.keys().cloned().collect();
        keys.sort();
        keys
    }

    // ── Active-form registry ────────────────────────────────────────

    pub fn active_forms(&self) -> &ActiveForms {
        &self.active_forms
    }

    /// Make `key` the only active form, deleting every displaced instance.
    pub fn set_active(&mut self, key: &str) {
        for evicted in self.active_forms.set_active(key) {
            if self.forms.remove(&evicted).is_some() {
                tracing::info!(form = %evicted, replaced_by = %key, "Stopped displaced form");
            }
        }
    }

    /// Remove `key` from the registry without touching the instance.
    pub fn deactivate(&mut self, key: &str) -> bool {
        self.active_forms.remove(key)
    }
}
