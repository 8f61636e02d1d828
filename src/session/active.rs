//! Per-session registry of the form that currently owns the conversation.

/// Keys of active forms. Holds at most one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveForms {
    keys: Vec<String>,
}

impl ActiveForms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `key` the active form, returning every key it displaced.
    pub fn set_active(&mut self, key: &str) -> Vec<String> {
        if !self.keys.iter().any(|k| k == key) {
            self.keys.push(key.to_string());
        }
        let (kept, evicted): (Vec<String>, Vec<String>) =
            self.keys.drain(..).partition(|k| k == key);
        self.keys = kept;
        evicted
    }

    /// Drop `key` if present.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        self.keys.len() != before
    }

    /// The active form key, if any.
    pub fn current(&self) -> Option<&str> {
        self.keys.first().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
