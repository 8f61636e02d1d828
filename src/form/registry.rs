//! Form types and the lookup table they are registered into.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::form::model::{FieldSet, FieldSpec};
use crate::session::Session;

/// Terminal action run once a form is complete (and confirmed).
pub type ActionFn = Arc<dyn Fn(&Session, &FieldSet) -> String + Send + Sync>;

/// Few-shot examples for the extraction prompt.
pub type ExamplesFn = Arc<dyn Fn() -> Vec<PromptExample> + Send + Sync>;

/// One extraction example: a sentence and the field values before and after it.
///
/// Values are positional, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptExample {
    pub sentence: String,
    pub before: Vec<Value>,
    pub after: Vec<Value>,
}

impl PromptExample {
    pub fn new(sentence: impl Into<String>, before: Vec<Value>, after: Vec<Value>) -> Self {
        Self {
            sentence: sentence.into(),
            before,
            after,
        }
    }
}

/// Capability record for one kind of form.
#[derive(Clone)]
pub struct FormType {
    name: String,
    fields: Vec<FieldSpec>,
    prompt_prefix: Option<String>,
    execute_action: Option<ActionFn>,
    prompt_examples: Option<ExamplesFn>,
}

impl fmt::Debug for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormType")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .field("has_action", &self.execute_action.is_some())
            .field("has_examples", &self.prompt_examples.is_some())
            .finish()
    }
}

impl FormType {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
            prompt_prefix: None,
            execute_action: None,
            prompt_examples: None,
        }
    }

    pub fn with_prompt_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prompt_prefix = Some(prefix.into());
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Session, &FieldSet) -> String + Send + Sync + 'static,
    {
        self.execute_action = Some(Arc::new(action));
        self
    }

    pub fn with_prompt_examples<F>(mut self, examples: F) -> Self
    where
        F: Fn() -> Vec<PromptExample> + Send + Sync + 'static,
    {
        self.prompt_examples = Some(Arc::new(examples));
        self
    }

    /// The form key used in the session and the active-form registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt_prefix(&self) -> Option<&str> {
        self.prompt_prefix.as_deref()
    }

    /// A fresh, empty field set for this form.
    pub fn new_field_set(&self) -> FieldSet {
        FieldSet::new(self.fields.clone())
    }

    pub fn prompt_examples(&self) -> Vec<PromptExample> {
        self.prompt_examples
            .as_ref()
            .map(|examples| examples())
            .unwrap_or_default()
    }

    /// Run the terminal action, or fall back to the field set as JSON.
    pub fn execute(&self, session: &Session, model: &FieldSet) -> String {
        match self.execute_action {
            Some(ref action) => action(session, model),
            None => Value::Object(model.get()).to_string(),
        }
    }
}

/// Lookup table of form types keyed by name, filled at startup.
#[derive(Debug, Default)]
pub struct FormRegistry {
    forms: HashMap<String, Arc<FormType>>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a form type; a later registration under the same name wins.
    pub fn register(&mut self, form: FormType) {
        let name = form.name().to_string();
        if self.forms.insert(name.clone(), Arc::new(form)).is_some() {
            tracing::warn!(form = %name, "Replaced an existing form type registration");
        } else {
            tracing::debug!(form = %name, "Registered form type");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<FormType>> {
        self.forms.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.forms.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.forms.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.forms.len()
    }
}
