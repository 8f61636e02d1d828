//! Conversational forms: collect structured fields across chat turns.
//!
//! A form type declares its fields. While a form is running, every user
//! turn is sent through an LLM extraction call that updates the field set;
//! the state machine then asks for what is missing, shows a summary for
//! confirmation, and finally runs the form's terminal action.

pub mod builtin;
pub mod cform;
pub mod extraction;
pub mod manager;
pub mod model;
pub mod prompts;
pub mod registry;
pub mod state;

pub use cform::{CForm, Step, StepMode, should_skip};
pub use extraction::{MergeEngine, MergeOutcome};
pub use manager::{FormManager, FormResponse};
pub use model::{FieldKind, FieldSet, FieldSpec};
pub use registry::{FormRegistry, FormType, PromptExample};
pub use state::CFormState;
