//! Form dialogue phases.

use serde::{Deserialize, Serialize};

/// The phase a live form instance is in.
///
/// A stopped form has no phase: it is simply absent from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CFormState {
    /// Collecting field values from the user.
    #[default]
    AskInformations,
    /// All fields are set; a summary was shown and confirmation is pending.
    AskSummary,
}

impl CFormState {
    /// Whether the form is waiting for a yes/no answer.
    pub fn awaits_confirmation(&self) -> bool {
        matches!(self, Self::AskSummary)
    }
}

impl std::fmt::Display for CFormState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AskInformations => "ask_informations",
            Self::AskSummary => "ask_summary",
        };
        write!(f, "{s}")
    }
}
