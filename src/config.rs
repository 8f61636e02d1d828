//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default persona used when a form type carries no prompt prefix.
pub const DEFAULT_PROMPT_PREFIX: &str = "\
You are a helpful assistant guiding the user through filling in a form. \
You are friendly, concise and never pushy.";

/// Host configuration read by the form state machine.
#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Show a summary and ask for confirmation before executing the action.
    pub ask_confirm: bool,
    /// Number of conversation messages included in dialogue prompts.
    pub history_window: usize,
    /// Persona prepended to dialogue prompts when the form has none.
    pub prompt_prefix: String,
    /// Max tokens for the extraction call.
    pub extraction_max_tokens: u32,
    /// Temperature for dialogue (question/summary) calls.
    pub dialogue_temperature: f32,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            ask_confirm: true,
            history_window: 5,
            prompt_prefix: DEFAULT_PROMPT_PREFIX.to_string(),
            extraction_max_tokens: 512,
            dialogue_temperature: 0.7,
        }
    }
}

/// Session housekeeping.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are pruned.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Everything the binary needs, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub forms: FormConfig,
    pub sessions: SessionConfig,
}

impl AppConfig {
    /// Load configuration from `CFORM_*` and provider API key variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("CFORM_LLM_BACKEND").as_deref() {
            None | Some("anthropic") => LlmBackend::Anthropic,
            Some("openai") => LlmBackend::OpenAi,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "CFORM_LLM_BACKEND".to_string(),
                    message: format!("expected 'anthropic' or 'openai', got '{other}'"),
                });
            }
        };

        let key_var = backend.api_key_var();
        let api_key = lookup(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.into()))?;

        let model = lookup("CFORM_MODEL").unwrap_or_else(|| backend.default_model().to_string());
        let base_url = lookup("CFORM_LLM_BASE_URL");

        let mut forms = FormConfig::default();
        if let Some(raw) = lookup("CFORM_ASK_CONFIRM") {
            forms.ask_confirm = parse_bool("CFORM_ASK_CONFIRM", &raw)?;
        }
        if let Some(raw) = lookup("CFORM_HISTORY_WINDOW") {
            forms.history_window = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CFORM_HISTORY_WINDOW".to_string(),
                message: format!("expected a non-negative integer, got '{raw}'"),
            })?;
        }

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
                base_url,
            },
            forms,
            sessions: SessionConfig::default(),
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{raw}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_anthropic_with_confirmation() {
        let config = AppConfig::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "sk-ant")])).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Anthropic);
        assert!(config.forms.ask_confirm);
        assert_eq!(config.forms.history_window, 5);
        assert!(config.llm.base_url.is_none());
    }

    #[test]
    fn missing_api_key_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[("CFORM_LLM_BACKEND", "openai")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENAI_API_KEY"));
    }

    #[test]
    fn ask_confirm_can_be_disabled() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("CFORM_ASK_CONFIRM", "false"),
            ("CFORM_HISTORY_WINDOW", "2"),
        ]))
        .unwrap();
        assert!(!config.forms.ask_confirm);
        assert_eq!(config.forms.history_window, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("CFORM_ASK_CONFIRM", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = AppConfig::from_lookup(lookup_from(&[("CFORM_LLM_BACKEND", "local")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CFORM_LLM_BACKEND"));
    }
}
