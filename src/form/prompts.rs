//! Prompt templates for the form dialogue and parsers for the LLM's replies.
//!
//! Every reply is untrusted text: parsers never fail, they fall back to
//! "nothing extracted" or "not confirmed".

use serde_json::{Map, Value};

use crate::error::ValidationFailure;
use crate::form::model::FieldSet;
use crate::form::registry::PromptExample;
use crate::llm::{ChatMessage, Role};

/// Language assumed when detection yields nothing usable.
pub const DEFAULT_LANGUAGE: &str = "English";

/// Longest reply still taken as a language name ("Scottish Gaelic", "Brazilian Portuguese").
const MAX_LANGUAGE_WORDS: usize = 3;

/// Dialogue context shared by the user-facing prompts.
pub struct DialogueContext<'a> {
    pub prefix: &'a str,
    pub history: &'a [ChatMessage],
    pub user_message: &'a str,
    pub language: &'a str,
}

impl DialogueContext<'_> {
    /// Conversation tail ending in the current human message and an AI cue.
    fn conversation(&self) -> String {
        format!(
            "## Conversation until now:{}\n- Human: {}\n- AI: ",
            format_history(self.history),
            self.user_message
        )
    }
}

/// Render previous turns as `- Human:` / `- AI:` lines.
pub fn format_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(format!("\n- Human: {}", m.content)),
            Role::Assistant => Some(format!("\n- AI: {}", m.content)),
            Role::System => None,
        })
        .collect()
}

fn pretty(value: Map<String, Value>) -> String {
    serde_json::to_string_pretty(&Value::Object(value)).unwrap_or_else(|_| "{}".to_string())
}

/// Build the extraction prompt: few-shot examples, the current values, the
/// new sentence, and an `Updated JSON:` cue for the model to complete.
pub fn extraction_prompt(model: &FieldSet, examples: &[PromptExample], sentence: &str) -> String {
    let mut lines = Vec::new();
    for example in examples {
        lines.push(format!("Sentence: {}", example.sentence));
        lines.push(format!("JSON: {}", pretty(model.positional_json(&example.before))));
        lines.push(format!("Updated JSON: {}", pretty(model.positional_json(&example.after))));
        lines.push(String::new());
    }

    let mut prompt =
        String::from("Update the following JSON with information extracted from the Sentence:\n\n");
    if !lines.is_empty() {
        prompt.push_str(&lines.join("\n"));
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "Sentence: {sentence}\nJSON: {}\nUpdated JSON:",
        pretty(model.get())
    ));
    prompt
}

/// Ask which natural language a message is written in.
pub fn language_prompt(user_message: &str) -> String {
    format!(
        "Identify the natural language of the following message. \
         Reply with the English name of the language only, e.g. \"Italian\".\n\
         Message: {user_message}\n\
         Language:"
    )
}

/// Ask the user for the fields that are still empty, one question at a time.
pub fn ask_missing_prompt(ctx: &DialogueContext<'_>, ask_for: &[String]) -> String {
    format!(
        "{prefix}\n\
         Create a question for the user. Below are the things still needed to complete the form; \
         ask for them in a conversational and confidential way.\n\
         Ask only one question at a time, even if you don't get all the information.\n\
         Don't ask how to list! Don't say hello to the user!\n\
         Explain that you need some information.\n\
         Don't present the conversation history, just the question.\n\
         Answer in {language}.\n\
         ### ask_for list: {ask_for:?}\n\
         {conversation}",
        prefix = ctx.prefix,
        language = ctx.language,
        conversation = ctx.conversation(),
    )
}

/// Show the completed form and ask whether it is correct.
pub fn summary_prompt(ctx: &DialogueContext<'_>, model: &FieldSet) -> String {
    format!(
        "{prefix}\n\
         Show the summary of the data in the completed form and ask the user if it is correct.\n\
         Don't ask irrelevant questions.\n\
         Be precise and detailed in describing the form.\n\
         Answer in {language}.\n\
         ### form data:\n{data}\n\
         {conversation}",
        prefix = ctx.prefix,
        language = ctx.language,
        data = model.describe(),
        conversation = ctx.conversation(),
    )
}

/// The user declined the summary: ask what should be changed.
pub fn change_prompt(ctx: &DialogueContext<'_>, model: &FieldSet) -> String {
    format!(
        "{prefix}\n\
         The user said the data in the form below is not correct.\n\
         Ask the user which information they want to change. Ask only one question.\n\
         Answer in {language}.\n\
         ### form data:\n{data}\n\
         {conversation}",
        prefix = ctx.prefix,
        language = ctx.language,
        data = model.describe(),
        conversation = ctx.conversation(),
    )
}

/// Ask for a YES/NO judgement of the user's reply.
pub fn confirm_prompt(user_message: &str) -> String {
    format!(
        "Respond with either YES if the user's message is affirmative \
         or NO if the user's message is not affirmative.\n\
         - Human: {user_message}\n\
         - AI: "
    )
}

/// Explain a validation failure to the user.
pub fn validation_prompt(failure: &ValidationFailure, user_message: &str, language: &str) -> String {
    format!(
        "The information the user just gave could not be accepted.\n\
         Problem: {message}\n\
         Explain the problem to the user in one or two friendly sentences and ask them \
         to provide the '{field}' again. Answer in {language}.\n\
         - Human: {user_message}\n\
         - AI: ",
        message = failure.message,
        field = failure.field,
    )
}

/// Note appended to the user message when a form lets a turn pass through.
pub fn skip_note(form: &str, ask_for: &[String]) -> String {
    if ask_for.is_empty() {
        format!(
            "(Reminder for the assistant: the {form} form is complete and waiting for the user's confirmation.)"
        )
    } else {
        format!(
            "(Reminder for the assistant: to complete the {form} form these details are still missing: {}.)",
            ask_for.join(", ")
        )
    }
}

/// Pull one JSON object out of an LLM reply.
///
/// Tries the whole reply, then a fenced code block, then the outermost
/// `{`..`}` slice. Anything else is `None`.
pub fn parse_extraction(text: &str) -> Option<Map<String, Value>> {
    let parsed = json_candidates(text)
        .into_iter()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        });
    if parsed.is_none() {
        tracing::debug!("Extraction reply holds no JSON object");
    }
    parsed
}

/// Whether a YES/NO reply is affirmative: its first word must be "yes".
pub fn parse_confirmation(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .is_some_and(|word| word.eq_ignore_ascii_case("yes"))
}

/// Language name from a detection reply.
///
/// Only the first non-empty line counts, and only when it reads like a
/// language name: at most a few purely alphabetic words.
pub fn parse_language(text: &str) -> Option<String> {
    let line = text
        .lines()
        .map(|l| l.trim().trim_matches(|c: char| c == '"' || c == '.' || c == '*'))
        .find(|l| !l.is_empty())?;

    let words: Vec<&str> = line.split_whitespace().collect();
    let looks_like_name = words.len() <= MAX_LANGUAGE_WORDS
        && words
            .iter()
            .all(|w| w.chars().all(|c| c.is_alphabetic() || c == '-'));
    looks_like_name.then(|| line.to_string())
}

fn json_candidates(text: &str) -> Vec<&str> {
    let trimmed = text.trim();
    let mut candidates = vec![trimmed];

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            candidates.push(after[..end].trim());
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        candidates.push(&trimmed[start..=end]);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::form::model::FieldSpec;

    fn registration() -> FieldSet {
        FieldSet::new(vec![
            FieldSpec::text("name"),
            FieldSpec::text("surname"),
            FieldSpec::text("company"),
            FieldSpec::text("email"),
        ])
    }

    fn ctx<'a>(history: &'a [ChatMessage]) -> DialogueContext<'a> {
        DialogueContext {
            prefix: "You are a receptionist.",
            history,
            user_message: "Hello, I would register",
            language: "Italian",
        }
    }

    // ── Prompt construction ─────────────────────────────────────────

    #[test]
    fn extraction_prompt_without_examples() {
        let prompt = extraction_prompt(&registration(), &[], "my name is John");
        assert!(prompt.starts_with("Update the following JSON with information extracted from the Sentence:"));
        assert!(prompt.contains("Sentence: my name is John"));
        assert!(prompt.contains("\"surname\": null"));
        assert!(prompt.ends_with("Updated JSON:"));
    }

    #[test]
    fn extraction_prompt_renders_examples_with_field_names() {
        let examples = vec![PromptExample::new(
            "Hello, my surname is Smith",
            vec![json!("John"), json!(null), json!(null), json!(null)],
            vec![json!("John"), json!("Smith"), json!(null), json!(null)],
        )];
        let prompt = extraction_prompt(&registration(), &examples, "I work at Acme");

        assert!(prompt.contains("Sentence: Hello, my surname is Smith"));
        assert!(prompt.contains("\"surname\": \"Smith\""));
        // Example block comes before the live sentence
        let example_at = prompt.find("Hello, my surname").unwrap();
        let live_at = prompt.find("Sentence: I work at Acme").unwrap();
        assert!(example_at < live_at);
        assert_eq!(prompt.matches("Updated JSON:").count(), 2);
    }

    #[test]
    fn extraction_prompt_shows_current_values() {
        let mut model = registration();
        model.merge(json!({"name": "John"}).as_object().unwrap()).unwrap();
        let prompt = extraction_prompt(&model, &[], "Smith");
        assert!(prompt.contains("\"name\": \"John\""));
    }

    #[test]
    fn ask_missing_prompt_lists_fields_and_language() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello!")];
        let ask_for = vec!["name".to_string(), "email".to_string()];
        let prompt = ask_missing_prompt(&ctx(&history), &ask_for);
        assert!(prompt.starts_with("You are a receptionist."));
        assert!(prompt.contains(r#"["name", "email"]"#));
        assert!(prompt.contains("Answer in Italian."));
        assert!(prompt.contains("- Human: hi\n- AI: hello!"));
        assert!(prompt.ends_with("- Human: Hello, I would register\n- AI: "));
    }

    #[test]
    fn summary_prompt_includes_form_data() {
        let mut model = registration();
        model.merge(json!({"name": "John", "surname": "Smith"}).as_object().unwrap()).unwrap();
        let prompt = summary_prompt(&ctx(&[]), &model);
        assert!(prompt.contains("- name: John"));
        assert!(prompt.contains("- surname: Smith"));
        assert!(prompt.contains("ask the user if it is correct"));
    }

    #[test]
    fn change_prompt_asks_what_to_change() {
        let prompt = change_prompt(&ctx(&[]), &registration());
        assert!(prompt.contains("which information they want to change"));
    }

    #[test]
    fn validation_prompt_names_field() {
        let failure = ValidationFailure::new("email", "Field 'email' does not match the expected format");
        let prompt = validation_prompt(&failure, "my email is foo", "English");
        assert!(prompt.contains("Problem: Field 'email' does not match the expected format"));
        assert!(prompt.contains("provide the 'email' again"));
    }

    #[test]
    fn skip_note_variants() {
        let missing = skip_note("UserRegistration", &["name".to_string(), "email".to_string()]);
        assert!(missing.contains("name, email"));
        let pending = skip_note("UserRegistration", &[]);
        assert!(pending.contains("waiting for the user's confirmation"));
    }

    // ── Reply parsing ───────────────────────────────────────────────

    #[test]
    fn parse_extraction_direct_object() {
        let map = parse_extraction(r#"{"name": "John", "surname": null}"#).unwrap();
        assert_eq!(map["name"], json!("John"));
    }

    #[test]
    fn parse_extraction_from_markdown_block() {
        let map = parse_extraction("```json\n{\"name\": \"John\"}\n```").unwrap();
        assert_eq!(map["name"], json!("John"));
    }

    #[test]
    fn parse_extraction_embedded_in_text() {
        let map = parse_extraction("Sure! {\"company\": \"Acme\"} Hope it helps.").unwrap();
        assert_eq!(map["company"], json!("Acme"));
    }

    #[test]
    fn parse_extraction_object_followed_by_prose() {
        let map = parse_extraction("{\"name\": \"John\"}\nI filled in the name.").unwrap();
        assert_eq!(map["name"], json!("John"));
        let map = parse_extraction("Here: {\"name\": \"John\"}\nI filled in the name.").unwrap();
        assert_eq!(map["name"], json!("John"));
    }

    #[test]
    fn parse_extraction_rejects_garbage() {
        assert!(parse_extraction("I could not find anything").is_none());
        assert!(parse_extraction("{\"name\": \"John\"").is_none());
        assert!(parse_extraction("[1, 2, 3]").is_none());
        assert!(parse_extraction("").is_none());
    }

    #[test]
    fn parse_confirmation_words() {
        assert!(parse_confirmation("YES"));
        assert!(parse_confirmation("yes."));
        assert!(parse_confirmation("Yes, the user agrees"));
        assert!(!parse_confirmation("NO"));
        assert!(parse_confirmation("**YES**"));
        assert!(!parse_confirmation("Eyesight"));
        assert!(!parse_confirmation("NO, the user did not say yes"));
        assert!(!parse_confirmation(""));
    }

    #[test]
    fn parse_language_takes_first_line() {
        assert_eq!(parse_language("Italian\n").as_deref(), Some("Italian"));
        assert_eq!(parse_language("\n \"French\".\nextra").as_deref(), Some("French"));
        assert_eq!(parse_language("Brazilian Portuguese").as_deref(), Some("Brazilian Portuguese"));
        assert_eq!(parse_language("   "), None);
    }

    #[test]
    fn parse_language_rejects_sentences() {
        assert_eq!(parse_language("It is a command, not a language."), None);
        assert_eq!(parse_language("The message is written in English"), None);
        assert_eq!(parse_language("/register"), None);
    }
}
