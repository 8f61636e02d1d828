//! User registration form: name, surname, company and e-mail.

use regex::Regex;
use serde_json::{Value, json};

use crate::form::model::{FieldSet, FieldSpec};
use crate::form::registry::{FormType, PromptExample};
use crate::session::Session;

/// Form key of the registration form.
pub const USER_REGISTRATION: &str = "UserRegistration";

/// Loose shape check; deliverability is not our concern.
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// The registration form type with its action and extraction examples.
pub fn user_registration() -> FormType {
    let email = match Regex::new(EMAIL_PATTERN) {
        Ok(pattern) => FieldSpec::text("email").with_pattern(pattern),
        Err(e) => {
            tracing::error!(error = %e, "Invalid e-mail pattern, accepting any text");
            FieldSpec::text("email")
        }
    };

    FormType::new(
        USER_REGISTRATION,
        vec![
            FieldSpec::text("name").with_description("Name of the user who wants to register"),
            FieldSpec::text("surname")
                .with_description("Surname of the user who wants to register"),
            FieldSpec::text("company")
                .with_description("Company where the user who wants to register works"),
            email.with_description("Email of the user who wants to register"),
        ],
    )
    .with_action(registration_result)
    .with_prompt_examples(prompt_examples)
}

fn text_of(model: &FieldSet, name: &str) -> String {
    match model.value(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// HTML confirmation table for a completed registration.
fn registration_result(_session: &Session, model: &FieldSet) -> String {
    let mut result = String::from("<h3>You have registered</h3><br>");
    result.push_str("<table border=0>");
    for (label, field) in [
        ("Name", "name"),
        ("Surname", "surname"),
        ("Company", "company"),
        ("Email", "email"),
    ] {
        result.push_str(&format!(
            "<tr><td>{label}</td><td>{}</td></tr>",
            text_of(model, field)
        ));
    }
    result.push_str("</table>");
    result
}

fn prompt_examples() -> Vec<PromptExample> {
    vec![
        PromptExample::new(
            "Hello, I would register me for this service",
            vec![json!(null), json!(null), json!(null), json!(null)],
            vec![json!(null), json!(null), json!(null), json!(null)],
        ),
        PromptExample::new(
            "Hello, my surname is Smith",
            vec![json!("John"), json!(null), json!(null), json!(null)],
            vec![json!("John"), json!("Smith"), json!(null), json!(null)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed() -> FieldSet {
        let mut model = user_registration().new_field_set();
        model
            .merge(
                json!({
                    "name": "John",
                    "surname": "Smith",
                    "company": "Acme",
                    "email": "john@acme.com"
                })
                .as_object()
                .unwrap(),
            )
            .unwrap();
        model
    }

    #[test]
    fn schema_has_four_text_fields() {
        let form = user_registration();
        assert_eq!(form.name(), USER_REGISTRATION);
        assert_eq!(
            form.new_field_set().empty_fields(),
            ["name", "surname", "company", "email"]
        );
    }

    #[test]
    fn email_must_look_like_an_address() {
        let mut model = user_registration().new_field_set();
        let err = model
            .merge(json!({"email": "john at acme"}).as_object().unwrap())
            .unwrap_err();
        assert_eq!(err.field, "email");
    }

    #[test]
    fn action_renders_table() {
        let html = user_registration().execute(&Session::new(), &completed());
        assert!(html.starts_with("<h3>You have registered</h3>"));
        assert!(html.contains("<td>Surname</td><td>Smith</td>"));
        assert!(html.contains("<td>Email</td><td>john@acme.com</td>"));
        assert!(html.ends_with("</table>"));
    }

    #[test]
    fn examples_cover_empty_and_partial_turns() {
        let examples = user_registration().prompt_examples();
        assert_eq!(examples.len(), 2);
        assert!(examples.iter().all(|e| e.before.len() == 4 && e.after.len() == 4));
        assert_eq!(examples[1].after[1], json!("Smith"));
    }
}
