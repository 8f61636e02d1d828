//! Host turn loop: slash intents, form routing, and the plain chat fallback.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use cform::agent::{Agent, AgentDeps, TurnResult};
use cform::config::FormConfig;
use cform::error::{Error, FormError};
use cform::form::FormManager;
use cform::form::builtin::default_registry;
use cform::form::builtin::user_registration::USER_REGISTRATION;
use cform::session::SessionManager;

use common::{PromptKind, SUMMARY_REPLY, ScriptedLlm};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn agent() -> (Arc<ScriptedLlm>, Agent) {
    let llm = Arc::new(ScriptedLlm::new());
    let forms = Arc::new(FormManager::new(
        llm.clone(),
        Arc::new(default_registry()),
        FormConfig::default(),
    ));
    let agent = Agent::new(AgentDeps {
        llm: llm.clone(),
        forms,
        sessions: Arc::new(SessionManager::new()),
    });
    (llm, agent)
}

async fn say(agent: &Agent, session: Uuid, text: &str) -> String {
    match timeout(TEST_TIMEOUT, agent.handle_message(session, text))
        .await
        .expect("turn timed out")
        .unwrap()
    {
        TurnResult::Reply(reply) => reply,
        TurnResult::Quit => panic!("unexpected quit"),
    }
}

#[tokio::test]
async fn registration_from_intent_to_action() {
    let (llm, agent) = agent();
    let session = Uuid::new_v4();

    let reply = say(&agent, session, "/register").await;
    assert_eq!(reply, r#"ASK ["name", "surname", "company", "email"]"#);

    llm.push_extraction(
        r#"{"name": "John", "surname": "Smith", "company": "Acme", "email": "john@acme.com"}"#,
    );
    let reply = say(&agent, session, "John Smith from Acme, john@acme.com").await;
    assert_eq!(reply, SUMMARY_REPLY);

    llm.push_confirmation("YES");
    let reply = say(&agent, session, "yes").await;
    assert!(reply.contains("<td>Name</td><td>John</td>"));

    let handle = agent.sessions().get(session).await.unwrap();
    let guard = handle.lock().await;
    assert!(!guard.contains(USER_REGISTRATION));
    assert_eq!(guard.history().len(), 6);
}

#[tokio::test]
async fn language_is_detected_from_the_first_message_after_the_intent() {
    let (llm, agent) = agent();
    let session = Uuid::new_v4();

    say(&agent, session, "/register").await;
    assert_eq!(llm.count(PromptKind::Language), 0);

    say(&agent, session, "Ciao, mi chiamo Mario").await;
    let prompt = llm.last_prompt(PromptKind::Language).unwrap();
    assert!(prompt.contains("Message: Ciao, mi chiamo Mario"));
    assert!(!prompt.contains("/register"));
}

#[tokio::test]
async fn plain_chat_without_a_form() {
    let (llm, agent) = agent();
    let session = Uuid::new_v4();

    let reply = say(&agent, session, "hello there").await;

    assert_eq!(reply, "CHAT: hello there");
    assert_eq!(llm.count(PromptKind::Extraction), 0);
}

#[tokio::test]
async fn tool_turn_passes_through_with_reminder() {
    let (_llm, agent) = agent();
    let session = Uuid::new_v4();
    say(&agent, session, "/register").await;

    let reply = say(&agent, session, "/time").await;

    assert!(reply.starts_with("CHAT: /time\n\n(Tool time returned:"));
    assert!(reply.contains("Reminder for the assistant"));
    assert!(reply.contains("name, surname, company, email"));

    // The next tool turn goes back to the form
    let reply = say(&agent, session, "/time").await;
    assert!(reply.starts_with("ASK"));
}

#[tokio::test]
async fn stop_intent_cancels_the_active_form() {
    let (_llm, agent) = agent();
    let session = Uuid::new_v4();
    say(&agent, session, "/register").await;

    assert_eq!(
        say(&agent, session, "/stop").await,
        "Okay, I've cancelled the UserRegistration form."
    );
    assert_eq!(say(&agent, session, "/stop").await, "There is no form in progress.");
    assert_eq!(say(&agent, session, "hi").await, "CHAT: hi");
}

#[tokio::test]
async fn unknown_form_is_reported_to_the_user() {
    let (_llm, agent) = agent();
    let reply = say(&agent, Uuid::new_v4(), "/form start Nope").await;
    assert_eq!(
        reply,
        "I don't know a form called 'Nope'. Available forms: UserRegistration"
    );
}

#[tokio::test]
async fn llm_failure_surfaces_as_error() {
    let (llm, agent) = agent();
    let session = Uuid::new_v4();
    say(&agent, session, "/register").await;

    llm.go_offline();
    let err = agent.handle_message(session, "I'm John").await.unwrap_err();
    assert!(matches!(err, Error::Form(FormError::Llm(_))));

    let handle = agent.sessions().get(session).await.unwrap();
    assert!(handle.lock().await.contains(USER_REGISTRATION));
}

#[tokio::test]
async fn quit_ends_the_loop() {
    let (_llm, agent) = agent();
    let result = agent.handle_message(Uuid::new_v4(), "/quit").await.unwrap();
    assert_eq!(result, TurnResult::Quit);
}
