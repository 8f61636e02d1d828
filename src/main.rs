use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use uuid::Uuid;

use cform::agent::{Agent, AgentDeps, TurnResult};
use cform::channels::{Channel, CliChannel, OutgoingResponse};
use cform::config::AppConfig;
use cform::form::FormManager;
use cform::form::builtin::default_registry;
use cform::llm::create_provider;
use cform::session::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...  (or CFORM_LLM_BACKEND=openai with OPENAI_API_KEY)");
            std::process::exit(1);
        }
    };

    let llm = create_provider(&config.llm)?;
    let registry = Arc::new(default_registry());

    eprintln!("📝 CForm v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm.model_name());
    eprintln!("   Forms: {}", registry.list().join(", "));
    eprintln!("   Confirm before submit: {}", config.forms.ask_confirm);
    eprintln!("   Type a message and press Enter. /help for commands, /quit to exit.\n");

    let forms = Arc::new(FormManager::new(Arc::clone(&llm), registry, config.forms.clone()));
    let sessions = Arc::new(SessionManager::new());

    // Drop sessions nobody has talked to in a while
    let pruner_sessions = Arc::clone(&sessions);
    let idle_timeout = config.sessions.idle_timeout;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(idle_timeout / 4);
        loop {
            interval.tick().await;
            pruner_sessions.prune_idle(idle_timeout).await;
        }
    });

    let agent = Agent::new(AgentDeps {
        llm,
        forms,
        sessions,
    });

    let channel = CliChannel::new();
    let mut messages = channel.start().await?;
    let mut session_ids: HashMap<String, Uuid> = HashMap::new();

    while let Some(msg) = messages.next().await {
        let session_id = *session_ids
            .entry(msg.user_id.clone())
            .or_insert_with(Uuid::new_v4);

        let reply = match agent.handle_message(session_id, &msg.content).await {
            Ok(TurnResult::Reply(text)) => text,
            Ok(TurnResult::Quit) => break,
            Err(e) => {
                tracing::error!(error = %e, session = %session_id, "Turn failed");
                "Sorry, something went wrong while answering. Please try again.".to_string()
            }
        };

        if let Err(e) = channel.respond(&msg, OutgoingResponse::text(reply)).await {
            tracing::error!(error = %e, channel = channel.name(), "Failed to send reply");
        }
    }

    eprintln!("Goodbye!");
    Ok(())
}
