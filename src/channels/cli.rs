//! CLI channel: stdin/stdout REPL for local testing.

use std::io::Write;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

const CLI_USER: &str = "local-user";

/// Reads one message per non-blank stdin line and prints replies to stdout.
#[derive(Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Next non-blank line; `None` on EOF or a read error.
async fn next_message<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<IncomingMessage> {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => return Some(IncomingMessage::new("cli", CLI_USER, line.trim())),
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(error = %e, "Error reading stdin");
                return None;
            }
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let lines = BufReader::new(tokio::io::stdin()).lines();
        let stream = stream::unfold(lines, |mut lines| async move {
            next_message(&mut lines).await.map(|msg| (msg, lines))
        });
        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\n{}\n", response.content).map_err(|e| ChannelError::SendFailed {
            name: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}
