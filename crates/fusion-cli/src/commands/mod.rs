use anyhow::Result;
use clap::Subcommand;
use futures::StreamExt;
use fusion_core::{ChatApi, Message, MessageType, SendMessageRequest, buffered};
use std::io::{self, Write};

use crate::constants::STREAM_BUFFER_SIZE;
use crate::output::OutputLevel;
use crate::spinner::Spinner;

pub mod agents;
pub mod chat;
pub mod chats;
pub mod health;
pub mod info;
pub mod upload;

pub use agents::AgentsArgs;
pub use chat::ChatArgs;
pub use chats::ChatsArgs;
pub use health::HealthArgs;
pub use info::InfoArgs;
pub use upload::UploadArgs;

// Example strings for after_long_help
const AGENTS_EXAMPLES: &str = r#"EXAMPLES:
  fusion agents list                       # List agents
  fusion agents list --json                # Raw JSON output
  fusion agents show agent-123             # Show one agent
  fusion agents use agent-123              # Default agent for `fusion chat`"#;

const CHAT_EXAMPLES: &str = r#"EXAMPLES:
  fusion chat -a agent-123 "Hello"         # New chat, streamed reply
  fusion chat -c chat-456 "Tell me more"   # Continue a chat
  fusion chat -a agent-123 -f file-1 "Summarize the attachment"
  echo "Hello" | fusion chat -a agent-123  # Message from stdin"#;

const CHATS_EXAMPLES: &str = r#"EXAMPLES:
  fusion chats create agent-123            # Open an empty chat
  fusion chats show chat-456               # Show chat details
  fusion chats messages chat-456           # Print the conversation"#;

const UPLOAD_EXAMPLES: &str = r#"EXAMPLES:
  fusion upload notes.txt                  # Upload a file
  fusion upload report.pdf -c chat-456     # Attach it to a chat"#;

const INFO_EXAMPLES: &str = r#"EXAMPLES:
  fusion info                              # Show config path and env var status"#;

#[derive(Subcommand)]
pub enum Commands {
    /// List or inspect agents
    #[command(after_long_help = AGENTS_EXAMPLES)]
    Agents(AgentsArgs),
    /// Send a message to an agent
    #[command(after_long_help = CHAT_EXAMPLES)]
    Chat(ChatArgs),
    /// Create or inspect chats
    #[command(after_long_help = CHATS_EXAMPLES)]
    Chats(ChatsArgs),
    /// Upload a file
    #[command(after_long_help = UPLOAD_EXAMPLES)]
    Upload(UploadArgs),
    /// Check that the service is reachable
    Health(HealthArgs),
    /// Show configuration and environment information
    #[command(after_long_help = INFO_EXAMPLES)]
    Info(InfoArgs),
}

/// Send `request` and print the reply to stdout as it arrives.
///
/// Tokens are read ahead into a bounded buffer while the terminal catches up.
/// Returns the number of tokens printed.
pub async fn stream_reply(
    api: &dyn ChatApi,
    request: &SendMessageRequest,
    output_level: OutputLevel,
) -> Result<usize> {
    let spinner = Spinner::new("Waiting for reply", output_level);
    spinner.start();

    let reply = api.stream_message(request).await?;
    let mut stream = Box::pin(buffered(reply, STREAM_BUFFER_SIZE));
    let mut stdout = io::stdout();
    let mut tokens = 0;

    while let Some(token) = stream.next().await {
        let token = token?;
        if tokens == 0 {
            spinner.stop();
        }
        tokens += 1;
        write!(stdout, "{token}")?;
        stdout.flush()?;
    }
    spinner.stop();

    if tokens == 0 {
        crate::output::warning("(No response received)", output_level);
    } else {
        writeln!(stdout)?;
    }
    Ok(tokens)
}

/// Render one message of a conversation
pub fn format_message(message: &Message) -> String {
    let speaker = match message.message_type {
        MessageType::User => "you",
        MessageType::Agent => "agent",
    };
    let mut line = format!(
        "[{}] {speaker}: {}",
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.message
    );
    if !message.files.is_empty() {
        line.push_str(&format!(" (files: {})", message.files.join(", ")));
    }
    line
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use fusion_core::{Agent, ChatResponse, FusionError, TokenStream};
    use std::sync::Mutex;

    struct CannedApi {
        tokens: Vec<Result<String, FusionError>>,
        seen: Mutex<Vec<String>>,
    }

    impl CannedApi {
        fn new(tokens: Vec<Result<String, FusionError>>) -> Self {
            Self {
                tokens,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatApi for CannedApi {
        async fn send_message(
            &self,
            _request: &SendMessageRequest,
        ) -> Result<ChatResponse, FusionError> {
            Err(FusionError::validation("unused"))
        }

        async fn stream_message(
            &self,
            request: &SendMessageRequest,
        ) -> Result<TokenStream, FusionError> {
            self.seen.lock().unwrap().push(request.message.clone());
            let tokens: Vec<_> = self
                .tokens
                .iter()
                .map(|t| match t {
                    Ok(s) => Ok(s.clone()),
                    Err(e) => Err(FusionError::network(e.to_string())),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(tokens)))
        }

        async fn list_agents(&self) -> Result<Vec<Agent>, FusionError> {
            Ok(Vec::new())
        }

        async fn get_agent(&self, agent_id: &str) -> Result<Agent, FusionError> {
            Err(FusionError::not_found(fusion_core::Resource::Agent, agent_id))
        }
    }

    #[tokio::test]
    async fn test_stream_reply_counts_tokens() {
        let api = CannedApi::new(vec![Ok("Hi".to_string()), Ok(" there".to_string())]);
        let request = SendMessageRequest::new("a1", "hello");

        let printed = stream_reply(&api, &request, OutputLevel::Quiet).await.unwrap();
        assert_eq!(printed, 2);
        assert_eq!(*api.seen.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_reply_surfaces_stream_errors() {
        let api = CannedApi::new(vec![
            Ok("partial".to_string()),
            Err(FusionError::network("reset")),
        ]);
        let request = SendMessageRequest::new("a1", "hello");

        let err = stream_reply(&api, &request, OutputLevel::Quiet)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FusionError>(),
            Some(FusionError::Network { .. })
        ));
    }

    #[test]
    fn test_format_message() {
        let message = Message {
            id: "m1".to_string(),
            chat_id: "c1".to_string(),
            message: "Hello".to_string(),
            message_type: MessageType::Agent,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            files: vec!["f1".to_string(), "f2".to_string()],
        };
        assert_eq!(
            format_message(&message),
            "[2024-03-01 09:30] agent: Hello (files: f1, f2)"
        );
    }
}
