use anyhow::Result;
use clap::{Args, Subcommand};
use fusion_core::ChatResponse;

use crate::{
    args::{Cli, CliConfig},
    client,
    commands::{format_message, print_json},
    output::{self, OutputLevel},
};

#[derive(Args)]
pub struct ChatsArgs {
    #[command(subcommand)]
    pub action: ChatsAction,
}

#[derive(Subcommand)]
pub enum ChatsAction {
    /// Open a chat with an agent
    Create {
        agent_id: String,
        /// First message of the chat
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long)]
        folder: Option<String>,
    },
    /// Show a chat
    Show {
        chat_id: String,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the messages of a chat, oldest first
    Messages {
        chat_id: String,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}

impl ChatsArgs {
    pub async fn run(
        &self,
        output_level: OutputLevel,
        cli_config: &CliConfig,
        cli: &Cli,
    ) -> Result<()> {
        let client = client::from_cli(cli, cli_config)?;

        match &self.action {
            ChatsAction::Create {
                agent_id,
                message,
                folder,
            } => {
                let response = client
                    .create_chat(agent_id, message.as_deref(), folder.as_deref())
                    .await?;
                output::success(
                    &format!("Created chat {}", output::format_id(&response.chat.id)),
                    output_level,
                );
                print_conversation(&response);
            }
            ChatsAction::Show { chat_id, json } => {
                let response = client.get_chat(chat_id).await?;
                if *json {
                    return print_json(&response);
                }
                let chat = &response.chat;
                output::heading(&chat.display_title(), output_level);
                println!("id: {}", chat.id);
                println!("agent: {}", output::format_agent(&chat.agent.name));
                if let Some(folder) = &chat.folder {
                    println!("folder: {folder}");
                }
                println!("updated: {}", chat.updated_at.format("%Y-%m-%d %H:%M"));
                print_conversation(&response);
            }
            ChatsAction::Messages { chat_id, json } => {
                let messages = client.list_messages(chat_id).await?;
                if *json {
                    return print_json(&messages);
                }
                if messages.is_empty() {
                    output::note("No messages yet", output_level);
                }
                for message in &messages {
                    println!("{}", format_message(message));
                }
            }
        }

        Ok(())
    }
}

fn print_conversation(response: &ChatResponse) {
    for message in &response.messages {
        println!("{}", format_message(message));
    }
}
