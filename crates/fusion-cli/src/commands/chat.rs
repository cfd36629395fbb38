use anyhow::{Result, bail};
use clap::Args;
use fusion_core::{ChatApi, SendMessageRequest};
use std::io::{self, IsTerminal, Read};

use crate::{
    args::{Cli, CliConfig},
    client,
    commands::stream_reply,
    output::{self, OutputLevel},
    spinner::Spinner,
};

#[derive(Args)]
pub struct ChatArgs {
    /// Agent to talk to; defaults to `default_agent` from the config file
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Continue an existing chat instead of opening a new one
    #[arg(short, long)]
    pub chat_id: Option<String>,

    /// Folder for a new chat
    #[arg(long)]
    pub folder: Option<String>,

    /// Attach previously uploaded files by id
    #[arg(short, long = "file", value_name = "FILE_ID")]
    pub files: Vec<String>,

    /// The message; read from stdin when omitted
    #[arg(value_name = "MESSAGE")]
    pub message: Option<String>,
}

impl ChatArgs {
    pub async fn run(
        &self,
        output_level: OutputLevel,
        cli_config: &CliConfig,
        cli: &Cli,
    ) -> Result<()> {
        let message = match &self.message {
            Some(message) => message.clone(),
            None => read_stdin()?,
        };
        let request = self.request(message, cli_config.config.default_agent.as_deref())?;
        let client = client::from_cli(cli, cli_config)?;

        if cli.no_streaming {
            let spinner = Spinner::new("Waiting for reply", output_level);
            spinner.start();
            let response = client.send_message(&request).await?;
            spinner.stop();

            match response.agent_messages().last() {
                Some(reply) => println!("{}", reply.message),
                None => output::warning("(No response received)", output_level),
            }
            if request.chat_id.is_none() {
                output::note(
                    &format!("chat id: {}", output::format_id(&response.chat.id)),
                    output_level,
                );
            }
        } else {
            let api: &dyn ChatApi = &client;
            stream_reply(api, &request, output_level).await?;
        }

        Ok(())
    }

    fn request(&self, message: String, default_agent: Option<&str>) -> Result<SendMessageRequest> {
        // The agent only matters when a new chat is opened
        let agent = match (self.agent.as_deref(), &self.chat_id) {
            (Some(agent), _) => agent,
            (None, Some(_)) => default_agent.unwrap_or_default(),
            (None, None) => match default_agent {
                Some(agent) => agent,
                None => bail!("no agent given; pass --agent or set default_agent in the config file"),
            },
        };

        let mut builder = SendMessageRequest::builder(agent, message).files(self.files.clone());
        if let Some(chat_id) = &self.chat_id {
            builder = builder.chat_id(chat_id);
        }
        if let Some(folder) = &self.folder {
            builder = builder.folder(folder);
        }
        Ok(builder.build())
    }
}

fn read_stdin() -> Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("no message given; pass it as an argument or pipe it on stdin");
    }
    let mut message = String::new();
    stdin.read_to_string(&mut message)?;
    Ok(message.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(agent: Option<&str>, chat_id: Option<&str>) -> ChatArgs {
        ChatArgs {
            agent: agent.map(str::to_string),
            chat_id: chat_id.map(str::to_string),
            folder: Some("work".to_string()),
            files: vec!["f1".to_string()],
            message: None,
        }
    }

    #[test]
    fn test_explicit_agent_wins_over_default() {
        let request = args(Some("a1"), None)
            .request("hi".to_string(), Some("default"))
            .unwrap();
        assert_eq!(request.agent_id, "a1");
        assert_eq!(request.folder.as_deref(), Some("work"));
        assert_eq!(request.files, vec!["f1"]);
        assert!(request.chat_id.is_none());
    }

    #[test]
    fn test_default_agent_is_used() {
        let request = args(None, None)
            .request("hi".to_string(), Some("default"))
            .unwrap();
        assert_eq!(request.agent_id, "default");
    }

    #[test]
    fn test_new_chat_requires_an_agent() {
        let err = args(None, None).request("hi".to_string(), None).unwrap_err();
        assert!(err.to_string().contains("--agent"));
    }

    #[test]
    fn test_existing_chat_needs_no_agent() {
        let request = args(None, Some("c9")).request("hi".to_string(), None).unwrap();
        assert_eq!(request.chat_id.as_deref(), Some("c9"));
    }
}
