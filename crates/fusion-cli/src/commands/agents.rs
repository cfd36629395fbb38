use anyhow::Result;
use clap::{Args, Subcommand};
use fusion_core::{Agent, ChatApi};

use crate::{
    args::{Cli, CliConfig},
    client,
    output::{self, OutputLevel},
};

#[derive(Args)]
pub struct AgentsArgs {
    #[command(subcommand)]
    pub action: AgentsAction,
}

#[derive(Subcommand)]
pub enum AgentsAction {
    /// List available agents
    List {
        /// Include inactive agents
        #[arg(long)]
        all: bool,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single agent
    Show {
        agent_id: String,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Make an agent the default for `chat`
    Use { agent_id: String },
}

impl AgentsArgs {
    pub async fn run(
        &self,
        output_level: OutputLevel,
        cli_config: &CliConfig,
        cli: &Cli,
    ) -> Result<()> {
        let client = client::from_cli(cli, cli_config)?;

        match &self.action {
            AgentsAction::List { all, json } => {
                let agents: Vec<Agent> = client
                    .list_agents()
                    .await?
                    .into_iter()
                    .filter(|agent| *all || agent.is_active())
                    .collect();

                if *json {
                    return crate::commands::print_json(&agents);
                }
                if agents.is_empty() {
                    output::note("No agents available", output_level);
                    return Ok(());
                }
                for agent in &agents {
                    println!("{}", agent_line(agent));
                }
            }
            AgentsAction::Show { agent_id, json } => {
                let agent = client.get_agent(agent_id).await?;
                if *json {
                    return crate::commands::print_json(&agent);
                }
                output::heading(&agent.to_string(), output_level);
                println!("id: {}", agent.id);
                if !agent.description.is_empty() {
                    println!("description: {}", agent.description);
                }
                if agent.system_agent {
                    println!("system agent: yes");
                }
            }
            AgentsAction::Use { agent_id } => {
                let agent = client.get_agent(agent_id).await?;
                let mut config = cli_config.config.clone();
                config.default_agent = Some(agent.id.clone());
                config.save(&cli_config.config_base_path)?;
                output::success(
                    &format!(
                        "Default agent set to {} ({})",
                        output::format_agent(&agent.name),
                        output::format_id(&agent.id)
                    ),
                    output_level,
                );
            }
        }

        Ok(())
    }
}

fn agent_line(agent: &Agent) -> String {
    let mut line = format!(
        "{}  {}",
        output::format_id(&agent.id),
        output::format_agent(&agent.name)
    );
    if !agent.is_active() {
        line.push_str(" (inactive)");
    }
    if !agent.description.is_empty() {
        line.push_str(&format!(" - {}", agent.description));
    }
    line
}
