use anyhow::Result;
use clap::Parser;
use etcetera::BaseStrategy;
use fusion_core::FusionConfig;
use std::path::PathBuf;

use crate::commands::Commands;
use crate::config::Config;
use crate::constants::BINARY_NAME;

// Example strings for after_long_help
const CLI_EXAMPLES: &str = r#"EXAMPLES:
  fusion agents list                              # List available agents
  fusion agents show agent-123                    # Show one agent
  fusion chat -a agent-123 "Summarize this"       # Start a chat, streaming the reply
  fusion chat -c chat-456 "And in French?"        # Continue an existing chat
  fusion --no-streaming chat "Hello"              # Wait for the full reply
  fusion chats messages chat-456                  # Show a chat's history
  fusion upload report.pdf -c chat-456            # Upload a file into a chat
  fusion health                                   # Check the service"#;

pub struct CliConfig {
    pub config_base_path: PathBuf,
    pub config: Config,
}

impl CliConfig {
    pub fn load() -> Result<Self> {
        let strategy = etcetera::choose_base_strategy()
            .map_err(|_| anyhow::anyhow!("could not locate the home directory"))?;
        let config_base_path = strategy.config_dir().join(BINARY_NAME);
        let config = Config::load(&config_base_path)?;

        Ok(Self {
            config_base_path,
            config,
        })
    }

    /// Client settings: config file, then `FUSION_*` variables, then flags
    pub fn client_config(&self, cli: &Cli) -> Result<FusionConfig> {
        let mut config = self.config.client_config(|var| std::env::var(var).ok())?;
        cli.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(about = "A CLI tool for chatting with Fusion agents")]
#[command(name = BINARY_NAME)]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL (overrides FUSION_BASE_URL and the config file)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Attempts per request, including the first
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Always hit the network instead of the response cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Quiet output (only show errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable streaming output (stream tokens by default)
    #[arg(long, global = true)]
    pub no_streaming: bool,
}

impl Cli {
    fn apply(&self, config: &mut FusionConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if self.no_cache {
            config.enable_cache = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fusion",
            "chat",
            "-a",
            "agent-1",
            "hello",
            "--no-cache",
            "--timeout",
            "5",
            "--no-streaming",
        ])
        .unwrap();

        assert!(cli.no_cache);
        assert!(cli.no_streaming);
        assert_eq!(cli.timeout, Some(5.0));
    }

    #[test]
    fn test_flags_override_client_config() {
        let cli = Cli::try_parse_from([
            "fusion",
            "--base-url",
            "http://localhost:9000",
            "--retries",
            "1",
            "--no-cache",
            "health",
        ])
        .unwrap();

        let mut config = FusionConfig::new("key");
        cli.apply(&mut config);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.max_retries, 1);
        assert!(!config.enable_cache);
    }

    #[test]
    fn test_unset_flags_leave_config_alone() {
        let cli = Cli::try_parse_from(["fusion", "health"]).unwrap();
        let mut config = FusionConfig::new("key").with_timeout(9.0);
        cli.apply(&mut config);
        assert_eq!(config.timeout_seconds, 9.0);
        assert!(config.enable_cache);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["fusion"]).is_err());
    }
}
