// Binary entry point for fusion-cli

mod args;
mod client;
mod commands;
mod config;
mod constants;
mod output;
mod spinner;

use anyhow::Result;
use args::{Cli, CliConfig};
use clap::Parser;
use commands::Commands;
use output::OutputLevel;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        report(&err);
        std::process::exit(1);
    }
}

/// Parse CLI arguments, load configuration and dispatch to the requested
/// sub-command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let output_level = OutputLevel::from_flags(cli.quiet, cli.verbose);
    output::init_logging(output_level);

    let cli_config = CliConfig::load()?;

    match &cli.command {
        Commands::Agents(args) => args.run(output_level, &cli_config, &cli).await?,
        Commands::Chat(args) => args.run(output_level, &cli_config, &cli).await?,
        Commands::Chats(args) => args.run(output_level, &cli_config, &cli).await?,
        Commands::Upload(args) => args.run(output_level, &cli_config, &cli).await?,
        Commands::Health(args) => args.run(output_level, &cli_config, &cli).await?,
        Commands::Info(args) => args.run(output_level, &cli_config, &cli).await?,
    }

    Ok(())
}

/// Print an error with a hint for the failures users can fix themselves
fn report(err: &anyhow::Error) {
    use fusion_core::FusionError;

    match err.downcast_ref::<FusionError>() {
        Some(FusionError::Configuration { message }) if message.contains("FUSION_API_KEY") => {
            output::error_with_suggestion(
                message,
                &format!(
                    "set FUSION_API_KEY or add api_key to the config file (see {})",
                    output::format_command("fusion info")
                ),
            )
        }
        Some(FusionError::Authentication { message }) => output::error_with_suggestion(
            message,
            "check that your API key is valid",
        ),
        Some(FusionError::RateLimit {
            message,
            retry_after: Some(wait),
        }) => output::error_with_suggestion(
            message,
            &format!("try again in {}s", wait.as_secs()),
        ),
        Some(FusionError::ServiceUnavailable { .. }) => output::error_with_suggestion(
            &err.to_string(),
            &format!("check {}", output::format_command("fusion health")),
        ),
        _ => output::error(&format!("{err:#}")),
    }
}
