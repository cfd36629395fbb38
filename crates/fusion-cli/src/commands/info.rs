use anyhow::Result;
use clap::Args;

use crate::{
    args::{Cli, CliConfig},
    constants::*,
    output::{self, OutputLevel},
};

#[derive(Args)]
pub struct InfoArgs {
    // Info command has no arguments
}

impl InfoArgs {
    pub async fn run(
        &self,
        output_level: OutputLevel,
        cli_config: &CliConfig,
        cli: &Cli,
    ) -> Result<()> {
        let config_path = cli_config.config_base_path.join(CONFIG_FILE_NAME);
        let state = if config_path.exists() { "" } else { " (not found)" };
        output::note(
            &format!("config file: {}{state}", config_path.display()),
            output_level,
        );
        if let Some(agent) = &cli_config.config.default_agent {
            output::note(
                &format!("default agent: {}", output::format_id(agent)),
                output_level,
            );
        }

        output::heading("\nEnv Vars:", output_level);
        for var in ENV_VARS {
            output::note(&format!("{var} = {}", env_var_status(var)), output_level);
        }

        output::heading("\nClient:", output_level);
        match cli_config.client_config(cli) {
            Ok(config) => {
                output::note(&format!("base url: {}", config.api_base()), output_level);
                output::note(
                    &format!(
                        "timeout: {}s, retries: {}, cache: {} ({} entries, {}s ttl)",
                        config.timeout_seconds,
                        config.max_retries,
                        config.enable_cache,
                        config.cache_max_size,
                        config.cache_ttl_seconds
                    ),
                    output_level,
                );
                output::note(
                    &format!(
                        "rate limit: {} calls / {}s",
                        config.rate_limit_calls, config.rate_limit_window_seconds
                    ),
                    output_level,
                );
            }
            Err(e) => output::warning(&format!("{e}"), output_level),
        }

        output::heading("\nVersion info:", output_level);
        output::note(
            &format!("version: {}", env!("CARGO_PKG_VERSION")),
            output_level,
        );

        Ok(())
    }
}

fn env_var_status(var_name: &str) -> &'static str {
    if std::env::var(var_name).is_ok() {
        "Present"
    } else {
        "None"
    }
}
