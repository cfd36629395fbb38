use crate::args::{Cli, CliConfig};
use anyhow::{Context, Result};
use fusion_core::FusionClient;

/// Build a client from the layered configuration
pub fn from_cli(cli: &Cli, cli_config: &CliConfig) -> Result<FusionClient> {
    let config = cli_config.client_config(cli)?;
    tracing::debug!(
        base_url = config.api_base(),
        cache = config.enable_cache,
        retries = config.max_retries,
        "building Fusion client"
    );
    FusionClient::new(config).context("failed to create Fusion client")
}
