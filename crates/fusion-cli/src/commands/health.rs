use anyhow::Result;
use clap::Args;
use std::time::Instant;

use crate::{
    args::{Cli, CliConfig},
    client,
    output::{self, OutputLevel},
};

#[derive(Args)]
pub struct HealthArgs {
    /// Print the raw response body
    #[arg(long)]
    pub json: bool,
}

impl HealthArgs {
    pub async fn run(
        &self,
        output_level: OutputLevel,
        cli_config: &CliConfig,
        cli: &Cli,
    ) -> Result<()> {
        let client = client::from_cli(cli, cli_config)?;

        let started = Instant::now();
        let body = client.health_check().await?;
        let elapsed = started.elapsed();

        if self.json {
            return crate::commands::print_json(&body);
        }

        let status = body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("ok");
        output::success(
            &format!(
                "{} is up ({status}, {}ms)",
                client.transport().base_url(),
                elapsed.as_millis()
            ),
            output_level,
        );
        Ok(())
    }
}
