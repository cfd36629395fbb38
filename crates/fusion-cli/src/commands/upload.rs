use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::{
    args::{Cli, CliConfig},
    client,
    output::{self, OutputLevel},
};

#[derive(Args)]
pub struct UploadArgs {
    /// File to upload
    pub path: PathBuf,

    /// Attach the file to this chat
    #[arg(short, long)]
    pub chat_id: Option<String>,
}

impl UploadArgs {
    pub async fn run(
        &self,
        output_level: OutputLevel,
        cli_config: &CliConfig,
        cli: &Cli,
    ) -> Result<()> {
        let client = client::from_cli(cli, cli_config)?;
        let uploaded = client
            .upload_file(&self.path, self.chat_id.as_deref())
            .await?;

        output::success(&format!("Uploaded {uploaded}"), output_level);
        println!("{}", uploaded.file_id);
        if let Some(url) = &uploaded.download_url {
            output::note(&format!("download: {url}"), output_level);
        }
        Ok(())
    }
}
