use std::path::PathBuf;

use clap::{Args, Subcommand};
use log::{info, warn};

use crate::{
    cli::{write_output, Context, ImageSource},
    error::CliError,
};

#[derive(Debug, Subcommand)]
pub enum Images {
    /// Write the metadata of every image of a user as JSON
    ///
    /// The output is the input of the `report`, `csv` and `showcase leaderboard` commands.
    Metadata(Metadata),
}

impl Images {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            Self::Metadata(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(Debug, Args)]
pub struct Metadata {
    #[clap(value_parser, value_name = "USERNAME")]
    username: String,

    /// Numeric id of the user
    #[clap(value_parser, value_name = "ID")]
    id: Option<u64>,

    #[clap(long, value_enum, default_value_t)]
    source: ImageSource,

    /// Write to a file instead of stdout
    #[clap(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

impl Metadata {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        let client = ctx.client()?;
        let collected = self
            .source
            .user_images(&client, &self.username, self.id)?
            .collect()
            .await;

        info!("Fetched {} images of {}", collected.items.len(), self.username);
        write_output(self.out.as_deref(), &serde_json::to_string(&collected.items)?)?;

        if let Some(error) = collected.error {
            warn!(
                "Listing stopped early, the {} images fetched before the failure were written",
                collected.items.len()
            );
            return Err(error.into());
        }

        Ok(())
    }
}
