use clap::{Args, Subcommand};
use log::warn;

use crate::{
    cli::{Context, ImageSource},
    error::CliError,
};

use super::download_listings;

#[derive(Debug, Subcommand)]
pub enum Posts {
    /// Download every image of the given posts into `posts/<post id>/`
    Download(PostDownload),
}

impl Posts {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            Self::Download(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(Debug, Args)]
pub struct PostDownload {
    #[clap(value_parser, value_name = "POST IDs", required = true)]
    posts: Vec<u64>,

    #[clap(long, value_enum, default_value_t)]
    source: ImageSource,
}

impl PostDownload {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        let client = ctx.client()?;

        let mut listings = Vec::with_capacity(self.posts.len());
        for id in &self.posts {
            listings.push((format!("post {id}"), self.source.post_images(&client, *id)?));
        }

        let (_, failures) = download_listings(ctx, &client, listings).await?;

        // one broken post does not fail the batch, an interrupted batch does
        for (label, error) in failures {
            if error.is_cancellation() {
                return Err(error.into());
            }
            warn!("Skipped the rest of {label}: {error}");
        }

        Ok(())
    }
}
