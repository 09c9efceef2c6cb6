use clap::{Args, Subcommand};
use owo_colors::OwoColorize;

use crate::{
    cli::{Context, ImageSource},
    error::CliError,
};

use super::download_listings;

#[derive(Debug, Subcommand)]
pub enum Users {
    /// Download every image of a user into `posts/<post id>/`
    Download(UserDownload),
    /// List the users you follow
    Following,
}

impl Users {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            Self::Download(cmd) => cmd.run(ctx).await,
            Self::Following => {
                let users = ctx.client()?.users_following().await?;
                for user in &users {
                    println!("{:>10} {}", user.id.bright_black(), user.username.bold());
                }
                println!("{} {}", users.len().to_string().bold().blue(), "users".bold());
                Ok(())
            }
        }
    }
}

#[derive(Debug, Args)]
pub struct UserDownload {
    #[clap(value_parser, value_name = "USERNAME")]
    username: String,

    /// Numeric id of the user
    #[clap(value_parser, value_name = "ID")]
    id: Option<u64>,

    #[clap(long, value_enum, default_value_t)]
    source: ImageSource,
}

impl UserDownload {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        let client = ctx.client()?;
        let pages = self.source.user_images(&client, &self.username, self.id)?;

        let (_, failures) = download_listings(ctx, &client, vec![(self.username, pages)]).await?;

        match failures.into_iter().next() {
            Some((_, error)) => Err(error.into()),
            None => Ok(()),
        }
    }
}
