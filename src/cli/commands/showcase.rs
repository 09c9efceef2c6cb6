use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;

use crate::{
    cli::{read_items, Context},
    error::CliError,
    ranking::{
        leaderboard::{LeaderboardConfig, SHOWCASE_LEADERBOARD_SIZE},
        Ranking, ScoringRule,
    },
};

#[derive(Debug, Subcommand)]
pub enum Showcase {
    /// Pin images to your profile showcase
    Add(Add),
    /// Pin your current leaderboard to the showcase
    Leaderboard(Leaderboard),
}

impl Showcase {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            Self::Add(cmd) => cmd.run(ctx).await,
            Self::Leaderboard(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(Debug, Args)]
pub struct Add {
    #[clap(value_parser, value_name = "IMAGE IDs", required = true)]
    images: Vec<u64>,
}

impl Add {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        let client = ctx.client()?;

        for id in self.images {
            client.add_image_to_showcase(id).await?;
            println!("{} {}", "Added to showcase:".bold().green(), id);
        }

        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct Leaderboard {
    /// JSON file written by `images metadata`
    #[clap(value_parser, value_name = "INPUT")]
    input: PathBuf,

    /// Number of leaderboard images to pin
    #[clap(long, value_name = "NUMBER", default_value_t = SHOWCASE_LEADERBOARD_SIZE)]
    limit: usize,

    /// Print what would be pinned without touching the profile
    #[clap(long)]
    dry_run: bool,
}

impl Leaderboard {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        let items = read_items(&self.input)?;
        let ranking = Ranking::new(&items, ScoringRule::default());
        let config = LeaderboardConfig::showcase().with_size(self.limit);
        let leaderboard = ranking.leaderboard(Utc::now(), &config);

        if leaderboard.is_empty() {
            return Err(CliError::NoItems);
        }

        // The showcase keeps the most recently added images first and ignores images that are
        // already in it, so the top of the leaderboard goes in last.
        if self.dry_run {
            for entry in leaderboard.entries.iter().rev() {
                println!(
                    "{} {} ({} {:.2})",
                    "Would add:".bold().blue(),
                    entry.item.id,
                    "adjusted score".bright_black(),
                    entry.adjusted_score
                );
            }
            return Ok(());
        }

        let client = ctx.client()?;
        for entry in leaderboard.entries.iter().rev() {
            client.add_image_to_showcase(entry.item.id).await?;
            println!("{} {}", "Added to showcase:".bold().green(), entry.item.id);
        }

        Ok(())
    }
}
