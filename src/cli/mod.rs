use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand, ValueEnum};
use log::debug;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::{
    api::{cookies::CookieFile, error::ApiError, CivitaiClient, RestImages, TrpcImages},
    config::{Overrides, Settings},
    download::{DownloadQueue, MAX_SIMULTANEOUS_DOWNLOADS},
    error::CliError,
    item::Item,
    pagination::Collected,
    progress::SharedProgressListener,
    report::published,
};

use self::commands::{
    images::Images,
    orchestrator::Orchestrator,
    posts::Posts,
    reactions::Reactions,
    report::{Csv, Report},
    showcase::Showcase,
    user::User,
    users::Users,
};

pub mod commands;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch image metadata
    #[clap(subcommand)]
    Images(Images),
    /// Download the images of users, or list who you follow
    #[clap(subcommand)]
    Users(Users),
    /// Inspect a single user
    #[clap(subcommand)]
    User(User),
    /// Download every image of one or more posts
    #[clap(subcommand)]
    Posts(Posts),
    /// Download the images made with the on-site generator
    #[clap(subcommand)]
    Orchestrator(Orchestrator),
    /// Render an HTML report from an `images metadata` file
    Report(Report),
    /// Render a CSV from an `images metadata` file
    Csv(Csv),
    /// Periodically record image reactions, model generations and the compensation pool
    Reactions(Reactions),
    /// Manage the images pinned to your profile
    #[clap(subcommand)]
    Showcase(Showcase),
}

#[derive(Parser, Debug)]
#[clap(name = "Civitai Downloader", author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub mode: Commands,

    /// Civitai API key
    #[clap(long, env = "CIVITAI_API_KEY", hide_env_values = true, global = true, help_heading = "GENERAL")]
    pub api_key: Option<String>,

    /// File holding the session cookies
    ///
    /// [default: cookies.json in the config directory]
    #[clap(long, value_name = "PATH", global = true, help_heading = "GENERAL")]
    pub cookies: Option<PathBuf>,

    /// Where to save files (If the path doesn't exist, it will be created.)
    #[clap(short = 'o', value_name = "PATH", help_heading = "SAVE", global = true)]
    pub output: Option<PathBuf>,

    /// Number of simultaneous downloads
    ///
    /// [max: 10] [default: 1]
    #[clap(
        short = 'd',
        value_name = "NUMBER",
        value_parser(clap::value_parser!(u8).range(1..=MAX_SIMULTANEOUS_DOWNLOADS as i64)),
        help_heading = "DOWNLOAD",
        global = true,
    )]
    pub simultaneous_downloads: Option<u8>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            cookies: self.cookies.clone(),
            output: self.output.clone(),
            simultaneous_downloads: self.simultaneous_downloads,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), CliError> {
        let ctx = Context {
            settings: Settings::load(self.overrides())?,
            cancel,
        };
        debug!("Resolved settings: output {}", ctx.settings.output_dir.display());

        match self.mode {
            Commands::Images(cmd) => cmd.run(&ctx).await,
            Commands::Users(cmd) => cmd.run(&ctx).await,
            Commands::User(cmd) => cmd.run(&ctx).await,
            Commands::Posts(cmd) => cmd.run(&ctx).await,
            Commands::Orchestrator(cmd) => cmd.run(&ctx).await,
            Commands::Report(cmd) => cmd.run(),
            Commands::Csv(cmd) => cmd.run(),
            Commands::Reactions(cmd) => cmd.run(&ctx).await,
            Commands::Showcase(cmd) => cmd.run(&ctx).await,
        }
    }
}

/// Which API to list images through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ImageSource {
    /// Website API, paged with cursors
    #[default]
    Trpc,
    /// Public REST API, paged with next-page URLs
    Rest,
}

impl ImageSource {
    /// Images of a user. The tRPC API narrows the listing down to `user_id` when it is known.
    pub fn user_images(
        self,
        client: &CivitaiClient,
        username: &str,
        user_id: Option<u64>,
    ) -> Result<ImagePages, CliError> {
        Ok(match (self, user_id) {
            (Self::Rest, _) => ImagePages::Rest(client.rest_images_for_user(username)?),
            (Self::Trpc, Some(id)) => ImagePages::Trpc(client.images_for_user(username, id)),
            (Self::Trpc, None) => ImagePages::Trpc(client.images_for_username(username)),
        })
    }

    pub fn post_images(self, client: &CivitaiClient, post_id: u64) -> Result<ImagePages, CliError> {
        Ok(match self {
            Self::Rest => ImagePages::Rest(client.rest_images_for_post(post_id)?),
            Self::Trpc => ImagePages::Trpc(client.images_for_post(post_id)),
        })
    }
}

/// Either kind of image paginator.
pub enum ImagePages {
    Rest(RestImages),
    Trpc(TrpcImages),
}

impl ImagePages {
    pub async fn next(&mut self) -> Option<Item> {
        match self {
            Self::Rest(pages) => pages.next().await,
            Self::Trpc(pages) => pages.next().await,
        }
    }

    pub fn take_error(&mut self) -> Option<ApiError> {
        match self {
            Self::Rest(pages) => pages.take_error(),
            Self::Trpc(pages) => pages.take_error(),
        }
    }

    pub async fn collect(self) -> Collected<Item> {
        match self {
            Self::Rest(pages) => pages.collect().await,
            Self::Trpc(pages) => pages.collect().await,
        }
    }
}

/// Resolved settings plus the process-wide cancellation token.
pub struct Context {
    pub settings: Settings,
    pub cancel: CancellationToken,
}

impl Context {
    /// Authenticated client. Fails before any request when no API key is configured.
    pub fn client(&self) -> Result<CivitaiClient, CliError> {
        let api_key = self.settings.api_key()?;
        let cookies = CookieFile::load(&self.settings.cookies)?;

        Ok(CivitaiClient::new(api_key, Some(Arc::new(cookies)))?
            .with_cancellation(self.cancel.clone()))
    }

    pub fn download_queue(
        &self,
        client: &CivitaiClient,
        progress: Option<SharedProgressListener>,
    ) -> DownloadQueue {
        DownloadQueue::new(
            client.http().clone(),
            &self.settings.output_dir,
            self.settings.simultaneous_downloads,
            progress,
        )
    }
}

/// Reads an `images metadata` file and keeps the published images.
pub fn read_items(path: &Path) -> Result<Vec<Item>, CliError> {
    let raw = fs::read(path)?;
    let items: Vec<Item> = serde_json::from_slice(&raw)?;
    let total = items.len();

    let items = published(items);
    debug!("{} of {total} images in {} are published", items.len(), path.display());

    if items.is_empty() {
        return Err(CliError::NoItems);
    }
    Ok(items)
}

/// Writes `contents` to `out`, or to stdout when no file is given.
pub fn write_output(out: Option<&Path>, contents: &str) -> Result<(), CliError> {
    match out {
        Some(path) => fs::write(path, contents)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub fn print_results(total_down: u64) {
    println!(
        "{} {} {}",
        total_down.to_string().bold().blue(),
        "files".bold().blue(),
        "downloaded".bold()
    );
}
