use std::sync::Arc;

use clap::Subcommand;
use log::debug;
use tokio::sync::mpsc::unbounded_channel;

use crate::{
    cli::{print_results, Context},
    download::{error::DownloadError, DownloadTarget},
    error::CliError,
    progress::{ProgressListener, SharedProgressListener},
    progress_bars::IndicatifProgressHandler,
};

#[derive(Debug, Subcommand)]
pub enum Orchestrator {
    /// Download every generated image into `generated/<yyyy>/<mm>/<dd>/`
    Download,
}

impl Orchestrator {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            Self::Download => download_generated(ctx).await,
        }
    }
}

async fn download_generated(ctx: &Context) -> Result<(), CliError> {
    let client = ctx.client()?;
    let progress = Arc::new(IndicatifProgressHandler::new(0));
    let listener: SharedProgressListener = progress.clone();

    let (tx, rx) = unbounded_channel();
    let downloader = ctx
        .download_queue(&client, Some(listener))
        .setup_async_downloader(rx);

    let mut jobs = client.generated_images();
    while let Some(job) = jobs.next().await {
        for image in job.images() {
            let Some(target) = DownloadTarget::for_generated_image(image, job.created_at) else {
                debug!("Generated image {} of job {} is not ready, skipping", image.id, job.id);
                continue;
            };

            progress.add_files(1);
            if tx.send(target).is_err() {
                break;
            }
        }
    }
    drop(tx);

    let downloaded = downloader.await.map_err(DownloadError::from)??;
    print_results(downloaded);

    match jobs.take_error() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
