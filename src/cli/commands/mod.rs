use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc::unbounded_channel;

use crate::{
    api::{error::ApiError, CivitaiClient},
    download::{error::DownloadError, DownloadTarget},
    error::CliError,
    progress::{FileEvent, ProgressListener, SharedProgressListener},
    progress_bars::IndicatifProgressHandler,
};

use super::{print_results, Context, ImagePages};

pub mod images;
pub mod orchestrator;
pub mod posts;
pub mod reactions;
pub mod report;
pub mod showcase;
pub mod user;
pub mod users;

/// Pagination failures of a download batch, labelled by the listing they stopped.
pub(crate) type Failures = Vec<(String, ApiError)>;

/// Feeds every image of `listings` to the download queue while the pages are still coming in.
///
/// A listing that fails to paginate keeps the images it already produced; the failure is
/// returned next to the number of files written so the caller decides whether it is fatal.
pub(crate) async fn download_listings(
    ctx: &Context,
    client: &CivitaiClient,
    listings: Vec<(String, ImagePages)>,
) -> Result<(u64, Failures), CliError> {
    let progress = Arc::new(IndicatifProgressHandler::new(0));
    let listener: SharedProgressListener = progress.clone();

    let (tx, rx) = unbounded_channel();
    let downloader = ctx
        .download_queue(client, Some(listener))
        .setup_async_downloader(rx);

    let mut failures = Vec::new();
    for (label, mut pages) in listings {
        debug!("Listing images of {label}");

        while let Some(item) = pages.next().await {
            progress.add_files(1);
            if tx.send(DownloadTarget::for_post_item(&item)).is_err() {
                break;
            }
        }

        if let Some(error) = pages.take_error() {
            warn!("Listing of {label} stopped early: {error}");
            progress.report(FileEvent::Failed, &label, &error.to_string());

            let cancelled = error.is_cancellation();
            failures.push((label, error));
            if cancelled {
                break;
            }
        }
    }
    drop(tx);

    let downloaded = downloader.await.map_err(DownloadError::from)??;
    print_results(downloaded);

    Ok((downloaded, failures))
}
