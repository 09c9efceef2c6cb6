//! Asynchronous download queue for image files.
//!
//! The [`DownloadQueue`] receives [`DownloadTarget`]s over a channel while the paginator that
//! produces them is still running, downloads up to `sim_downloads` of them at once and saves each
//! one under the output directory. A file that fails to download is logged and skipped; it never
//! stops the batch.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use futures::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use tokio::{
    fs::{create_dir_all, rename, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    task::{self, JoinHandle},
};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    api::models::GeneratedImage,
    item::Item,
    progress::{silent, FileEvent, SharedProgressListener},
};

use self::error::DownloadError;

pub mod error;

/// Highest accepted number of simultaneous downloads.
pub const MAX_SIMULTANEOUS_DOWNLOADS: u8 = 10;

/// Extension given to generated images whose id does not carry one.
const DEFAULT_EXTENSION: &str = "jpeg";

/// One file to fetch and where to put it, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub id: String,
    pub url: String,
    pub path: PathBuf,
}

impl DownloadTarget {
    /// `posts/{post id}/{file name}`
    pub fn for_post_item(item: &Item) -> Self {
        Self {
            id: item.id.to_string(),
            url: item.image_url(),
            path: Path::new("posts")
                .join(item.post_id.to_string())
                .join(item.file_name()),
        }
    }

    /// `generated/{yyyy}/{mm}/{dd}/{id}`, dated by completion.
    ///
    /// Jobs that are still running have neither a URL nor a completion date; `fallback` dates
    /// images that have a URL but no completion date. Returns `None` when the image cannot be
    /// downloaded yet.
    pub fn for_generated_image(
        image: &GeneratedImage,
        fallback: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        let url = image.url.clone().filter(|url| !url.is_empty())?;
        let date = image.completed.or(fallback)?;

        let file_name = if Path::new(&image.id).extension().is_some() {
            image.id.clone()
        } else {
            format!("{}.{DEFAULT_EXTENSION}", image.id)
        };

        Some(Self {
            id: image.id.clone(),
            url,
            path: Path::new("generated")
                .join(format!("{:04}", date.year()))
                .join(format!("{:02}", date.month()))
                .join(format!("{:02}", date.day()))
                .join(file_name),
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.id.clone(), |name| name.to_string_lossy().into_owned())
    }
}

#[derive(Debug)]
enum DownloadStatus {
    Downloaded,
    Skipped,
}

/// Downloads [`DownloadTarget`]s into a directory.
pub struct DownloadQueue {
    client: Client,
    output_dir: PathBuf,
    sim_downloads: usize,
    progress_listener: SharedProgressListener,
}

impl DownloadQueue {
    /// `sim_downloads` is clamped to `1..=MAX_SIMULTANEOUS_DOWNLOADS`.
    pub fn new(
        client: Client,
        output_dir: impl Into<PathBuf>,
        sim_downloads: u8,
        progress_listener: Option<SharedProgressListener>,
    ) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            sim_downloads: sim_downloads.clamp(1, MAX_SIMULTANEOUS_DOWNLOADS) as usize,
            progress_listener: progress_listener.unwrap_or_else(silent),
        }
    }

    /// Spawns the download task. It runs until every sender of `channel_rx` is dropped and
    /// returns the number of files written.
    pub fn setup_async_downloader(
        self,
        channel_rx: UnboundedReceiver<DownloadTarget>,
    ) -> JoinHandle<Result<u64, DownloadError>> {
        task::spawn(async move {
            debug!("Async downloader initialized");

            create_dir_all(&self.output_dir)
                .await
                .map_err(|error| DownloadError::DirCreation {
                    message: error.to_string(),
                })?;

            let downloaded = self
                .download_channel(UnboundedReceiverStream::new(channel_rx))
                .await;

            self.progress_listener.batch_done();
            Ok(downloaded)
        })
    }

    /// Downloads a fixed list of targets.
    pub async fn download_all(self, targets: Vec<DownloadTarget>) -> Result<u64, DownloadError> {
        let (tx, rx) = unbounded_channel();
        self.progress_listener.set_total_files(targets.len() as u64);

        for target in targets {
            // the receiver lives until the queue finishes
            let _ = tx.send(target);
        }
        drop(tx);

        self.setup_async_downloader(rx).await?
    }

    async fn download_channel(&self, channel: UnboundedReceiverStream<DownloadTarget>) -> u64 {
        let downloaded = Arc::new(AtomicU64::new(0));

        channel
            .map(|target| {
                let client = self.client.clone();
                let output_dir = self.output_dir.clone();
                let listener = self.progress_listener.clone();

                task::spawn(async move {
                    let result = Self::download_one(&client, &output_dir, &target, &listener).await;
                    listener.file_done();
                    (target, result)
                })
            })
            .buffer_unordered(self.sim_downloads)
            .for_each(|joined| {
                let downloaded = downloaded.clone();
                let listener = self.progress_listener.clone();

                async move {
                    match joined {
                        Ok((_, Ok(DownloadStatus::Downloaded))) => {
                            downloaded.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok((target, Ok(DownloadStatus::Skipped))) => {
                            debug!("{} was skipped", target.path.display());
                        }
                        Ok((target, Err(error))) => {
                            warn!("Failed to download {} from {}: {}", target.id, target.url, error);
                            listener.report(FileEvent::Failed, &target.file_name(), &error.to_string());
                        }
                        Err(join_error) => {
                            warn!("Download task failed to execute: {}", join_error);
                        }
                    }
                }
            })
            .await;

        downloaded.load(Ordering::SeqCst)
    }

    async fn download_one(
        client: &Client,
        output_dir: &Path,
        target: &DownloadTarget,
        listener: &SharedProgressListener,
    ) -> Result<DownloadStatus, DownloadError> {
        let out_path = output_dir.join(&target.path);
        let file_name = target.file_name();

        if out_path.exists() {
            listener.report(FileEvent::Skipped, &file_name, "already exists.");
            return Ok(DownloadStatus::Skipped);
        }

        if let Some(parent) = out_path.parent() {
            create_dir_all(parent)
                .await
                .map_err(|error| DownloadError::DirCreation {
                    message: error.to_string(),
                })?;
        }

        debug!("Fetching {} into {}", target.url, out_path.display());
        let res = client.get(&target.url).send().await?;

        if !res.status().is_success() {
            return Err(DownloadError::RemoteFileNotFound {
                status: res.status(),
            });
        }

        let size = res.content_length();
        let updater = listener.start_transfer(file_name.clone(), size);

        // written next to the target and renamed once complete, so an interrupted transfer is
        // never mistaken for a finished file
        let part_path = out_path.with_extension("part");
        let result = async {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&part_path)
                .await?;
            let mut bw = BufWriter::new(file);

            let mut stream = res.bytes_stream();
            let mut downloaded_bytes = 0;
            while let Some(chunk) = stream.next().await {
                let mut chunk = chunk.map_err(|error| DownloadError::ChunkDownloadFail {
                    message: error.to_string(),
                })?;
                downloaded_bytes += chunk.len() as u64;
                updater.set_position(downloaded_bytes);
                bw.write_all_buf(&mut chunk).await?;
            }
            bw.flush().await?;

            rename(&part_path, &out_path).await?;
            Ok::<_, DownloadError>(())
        }
        .await;
        updater.finish();

        if result.is_err() {
            let _ = tokio::fs::remove_file(&part_path).await;
        }
        result?;

        debug!("Finished downloading {}", file_name);
        Ok(DownloadStatus::Downloaded)
    }
}
