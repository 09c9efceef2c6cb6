//! Progress hooks of the download queue.
//!
//! The queue reports a batch of files and the transfer of each file to a [`ProgressListener`]. The
//! CLI plugs in the `indicatif` bars from [`progress_bars`](crate::progress_bars); library users and
//! tests get [`Silent`].
use std::{fmt::Debug, sync::Arc};

/// Outcome of a file that did not end up downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    /// Already on disk.
    Skipped,
    Failed,
}

pub trait ProgressListener: Send + Sync + Debug {
    /// Number of files in the batch, when known up front.
    fn set_total_files(&self, total: u64);
    /// Grows the batch while listings are still being paged.
    fn add_files(&self, count: u64);
    /// One file of the batch is settled, whatever the outcome.
    fn file_done(&self);
    fn batch_done(&self);

    /// Starts tracking the transfer of `name`. `size` comes from `Content-Length`.
    fn start_transfer(&self, name: String, size: Option<u64>) -> Box<dyn TransferProgress>;

    fn report(&self, event: FileEvent, file: &str, message: &str);
}

pub trait TransferProgress: Send + Sync + Debug {
    fn set_position(&self, bytes: u64);
    fn finish(&self);
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy)]
pub struct Silent;

impl ProgressListener for Silent {
    fn set_total_files(&self, _total: u64) {}
    fn add_files(&self, _count: u64) {}
    fn file_done(&self) {}
    fn batch_done(&self) {}

    fn start_transfer(&self, _name: String, _size: Option<u64>) -> Box<dyn TransferProgress> {
        Box::new(Silent)
    }

    fn report(&self, _event: FileEvent, _file: &str, _message: &str) {}
}

impl TransferProgress for Silent {
    fn set_position(&self, _bytes: u64) {}
    fn finish(&self) {}
}

pub type SharedProgressListener = Arc<dyn ProgressListener>;

pub fn silent() -> SharedProgressListener {
    Arc::new(Silent)
}
