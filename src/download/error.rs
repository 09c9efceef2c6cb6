use std::io;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::task;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to access file: {source}")]
    FileIO {
        #[from]
        source: io::Error,
    },

    #[error("Failed to connect to download URL: {source}")]
    Connection {
        #[from]
        source: reqwest::Error,
    },

    #[error("Image URL is valid but the server returned {status}")]
    RemoteFileNotFound { status: StatusCode },

    #[error("Error while fetching chunk: {message}")]
    ChunkDownloadFail { message: String },

    #[error("Failed to create destination directory. error: {message}")]
    DirCreation { message: String },

    #[error("Download task failed to execute: {source}")]
    Task {
        #[from]
        source: task::JoinError,
    },
}
