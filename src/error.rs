use std::io;

use thiserror::Error;

use crate::{api::error::ApiError, config::ConfigError, download::error::DownloadError};

#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Api {
        #[from]
        source: ApiError,
    },

    #[error(transparent)]
    Download {
        #[from]
        source: DownloadError,
    },

    #[error(transparent)]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to access file: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("Invalid image JSON: {source}")]
    JsonInput {
        #[from]
        source: serde_json::Error,
    },

    #[error("Failed to render report: {source}")]
    Render {
        #[from]
        source: askama::Error,
    },

    #[error("No published images in input")]
    NoItems,
}
