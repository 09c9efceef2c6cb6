#![deny(clippy::all)]
use civitai_downloader::cli::Cli;
use clap::Parser;
use color_eyre::eyre::Result;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    env_logger::builder().format_timestamp(None).init();
    color_eyre::install()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    debug!("Interrupted, cancelling");
                    cancel.cancel();
                }
                Err(error) => warn!("Failed to listen for Ctrl-C: {error}"),
            }
        }
    });

    args.run(cancel).await?;

    Ok(())
}
