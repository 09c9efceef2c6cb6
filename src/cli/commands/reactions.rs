use std::{path::PathBuf, time::Duration};

use clap::Args;

use crate::{
    cli::Context,
    error::CliError,
    reactions::{ReactionsTracker, TrackedFiles},
};

/// Longest accepted pause between runs: one week.
const MAX_DELAY_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Args)]
pub struct Reactions {
    /// Image ids to track, one per line
    #[clap(long, value_name = "FILE", default_value = "images.txt")]
    images: PathBuf,

    /// Model ids to track, one per line
    #[clap(long, value_name = "FILE", default_value = "models.txt")]
    models: PathBuf,

    /// More model ids, recorded in a separate CSV
    #[clap(long, value_name = "FILE", default_value = "whales.txt")]
    whales: PathBuf,

    /// Minutes to wait between runs
    ///
    /// [max: 10080]
    #[clap(
        long,
        value_name = "MINUTES",
        default_value_t = 20,
        value_parser(clap::value_parser!(u64).range(1..=MAX_DELAY_MINUTES)),
    )]
    delay_minutes: u64,

    /// Run once and exit
    #[clap(long)]
    once: bool,
}

impl Reactions {
    fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_minutes.saturating_mul(60))
    }

    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        let delay = self.delay();
        let files = TrackedFiles {
            images: self.images,
            models: self.models,
            whales: self.whales,
        };
        let tracker = ReactionsTracker::new(
            ctx.client()?,
            files,
            &ctx.settings.output_dir,
            ctx.cancel.clone(),
        );

        if self.once {
            tracker.run().await?;
        } else {
            tracker
                .run_forever(delay)
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use crate::cli::{Cli, Commands};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(["civitai_downloader", "reactions"].iter().chain(args))
    }

    #[test]
    fn delay_is_bounded() {
        let Commands::Reactions(cmd) = parse(&[]).unwrap().mode else {
            panic!("parsed into another command");
        };
        assert_eq!(cmd.delay().as_secs(), 20 * 60);

        let Commands::Reactions(cmd) = parse(&["--delay-minutes", "10080"]).unwrap().mode else {
            panic!("parsed into another command");
        };
        assert_eq!(cmd.delay().as_secs(), 10080 * 60);

        assert!(parse(&["--delay-minutes", "0"]).is_err());
        assert!(parse(&["--delay-minutes", "10081"]).is_err());
        assert!(parse(&["--delay-minutes", "18446744073709551615"]).is_err());
    }
}
