use indicatif::{
    HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle,
};
use owo_colors::OwoColorize;
use std::{fmt::Write, time::Duration};

use crate::progress::{FileEvent, ProgressListener, TransferProgress};

const PROGRESS_CHARS: &str = "━━";

const FILES_TEMPLATE: &str = "{spinner:.green.bold} {elapsed_precise:.bold} {wide_bar:.green/white.dim} {percent:.bold}  {pos:.green} (eta. {eta:.blue})";

const TRANSFER_TEMPLATE: &str = "{spinner:.green.bold} {bar:40.green/white.dim} {percent:.bold} | {byte_progress:21.green} @ {bytes_per_sec:>13.red} (eta. {eta:<4.blue})";

/// Terminal progress display built on `indicatif`: one bar counting the files of a batch, plus a
/// byte bar for every transfer in flight.
#[derive(Debug)]
pub struct IndicatifProgressHandler {
    files: ProgressBar,
    bars: MultiProgress,
}

impl IndicatifProgressHandler {
    /// Starts the file bar at `files`. Listings that are still paging grow it with `add_files`.
    pub fn new(files: u64) -> Self {
        let bars = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let files = bars.add(ProgressBar::new(files).with_style(files_style()));
        files.enable_steady_tick(Duration::from_millis(100));

        Self { files, bars }
    }
}

#[derive(Debug)]
struct TransferBar(ProgressBar);

impl TransferProgress for TransferBar {
    fn set_position(&self, bytes: u64) {
        self.0.set_position(bytes);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

impl ProgressListener for IndicatifProgressHandler {
    fn set_total_files(&self, total: u64) {
        self.files.set_length(total);
    }

    fn add_files(&self, count: u64) {
        self.files.inc_length(count);
    }

    fn file_done(&self) {
        self.files.inc(1);
    }

    fn batch_done(&self) {
        self.files.finish_and_clear();
    }

    fn start_transfer(&self, name: String, size: Option<u64>) -> Box<dyn TransferProgress> {
        let bar = ProgressBar::new(size.unwrap_or(0))
            .with_style(transfer_style())
            .with_message(name);

        Box::new(TransferBar(self.bars.add(bar)))
    }

    fn report(&self, event: FileEvent, file: &str, message: &str) {
        let line = match event {
            FileEvent::Skipped => format!(
                "{} {} {}",
                file.blue().italic(),
                message.green().bold(),
                "Skipping...".green().bold()
            ),
            FileEvent::Failed => format!(
                "{} {} {}",
                file.blue().italic(),
                message.red().bold(),
                "Error.".red().bold()
            ),
        };

        self.files.println(line);
    }
}

fn files_style() -> ProgressStyle {
    ProgressStyle::with_template(FILES_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("pos", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{}/{}", state.pos(), state.len().unwrap_or_default());
        })
        .with_key("percent", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:>3.0}%", state.fraction() * 100_f32);
        })
        .progress_chars(PROGRESS_CHARS)
}

fn transfer_style() -> ProgressStyle {
    ProgressStyle::with_template(TRANSFER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("percent", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:>3.0}%", state.fraction() * 100_f32);
        })
        .with_key(
            "byte_progress",
            |state: &ProgressState, w: &mut dyn Write| {
                let _ = write!(
                    w,
                    "{}/{}",
                    HumanBytes(state.pos()),
                    HumanBytes(state.len().unwrap_or_default())
                );
            },
        )
        .progress_chars(PROGRESS_CHARS)
}
