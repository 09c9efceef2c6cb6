//! Periodic engagement tracker.
//!
//! Every run reads the ids listed in a few plain text files, fetches their current numbers and
//! appends one timestamped CSV row per record, so that a spreadsheet can plot how they move over
//! time:
//!
//! | input          | output              | row                                  |
//! |----------------|---------------------|--------------------------------------|
//! | images file    | `images.csv`        | `ts,id,score`                        |
//! | models file    | `<models stem>.csv` | `ts,"model version",generations`     |
//! | whales file    | `<whales stem>.csv` | `ts,"model version",generations`     |
//! | (none)         | `compensation.csv`  | `ts,value,current,forecasted`        |
use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Local;
use log::{debug, info, warn};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tokio_util::sync::CancellationToken;

use crate::{api::CivitaiClient, ranking::ScoringRule};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const IMAGES_OUTPUT: &str = "images.csv";
const COMPENSATION_OUTPUT: &str = "compensation.csv";

/// Input files of a tracker run.
#[derive(Debug, Clone)]
pub struct TrackedFiles {
    pub images: PathBuf,
    pub models: PathBuf,
    pub whales: PathBuf,
}

impl Default for TrackedFiles {
    fn default() -> Self {
        Self {
            images: PathBuf::from("images.txt"),
            models: PathBuf::from("models.txt"),
            whales: PathBuf::from("whales.txt"),
        }
    }
}

/// Outcome of one pass over an input file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub written: usize,
    pub skipped: usize,
}

pub struct ReactionsTracker {
    client: CivitaiClient,
    files: TrackedFiles,
    output_dir: PathBuf,
    rule: ScoringRule,
    cancel: CancellationToken,
}

impl ReactionsTracker {
    /// `images.csv` and `compensation.csv` are written to `output_dir`; model rows go next to
    /// their input file.
    pub fn new(
        client: CivitaiClient,
        files: TrackedFiles,
        output_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            files,
            output_dir: output_dir.into(),
            rule: ScoringRule::reactions(),
            cancel,
        }
    }

    /// Runs until cancelled, sleeping `delay` between runs.
    pub async fn run_forever(&self, delay: Duration) -> io::Result<()> {
        loop {
            self.run().await?;

            if self.cancel.is_cancelled() {
                break;
            }

            if let Some(wake_at) = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|delay| Local::now().checked_add_signed(delay))
            {
                info!("Sleeping until {}", wake_at.format(TIMESTAMP_FORMAT));
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Reactions tracker stopped");
        Ok(())
    }

    /// One pass over every input. Only failing to write an output file is an error.
    pub async fn run(&self) -> io::Result<()> {
        info!("Run started");

        let images = self.track_images(&self.files.images).await?;
        debug!("Images: {images:?}");

        for input in [&self.files.models, &self.files.whales] {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let stats = self.track_models(input).await?;
            debug!("{}: {stats:?}", input.display());
        }

        if !self.cancel.is_cancelled() {
            self.track_compensation().await?;
        }

        info!("Run completed");
        Ok(())
    }

    pub async fn track_images(&self, input: &Path) -> io::Result<PassStats> {
        info!("Processing images from {}", input.display());
        let Some(ids) = read_ids(input, parse_image_line).await? else {
            return Ok(PassStats::default());
        };

        let mut out = append_to(&self.output_dir.join(IMAGES_OUTPUT)).await?;
        let ts = timestamp();
        let mut stats = PassStats {
            skipped: ids.skipped,
            ..Default::default()
        };

        for id in ids.ids {
            let item = match self.client.image(id).await {
                Ok(item) => item,
                Err(error) if error.is_cancellation() => break,
                Err(error) => {
                    warn!("Error fetching image {id}: {error}");
                    stats.skipped += 1;
                    continue;
                }
            };

            let score = self.rule.score(&item);
            debug!("Fetched image {id}: {score}");
            out.write_all(format!("{ts},{id},{score}\n").as_bytes()).await?;
            stats.written += 1;
        }

        out.flush().await?;
        Ok(stats)
    }

    pub async fn track_models(&self, input: &Path) -> io::Result<PassStats> {
        info!("Processing models from {}", input.display());
        let Some(ids) = read_ids(input, parse_model_line).await? else {
            return Ok(PassStats::default());
        };

        let mut out = append_to(&input.with_extension("csv")).await?;
        let ts = timestamp();
        let mut stats = PassStats {
            skipped: ids.skipped,
            ..Default::default()
        };

        for id in ids.ids {
            let model = match self.client.model(id).await {
                Ok(model) => model,
                Err(error) if error.is_cancellation() => break,
                Err(error) => {
                    warn!("Error fetching model {id}: {error}");
                    stats.skipped += 1;
                    continue;
                }
            };

            debug!("Fetched model {id}: {}", model.name);
            for version in &model.model_versions {
                let label = quoted(&format!("{} {}", model.name, version.name));
                out.write_all(format!("{ts},{label},{}\n", version.generations()).as_bytes())
                    .await?;
                stats.written += 1;
            }
        }

        out.flush().await?;
        Ok(stats)
    }

    /// A failed fetch is logged and leaves the file untouched.
    pub async fn track_compensation(&self) -> io::Result<bool> {
        let pool = match self.client.compensation_pool().await {
            Ok(pool) => pool,
            Err(error) => {
                warn!("Error fetching compensation pool: {error}");
                return Ok(false);
            }
        };

        let mut out = append_to(&self.output_dir.join(COMPENSATION_OUTPUT)).await?;
        let row = format!(
            "{},{:.2},{:.2},{:.2}\n",
            timestamp(),
            pool.value,
            pool.size.current,
            pool.size.forecasted
        );
        out.write_all(row.as_bytes()).await?;
        out.flush().await?;
        Ok(true)
    }
}

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Quotes a CSV field, doubling any quote inside it.
fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

async fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).await
}

struct ParsedIds {
    ids: Vec<u64>,
    skipped: usize,
}

/// An image line is a bare id.
fn parse_image_line(line: &str) -> Option<u64> {
    line.parse().ok()
}

/// A model line starts with the id; anything after it is ignored.
fn parse_model_line(line: &str) -> Option<u64> {
    line.split_whitespace().next()?.parse().ok()
}

/// Reads one id per line. Blank lines are ignored and malformed ones logged. `None` when the file
/// does not exist.
async fn read_ids(path: &Path, parse: fn(&str) -> Option<u64>) -> io::Result<Option<ParsedIds>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            warn!("{} does not exist, skipping", path.display());
            return Ok(None);
        }
        Err(error) => return Err(error),
    };

    let mut parsed = ParsedIds {
        ids: Vec::new(),
        skipped: 0,
    };
    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse(line) {
            Some(id) => parsed.ids.push(id),
            None => {
                warn!("Error parsing {line:?}");
                parsed.skipped += 1;
            }
        }
    }

    Ok(Some(parsed))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::trpc;
    use serde_json::json;
    use tempdir::TempDir;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn trpc_body(json: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "result": { "data": { "json": json } } }))
    }

    fn tracker(server: &MockServer, dir: &Path) -> ReactionsTracker {
        let client = CivitaiClient::new("secret", None)
            .unwrap()
            .with_base_url(server.uri());
        let files = TrackedFiles {
            images: dir.join("images.txt"),
            models: dir.join("models.txt"),
            whales: dir.join("whales.txt"),
        };
        ReactionsTracker::new(client, files, dir, CancellationToken::new())
    }

    #[test]
    fn model_lines_may_carry_comments() {
        assert_eq!(parse_model_line("1234 my favourite"), Some(1234));
        assert_eq!(parse_model_line("abc"), None);
        assert_eq!(parse_image_line("42"), Some(42));
        assert_eq!(parse_image_line("42 x"), None);
    }

    #[test]
    fn quotes_inside_labels_are_doubled() {
        assert_eq!(quoted("Dreamy v1"), r#""Dreamy v1""#);
        assert_eq!(quoted(r#"The "Best" Model v2"#), r#""The ""Best"" Model v2""#);
        assert_eq!(quoted(r"back\slash"), r#""back\slash""#);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = TempDir::new("reactions").unwrap();
        let input = dir.path().join("images.txt");
        std::fs::write(&input, "1\nnot an id\n\n2\n-3\n").unwrap();

        let parsed = read_ids(&input, parse_image_line).await.unwrap().unwrap();
        assert_eq!(parsed.ids, [1, 2]);
        assert_eq!(parsed.skipped, 2);

        assert!(read_ids(&dir.path().join("missing.txt"), parse_image_line)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn image_scores_are_appended() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/trpc/image.get"))
            .and(query_param("input", trpc::input(json!({ "id": 7 })).to_string()))
            .respond_with(trpc_body(json!({
                "id": 7,
                "postId": 70,
                "url": "key",
                "stats": {
                    "likeCountAllTime": 4,
                    "heartCountAllTime": 2,
                    "dislikeCountAllTime": 9
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/trpc/image.get"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new("reactions").unwrap();
        let tracker = tracker(&server, dir.path());
        std::fs::write(&tracker.files.images, "7\n8\nbogus\n").unwrap();

        let stats = tracker.track_images(&tracker.files.images).await.unwrap();
        assert_eq!(stats, PassStats { written: 1, skipped: 2 });

        let csv = std::fs::read_to_string(dir.path().join(IMAGES_OUTPUT)).unwrap();
        let fields: Vec<&str> = csv.trim_end().split(',').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1..], ["7", "6"]);

        // appends on every run
        tracker.track_images(&tracker.files.images).await.unwrap();
        let csv = std::fs::read_to_string(dir.path().join(IMAGES_OUTPUT)).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[tokio::test]
    async fn model_versions_are_appended_next_to_the_input() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/trpc/model.getById"))
            .respond_with(trpc_body(json!({
                "id": 5,
                "name": "Dreamy \"XL\"",
                "modelVersions": [
                    { "id": 50, "name": "v1", "rank": { "generationCountAllTime": 120 } },
                    { "id": 51, "name": "v2" }
                ]
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new("reactions").unwrap();
        let tracker = tracker(&server, dir.path());
        std::fs::write(&tracker.files.whales, "5\n").unwrap();

        let stats = tracker.track_models(&tracker.files.whales).await.unwrap();
        assert_eq!(stats.written, 2);

        let csv = std::fs::read_to_string(dir.path().join("whales.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].ends_with(r#","Dreamy ""XL"" v1",120"#));
        assert!(lines[1].ends_with(r#","Dreamy ""XL"" v2",0"#));
    }

    #[tokio::test]
    async fn compensation_failures_are_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/trpc/creatorProgram.getCompensationPool"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new("reactions").unwrap();
        let tracker = tracker(&server, dir.path());

        assert!(!tracker.track_compensation().await.unwrap());
        assert!(!dir.path().join(COMPENSATION_OUTPUT).exists());
    }

    #[tokio::test]
    async fn compensation_pool_is_appended() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/trpc/creatorProgram.getCompensationPool"))
            .respond_with(trpc_body(json!({
                "value": 0.5,
                "size": { "current": 1234.567, "forecasted": 2000 }
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new("reactions").unwrap();
        let tracker = tracker(&server, dir.path());

        assert!(tracker.track_compensation().await.unwrap());
        let csv = std::fs::read_to_string(dir.path().join(COMPENSATION_OUTPUT)).unwrap();
        assert!(csv.ends_with(",0.50,1234.57,2000.00\n"));
    }

    #[tokio::test]
    async fn cancelled_tracker_stops_after_the_current_run() {
        let server = MockServer::start().await;
        let dir = TempDir::new("reactions").unwrap();
        let tracker = tracker(&server, dir.path());
        tracker.cancel.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            tracker.run_forever(Duration::from_secs(3600)),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
