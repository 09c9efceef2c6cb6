use std::path::PathBuf;

use askama::Template;
use chrono::Utc;
use clap::Args;

use crate::{
    cli::{read_items, write_output},
    error::CliError,
    ranking::ScoringRule,
    report::{CsvReport, HtmlReport},
};

#[derive(Debug, Args)]
pub struct Report {
    /// JSON file written by `images metadata`
    #[clap(value_parser, value_name = "INPUT")]
    input: PathBuf,

    /// Write to a file instead of stdout
    #[clap(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

impl Report {
    pub fn run(self) -> Result<(), CliError> {
        let items = read_items(&self.input)?;
        let html = HtmlReport::build(&items, ScoringRule::default(), Utc::now())?.render()?;
        write_output(self.out.as_deref(), &html)
    }
}

#[derive(Debug, Args)]
pub struct Csv {
    /// JSON file written by `images metadata`
    #[clap(value_parser, value_name = "INPUT")]
    input: PathBuf,

    /// Write to a file instead of stdout
    #[clap(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

impl Csv {
    pub fn run(self) -> Result<(), CliError> {
        let items = read_items(&self.input)?;
        let csv = CsvReport::build(&items, ScoringRule::default()).render()?;
        write_output(self.out.as_deref(), &csv)
    }
}
