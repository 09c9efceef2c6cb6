//! # Civitai Downloader
//!
//! civitai_downloader is a CLI utility to bulk download images from Civitai and to rank a user's
//! images the way the site leaderboard does.
//!
//! The library side exposes the pieces the CLI is built from: an authenticated API client whose
//! paged endpoints return a sequential [`Paginator`](pagination::Paginator), the canonical
//! [`Item`] every endpoint is normalized into, and the pure [`Ranking`](ranking::Ranking) engine
//! that groups items into posts, sorts them and computes the rank-decayed leaderboard.
pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod item;
pub mod pagination;
pub mod progress;
pub mod progress_bars;
pub mod ranking;
pub mod reactions;
pub mod report;

pub use api::CivitaiClient;

pub use item::Item;

// Export main worker queue
pub use download::DownloadQueue;

pub use ranking::{leaderboard::Leaderboard, Ranking, ScoringRule};
