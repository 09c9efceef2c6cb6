//! Rank-decayed leaderboard
//!
//! Recent images are ranked by raw score and each one's score is scaled down by its rank:
//!
//! ```text
//! multiplier = max(0, 1 - sqrt(rank / IMAGE_SCORE_FALLOFF))
//! ```
//!
//! so the first image counts fully and images ranked at or past the falloff count for nothing.
//! The leaderboard as a whole is worth `sqrt(sum of adjusted scores) * IMAGE_SCORE_MULTIPLIER`.
use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use crate::item::Item;

use super::ScoringRule;

/// Only images published this many days before "now" take part.
pub const LEADERBOARD_WINDOW_DAYS: i64 = 30;

/// Rank at which an image stops contributing.
pub const IMAGE_SCORE_FALLOFF: f64 = 120.0;

pub const IMAGE_SCORE_MULTIPLIER: f64 = 100.0;

/// Entries shown in the HTML report.
pub const REPORT_LEADERBOARD_SIZE: usize = 120;

/// Entries pinned to a profile showcase.
pub const SHOWCASE_LEADERBOARD_SIZE: usize = 60;

/// Parameters of a leaderboard run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaderboardConfig {
    pub window: Duration,
    pub falloff: f64,
    pub multiplier: f64,
    /// Entries kept after ranking.
    pub size: usize,
}

impl LeaderboardConfig {
    pub fn report() -> Self {
        Self {
            window: Duration::days(LEADERBOARD_WINDOW_DAYS),
            falloff: IMAGE_SCORE_FALLOFF,
            multiplier: IMAGE_SCORE_MULTIPLIER,
            size: REPORT_LEADERBOARD_SIZE,
        }
    }

    pub fn showcase() -> Self {
        Self {
            size: SHOWCASE_LEADERBOARD_SIZE,
            ..Self::report()
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self::report()
    }
}

/// Weight of the image at zero-based `rank`.
#[inline]
pub fn quantity_multiplier(rank: usize, falloff: f64) -> f64 {
    (1.0 - (rank as f64 / falloff).sqrt()).max(0.0)
}

/// One ranked image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaderboardEntry<'a> {
    pub item: &'a Item,
    pub score: i64,
    /// Zero-based position by raw score.
    pub rank: usize,
    pub multiplier: f64,
    pub adjusted_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaderboard<'a> {
    pub entries: Vec<LeaderboardEntry<'a>>,
    multiplier: f64,
}

impl<'a> Leaderboard<'a> {
    /// Ranks the items published within `config.window` before `now`.
    pub fn rank(
        items: &'a [Item],
        rule: &ScoringRule,
        now: DateTime<Utc>,
        config: &LeaderboardConfig,
    ) -> Self {
        let cutoff = now - config.window;

        let mut eligible: Vec<(&'a Item, i64)> = items
            .iter()
            .filter(|item| item.published_at.is_some_and(|at| at > cutoff))
            .map(|item| (item, rule.score(item)))
            .collect();
        eligible.sort_by(|a, b| b.1.cmp(&a.1));

        let mut entries: Vec<LeaderboardEntry<'a>> = eligible
            .into_iter()
            .enumerate()
            .map(|(rank, (item, score))| {
                let multiplier = quantity_multiplier(rank, config.falloff);
                LeaderboardEntry {
                    item,
                    score,
                    rank,
                    multiplier,
                    adjusted_score: score as f64 * multiplier,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.adjusted_score
                .partial_cmp(&a.adjusted_score)
                .unwrap_or(Ordering::Equal)
        });
        entries.truncate(config.size);

        Self {
            entries,
            multiplier: config.multiplier,
        }
    }

    /// Overall worth of the leaderboard.
    pub fn score(&self) -> f64 {
        let sum: f64 = self.entries.iter().map(|entry| entry.adjusted_score).sum();
        sum.max(0.0).sqrt() * self.multiplier
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LeaderboardEntry<'a>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ranking::test::{at, item};

    fn published(id: u64, like: i64, date: DateTime<Utc>) -> Item {
        let mut item = item(id, id, 0, like, 0);
        item.published_at = Some(date);
        item
    }

    #[test]
    fn multiplier_decays_with_rank() {
        assert_eq!(quantity_multiplier(0, IMAGE_SCORE_FALLOFF), 1.0);
        assert_eq!(quantity_multiplier(120, IMAGE_SCORE_FALLOFF), 0.0);
        assert_eq!(quantity_multiplier(500, IMAGE_SCORE_FALLOFF), 0.0);
        assert!((quantity_multiplier(30, IMAGE_SCORE_FALLOFF) - 0.5).abs() < 1e-12);

        let weights: Vec<f64> = (0..200)
            .map(|rank| quantity_multiplier(rank, IMAGE_SCORE_FALLOFF))
            .collect();
        assert!(weights.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn only_recent_published_items_are_ranked() {
        let now = at(31, 0);
        let mut unpublished = item(4, 4, 0, 50, 0);
        unpublished.created_at = Some(at(30, 0));

        let items = vec![
            published(1, 10, at(30, 0)),
            published(2, 10, at(1, 0)),
            published(3, 10, now - Duration::days(30)),
            unpublished,
        ];
        let board = Leaderboard::rank(&items, &ScoringRule::net(), now, &LeaderboardConfig::report());

        let ids: Vec<u64> = board.iter().map(|entry| entry.item.id).collect();
        assert_eq!(ids, [1]);
    }

    #[test]
    fn entries_are_adjusted_sorted_and_truncated() {
        let now = at(31, 0);
        let items: Vec<Item> = (0..200)
            .map(|id| published(id, (id % 17) as i64, at(20, 0)))
            .collect();

        let config = LeaderboardConfig::showcase();
        let board = Leaderboard::rank(&items, &ScoringRule::net(), now, &config);

        assert_eq!(board.len(), SHOWCASE_LEADERBOARD_SIZE);
        assert!(board
            .entries
            .windows(2)
            .all(|pair| pair[0].adjusted_score >= pair[1].adjusted_score));

        let top = &board.entries[0];
        assert_eq!(top.rank, 0);
        assert_eq!(top.score, 16);
        assert_eq!(top.adjusted_score, 16.0);

        for entry in board.iter() {
            assert_eq!(entry.adjusted_score, entry.score as f64 * entry.multiplier);
        }
    }

    #[test]
    fn ties_keep_their_input_order() {
        let now = at(31, 0);
        let items = vec![
            published(1, 5, at(20, 0)),
            published(2, 5, at(20, 0)),
            published(3, 5, at(20, 0)),
        ];
        let board = Leaderboard::rank(&items, &ScoringRule::net(), now, &LeaderboardConfig::report());

        let ranks: Vec<(u64, usize)> = board.iter().map(|e| (e.item.id, e.rank)).collect();
        assert_eq!(ranks, [(1, 0), (2, 1), (3, 2)]);
    }

    #[test]
    fn aggregate_score_is_the_scaled_root_of_the_sum() {
        let now = at(31, 0);
        let items = vec![published(1, 16, at(20, 0))];
        let board = Leaderboard::rank(&items, &ScoringRule::net(), now, &LeaderboardConfig::report());
        assert_eq!(board.score(), 400.0);

        let items = vec![published(1, -9, at(20, 0))];
        let board = Leaderboard::rank(&items, &ScoringRule::net(), now, &LeaderboardConfig::report());
        assert_eq!(board.score(), 0.0);

        let empty: Vec<Item> = Vec::new();
        let board = Leaderboard::rank(&empty, &ScoringRule::net(), now, &LeaderboardConfig::report());
        assert!(board.is_empty());
        assert_eq!(board.score(), 0.0);
    }
}
