//! Scoring, grouping and ranking of fetched images.
//!
//! Everything in here is pure: it works on a borrowed snapshot of [`Item`]s and builds fresh views
//! every time one is asked for.
use std::cmp::Ordering;

use ahash::AHashMap;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{Item, Reaction};

pub use self::leaderboard::{Leaderboard, LeaderboardConfig, LeaderboardEntry};
pub use self::summary::ScoreSummary;

pub mod leaderboard;
pub mod summary;

/// Which counters add to the score of an item and which take away from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub positive: Vec<Reaction>,
    pub negative: Vec<Reaction>,
}

impl ScoringRule {
    /// Every positive reaction, nothing subtracted.
    pub fn reactions() -> Self {
        Self {
            positive: vec![Reaction::Like, Reaction::Laugh, Reaction::Heart, Reaction::Cry],
            negative: Vec::new(),
        }
    }

    /// Positive reactions minus dislikes.
    pub fn net() -> Self {
        Self {
            negative: vec![Reaction::Dislike],
            ..Self::reactions()
        }
    }

    pub fn score(&self, item: &Item) -> i64 {
        let positive: i64 = self.positive.iter().map(|r| item.stats.get(*r)).sum();
        let negative: i64 = self.negative.iter().map(|r| item.stats.get(*r)).sum();
        positive - negative
    }
}

impl Default for ScoringRule {
    fn default() -> Self {
        Self::net()
    }
}

/// An item together with its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem<'a> {
    pub item: &'a Item,
    pub score: i64,
}

/// Items sharing one post id, ordered by their index inside the post.
#[derive(Debug, Clone, PartialEq)]
pub struct Post<'a> {
    pub id: u64,
    pub items: Vec<ScoredItem<'a>>,
    /// Sum of the item scores.
    pub score: i64,
}

impl<'a> Post<'a> {
    fn new(id: u64, mut items: Vec<ScoredItem<'a>>) -> Self {
        items.sort_by_key(|scored| scored.item.index);
        let score = items.iter().map(|scored| scored.score).sum();
        Self { id, items, score }
    }

    /// Average score per item.
    #[inline]
    pub fn efficiency(&self) -> f64 {
        self.score as f64 / self.items.len() as f64
    }

    /// The item with the lowest index.
    #[inline]
    pub fn first(&self) -> &'a Item {
        self.items[0].item
    }

    /// Date of the first item.
    #[inline]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.first().date()
    }

    #[inline]
    pub fn url(&self) -> String {
        self.first().post_url()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`: a post is only built from at least one item.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Posts published on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq)]
pub struct DailyPosts<'a> {
    pub day: NaiveDate,
    pub posts: Vec<Post<'a>>,
}

fn by_score_desc(a: i64, b: i64) -> Ordering {
    b.cmp(&a)
}

fn by_float_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// `true` when `date` lies strictly between `start` and `end`.
#[inline]
fn inside(date: Option<DateTime<Utc>>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    date.is_some_and(|at| at > start && at < end)
}

/// Scoring views over a snapshot of items.
#[derive(Debug, Clone)]
pub struct Ranking<'a> {
    items: &'a [Item],
    rule: ScoringRule,
}

impl<'a> Ranking<'a> {
    pub fn new(items: &'a [Item], rule: ScoringRule) -> Self {
        Self { items, rule }
    }

    /// Every item with its score, in input order.
    pub fn scored(&self) -> Vec<ScoredItem<'a>> {
        self.items
            .iter()
            .map(|item| ScoredItem {
                item,
                score: self.rule.score(item),
            })
            .collect()
    }

    pub fn items_by_score(&self) -> Vec<ScoredItem<'a>> {
        let mut items = self.scored();
        items.sort_by(|a, b| by_score_desc(a.score, b.score));
        items
    }

    /// Newest first. Undated items go last.
    pub fn items_by_date(&self) -> Vec<ScoredItem<'a>> {
        let mut items = self.scored();
        items.sort_by(|a, b| b.item.date().cmp(&a.item.date()));
        items
    }

    /// Items dated strictly between `start` and `end`, in input order.
    pub fn items_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ScoredItem<'a>> {
        self.scored()
            .into_iter()
            .filter(|scored| inside(scored.item.date(), start, end))
            .collect()
    }

    /// Groups the items by post, in the order each post first shows up.
    pub fn posts(&self) -> Vec<Post<'a>> {
        let mut positions: AHashMap<u64, usize> = AHashMap::new();
        let mut groups: Vec<(u64, Vec<ScoredItem<'a>>)> = Vec::new();

        for scored in self.scored() {
            let post_id = scored.item.post_id;
            match positions.get(&post_id) {
                Some(&at) => groups[at].1.push(scored),
                None => {
                    positions.insert(post_id, groups.len());
                    groups.push((post_id, vec![scored]));
                }
            }
        }

        groups
            .into_iter()
            .map(|(id, items)| Post::new(id, items))
            .collect()
    }

    pub fn posts_by_score(&self) -> Vec<Post<'a>> {
        let mut posts = self.posts();
        posts.sort_by(|a, b| by_score_desc(a.score, b.score));
        posts
    }

    /// Newest first. Undated posts go last.
    pub fn posts_by_date(&self) -> Vec<Post<'a>> {
        let mut posts = self.posts();
        posts.sort_by(|a, b| b.date().cmp(&a.date()));
        posts
    }

    pub fn posts_by_efficiency(&self) -> Vec<Post<'a>> {
        let mut posts = self.posts();
        posts.sort_by(|a, b| by_float_desc(a.efficiency(), b.efficiency()));
        posts
    }

    /// The `n` least efficient posts dated strictly between `start` and `end`, worst first.
    pub fn worst_efficiency_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        n: usize,
    ) -> Vec<Post<'a>> {
        let mut posts: Vec<Post<'a>> = self
            .posts()
            .into_iter()
            .filter(|post| inside(post.date(), start, end))
            .collect();
        posts.sort_by(|a, b| by_float_desc(b.efficiency(), a.efficiency()));
        posts.truncate(n);
        posts
    }

    /// The `n` highest scoring posts of every day, most recent day first.
    pub fn best_posts_per_day(&self, n: usize) -> Vec<DailyPosts<'a>> {
        self.posts_per_day(n, |a, b| by_score_desc(a.score, b.score))
    }

    /// The `n` lowest scoring posts of every day, most recent day first.
    pub fn worst_posts_per_day(&self, n: usize) -> Vec<DailyPosts<'a>> {
        self.posts_per_day(n, |a, b| a.score.cmp(&b.score))
    }

    fn posts_per_day<F>(&self, n: usize, order: F) -> Vec<DailyPosts<'a>>
    where
        F: Fn(&Post<'a>, &Post<'a>) -> Ordering,
    {
        let mut positions: AHashMap<NaiveDate, usize> = AHashMap::new();
        let mut days: Vec<DailyPosts<'a>> = Vec::new();

        for post in self.posts() {
            // undated posts have no day to go to
            let Some(day) = post.date().map(|at| at.date_naive()) else {
                continue;
            };
            match positions.get(&day) {
                Some(&at) => days[at].posts.push(post),
                None => {
                    positions.insert(day, days.len());
                    days.push(DailyPosts {
                        day,
                        posts: vec![post],
                    });
                }
            }
        }

        for day in &mut days {
            day.posts.sort_by(&order);
            day.posts.truncate(n);
        }
        days.sort_by(|a, b| b.day.cmp(&a.day));
        days
    }

    /// Score statistics over every item.
    pub fn summary(&self) -> ScoreSummary {
        let scores: Vec<i64> = self.items.iter().map(|item| self.rule.score(item)).collect();
        ScoreSummary::from_scores(&scores)
    }

    /// Rank-decayed leaderboard of the items published in the window before `now`.
    pub fn leaderboard(&self, now: DateTime<Utc>, config: &LeaderboardConfig) -> Leaderboard<'a> {
        Leaderboard::rank(self.items, &self.rule, now, config)
    }
}
