//! HTML and CSV reports over a user's images.
//!
//! Both renderers take the images as they come out of `images metadata`, keep the published ones and
//! hand precomputed rows to an `askama` template, so the templates only ever print strings.
use askama::Template;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    item::Item,
    ranking::{
        leaderboard::LEADERBOARD_WINDOW_DAYS, DailyPosts, Leaderboard, LeaderboardConfig, Post,
        Ranking, ScoreSummary, ScoringRule,
    },
};

/// Posts listed per day in the best/worst daily views.
const POSTS_PER_DAY: usize = 3;

/// Posts listed in the "least efficient recent posts" view.
const WORST_RECENT_POSTS: usize = 10;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Keeps the images that are already published.
pub fn published(items: Vec<Item>) -> Vec<Item> {
    items.into_iter().filter(Item::is_published).collect()
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "-".to_string(), |at| at.format(DATE_FORMAT).to_string())
}

pub struct PostRow {
    pub id: u64,
    pub url: String,
    pub cover: String,
    pub images: usize,
    pub score: i64,
    pub efficiency: String,
    pub date: String,
}

impl From<&Post<'_>> for PostRow {
    fn from(post: &Post<'_>) -> Self {
        Self {
            id: post.id,
            url: post.url(),
            cover: post.first().image_url(),
            images: post.len(),
            score: post.score,
            efficiency: format!("{:.2}", post.efficiency()),
            date: format_date(post.date()),
        }
    }
}

fn rows(posts: &[Post<'_>]) -> Vec<PostRow> {
    posts.iter().map(PostRow::from).collect()
}

pub struct DayRow {
    pub day: String,
    pub posts: Vec<PostRow>,
}

impl From<&DailyPosts<'_>> for DayRow {
    fn from(day: &DailyPosts<'_>) -> Self {
        Self {
            day: day.day.format("%Y-%m-%d").to_string(),
            posts: rows(&day.posts),
        }
    }
}

pub struct LeaderboardRow {
    /// One-based position on the leaderboard.
    pub position: usize,
    /// One-based position by raw score.
    pub raw_position: usize,
    pub id: u64,
    pub page_url: String,
    pub image_url: String,
    pub score: i64,
    pub multiplier: String,
    pub adjusted_score: String,
    pub published: String,
}

/// Image record embedded as JSON for client-side charts.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRecord {
    id: u64,
    #[serde(rename = "imageURL")]
    image_url: String,
    #[serde(rename = "postURL")]
    post_url: String,
    score: i64,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Template)]
#[template(path = "report.html")]
pub struct HtmlReport {
    pub user: String,
    pub generated_at: String,
    pub summary: ScoreSummary,
    pub leaderboard: Vec<LeaderboardRow>,
    pub leaderboard_score: String,
    pub window_days: i64,
    pub posts_by_score: Vec<PostRow>,
    pub posts_by_date: Vec<PostRow>,
    pub posts_by_efficiency: Vec<PostRow>,
    pub best_days: Vec<DayRow>,
    pub worst_days: Vec<DayRow>,
    pub worst_recent: Vec<PostRow>,
    /// Already escaped for a `<script>` element.
    pub images_json: String,
}

impl HtmlReport {
    pub fn build(items: &[Item], rule: ScoringRule, now: DateTime<Utc>) -> Result<Self, askama::Error> {
        let ranking = Ranking::new(items, rule);
        let leaderboard = ranking.leaderboard(now, &LeaderboardConfig::report());
        let window_start = now - Duration::days(LEADERBOARD_WINDOW_DAYS);

        let records: Vec<ImageRecord> = ranking
            .scored()
            .into_iter()
            .map(|scored| ImageRecord {
                id: scored.item.id,
                image_url: scored.item.image_url(),
                post_url: scored.item.post_url(),
                score: scored.score,
                published_at: scored.item.published_at,
            })
            .collect();
        // a literal "</script>" inside a string would end the element early
        let images_json = serde_json::to_string(&records)
            .map_err(|error| askama::Error::Custom(Box::new(error)))?
            .replace("</", "<\\/");

        Ok(Self {
            user: items
                .iter()
                .find_map(|item| item.username.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            generated_at: now.format(DATE_FORMAT).to_string(),
            summary: ranking.summary(),
            leaderboard_score: format!("{:.2}", leaderboard.score()),
            leaderboard: leaderboard_rows(&leaderboard),
            window_days: LEADERBOARD_WINDOW_DAYS,
            posts_by_score: rows(&ranking.posts_by_score()),
            posts_by_date: rows(&ranking.posts_by_date()),
            posts_by_efficiency: rows(&ranking.posts_by_efficiency()),
            best_days: ranking
                .best_posts_per_day(POSTS_PER_DAY)
                .iter()
                .map(DayRow::from)
                .collect(),
            worst_days: ranking
                .worst_posts_per_day(POSTS_PER_DAY)
                .iter()
                .map(DayRow::from)
                .collect(),
            worst_recent: rows(&ranking.worst_efficiency_between(
                window_start,
                now,
                WORST_RECENT_POSTS,
            )),
            images_json,
        })
    }
}

fn leaderboard_rows(leaderboard: &Leaderboard<'_>) -> Vec<LeaderboardRow> {
    leaderboard
        .iter()
        .enumerate()
        .map(|(position, entry)| LeaderboardRow {
            position: position + 1,
            raw_position: entry.rank + 1,
            id: entry.item.id,
            page_url: entry.item.page_url(),
            image_url: entry.item.image_url(),
            score: entry.score,
            multiplier: format!("{:.3}", entry.multiplier),
            adjusted_score: format!("{:.2}", entry.adjusted_score),
            published: format_date(entry.item.published_at),
        })
        .collect()
}

pub struct CsvRow {
    pub id: u64,
    pub post_id: u64,
    pub index: u32,
    pub published_at: String,
    pub score: i64,
    pub image_url: String,
    pub post_url: String,
}

#[derive(Template)]
#[template(path = "report.csv", escape = "none")]
pub struct CsvReport {
    pub rows: Vec<CsvRow>,
}

impl CsvReport {
    pub fn build(items: &[Item], rule: ScoringRule) -> Self {
        let rows = Ranking::new(items, rule)
            .scored()
            .into_iter()
            .map(|scored| CsvRow {
                id: scored.item.id,
                post_id: scored.item.post_id,
                index: scored.item.index,
                published_at: scored
                    .item
                    .published_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
                score: scored.score,
                image_url: scored.item.image_url(),
                post_url: scored.item.post_url(),
            })
            .collect();

        Self { rows }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::item::Stats;
    use chrono::TimeZone;

    fn items() -> Vec<Item> {
        let day = |d: u32| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap();
        let item = |id: u64, post_id: u64, index: u32, like: i64, published: Option<DateTime<Utc>>| Item {
            id,
            post_id,
            index,
            url: format!("key-{id}"),
            username: Some("artist".to_string()),
            published_at: published,
            stats: Stats {
                like,
                ..Default::default()
            },
            ..Default::default()
        };

        vec![
            item(1, 10, 0, 12, Some(day(20))),
            item(2, 10, 1, 3, Some(day(20))),
            item(3, 11, 0, 7, Some(day(25))),
            item(4, 12, 0, 99, None),
        ]
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 30, 0, 0, 0).unwrap()
    }

    #[test]
    fn unpublished_items_are_dropped() {
        let kept = published(items());
        let ids: Vec<u64> = kept.iter().map(|item| item.id).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn csv_has_a_row_per_item() {
        let items = published(items());
        let csv = CsvReport::build(&items, ScoringRule::net()).render().unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "id,post_id,index,published_at,score,image_url,post_url");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("1,10,0,2024-03-20T12:00:00+00:00,12,"));
        assert!(lines[1].ends_with(",https://civitai.com/posts/10"));
        assert!(lines[3].contains(&items[2].image_url()));
    }

    #[test]
    fn html_report_lists_every_published_image() {
        let items = published(items());
        let report = HtmlReport::build(&items, ScoringRule::net(), now()).unwrap();

        assert_eq!(report.user, "artist");
        assert_eq!(report.leaderboard.len(), 3);
        assert_eq!(report.leaderboard[0].id, 1);
        assert_eq!(report.posts_by_score[0].id, 10);
        assert_eq!(report.posts_by_score[0].score, 15);

        let html = report.render().unwrap();
        assert!(html.contains("https://civitai.com/posts/10"));
        assert!(html.contains("https://civitai.com/images/3"));
        assert!(html.contains(&items[0].image_url()));
        assert!(html.contains(r#""imageURL":"#));
        assert!(html.contains("2024-03-25T12:00:00Z"));
    }

    #[test]
    fn post_tables_render_for_every_section() {
        let items = published(items());
        let html = HtmlReport::build(&items, ScoringRule::net(), now())
            .unwrap()
            .render()
            .unwrap();

        // one row per post in the score, date and efficiency tables, the two daily tables and
        // the recent table
        assert_eq!(html.matches(r#"<a href="https://civitai.com/posts/11">11</a>"#).count(), 6);
        assert_eq!(html.matches("<h3>2024-03-20</h3>").count(), 2);
        assert_eq!(html.matches("<h3>2024-03-25</h3>").count(), 2);
    }

    #[test]
    fn script_terminators_are_escaped_in_the_json_island() {
        let mut items = published(items());
        items[0].url = "https://example.com/</script>.png".to_string();

        let report = HtmlReport::build(&items, ScoringRule::net(), now()).unwrap();
        assert!(!report.images_json.contains("</script>"));
    }
}
