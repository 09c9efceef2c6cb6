//! Wire records returned by the Civitai endpoints.
//!
//! The REST and tRPC image records are converted into the canonical [`Item`] right after decoding;
//! the other records are used as-is by the commands that need them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{optional_timestamp, Item, Stats};

/// Image record of `GET /api/v1/images`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RestImage {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub post_id: Option<u64>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: RestStats,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RestStats {
    pub cry_count: i64,
    pub laugh_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub heart_count: i64,
    pub comment_count: i64,
}

impl From<RestImage> for Item {
    fn from(image: RestImage) -> Self {
        let stats = image.stats;
        Self {
            id: image.id,
            post_id: image.post_id.unwrap_or_default(),
            index: image.index.unwrap_or_default(),
            url: image.url,
            width: image.width,
            height: image.height,
            hash: image.hash,
            username: image.username,
            created_at: image.created_at,
            published_at: image.published_at,
            stats: Stats {
                like: stats.like_count,
                laugh: stats.laugh_count,
                heart: stats.heart_count,
                cry: stats.cry_count,
                dislike: stats.dislike_count,
                comment: stats.comment_count,
                ..Default::default()
            },
        }
    }
}

/// Image record of the `image.getInfinite` and `image.get` procedures.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrpcImage {
    pub id: u64,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub post_id: Option<u64>,
    /// Storage key, not a URL.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: TrpcStats,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TrpcStats {
    pub like_count_all_time: i64,
    pub laugh_count_all_time: i64,
    pub heart_count_all_time: i64,
    pub cry_count_all_time: i64,
    pub dislike_count_all_time: i64,
    pub comment_count_all_time: i64,
    pub collected_count_all_time: i64,
    pub tipped_amount_count_all_time: i64,
}

impl From<TrpcImage> for Item {
    fn from(image: TrpcImage) -> Self {
        let stats = image.stats;
        Self {
            id: image.id,
            post_id: image.post_id.unwrap_or_default(),
            index: image.index.unwrap_or_default(),
            url: image.url,
            width: image.width,
            height: image.height,
            hash: image.hash,
            username: image.user.map(|user| user.username),
            created_at: image.created_at,
            published_at: image.published_at,
            stats: Stats {
                like: stats.like_count_all_time,
                laugh: stats.laugh_count_all_time,
                heart: stats.heart_count_all_time,
                cry: stats.cry_count_all_time,
                dislike: stats.dislike_count_all_time,
                comment: stats.comment_count_all_time,
                collected: stats.collected_count_all_time,
                tipped: stats.tipped_amount_count_all_time,
            },
        }
    }
}

/// One on-site generation job.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItem {
    pub id: String,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<GenerationStep>,
}

impl GeneratedItem {
    /// Every image produced by the job, across all of its steps.
    pub fn images(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.steps.iter().flat_map(|step| step.images.iter())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct GenerationStep {
    #[serde(default)]
    pub images: Vec<GeneratedImage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GeneratedImage {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
    /// `None` while the job is still running.
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub model_versions: Vec<ModelVersion>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelVersion {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub rank: Option<ModelRank>,
}

impl ModelVersion {
    #[inline]
    pub fn generations(&self) -> i64 {
        self.rank
            .as_ref()
            .map_or(0, |rank| rank.generation_count_all_time)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelRank {
    pub generation_count_all_time: i64,
    pub download_count_all_time: i64,
    pub rating_count_all_time: i64,
    pub rating_all_time: f64,
    pub thumbs_up_count_all_time: i64,
    pub thumbs_down_count_all_time: i64,
}

/// State of the creator program payout pool.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default)]
pub struct CompensationPool {
    /// Pool value in US dollars.
    pub value: f64,
    #[serde(default)]
    pub size: PoolSize,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default)]
#[serde(default)]
pub struct PoolSize {
    /// Banked buzz so far.
    pub current: f64,
    pub forecasted: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub username: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct UserLists {
    pub following: Vec<User>,
    pub followers: Vec<User>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::item::Reaction;
    use serde_json::json;

    #[test]
    fn rest_counters_map_onto_canonical_stats() {
        let image: RestImage = serde_json::from_value(json!({
            "id": 11,
            "url": "https://image.civitai.com/key/original=true/11.jpeg",
            "postId": 4,
            "username": "artist",
            "publishedAt": "2024-03-07T10:00:00.000Z",
            "stats": {
                "likeCount": 3, "heartCount": 2, "laughCount": 1,
                "cryCount": 0, "dislikeCount": 5, "commentCount": 9
            }
        }))
        .unwrap();

        let item = Item::from(image);
        assert_eq!(item.post_id, 4);
        assert_eq!(item.stats.get(Reaction::Like), 3);
        assert_eq!(item.stats.get(Reaction::Dislike), 5);
        assert_eq!(item.stats.comment, 9);
        assert_eq!(item.username.as_deref(), Some("artist"));
        assert!(item.is_published());
    }

    #[test]
    fn trpc_all_time_counters_map_onto_canonical_stats() {
        let image: TrpcImage = serde_json::from_value(json!({
            "id": 12,
            "index": 2,
            "postId": 4,
            "url": "0f2c-key",
            "publishedAt": null,
            "stats": {
                "likeCountAllTime": 7, "heartCountAllTime": 1,
                "collectedCountAllTime": 4, "tippedAmountCountAllTime": 100
            },
            "user": { "id": 1, "username": "artist" }
        }))
        .unwrap();

        let item = Item::from(image);
        assert_eq!(item.index, 2);
        assert_eq!(item.stats.like, 7);
        assert_eq!(item.stats.dislike, 0);
        assert_eq!(item.stats.collected, 4);
        assert_eq!(item.stats.tipped, 100);
        assert_eq!(item.username.as_deref(), Some("artist"));
        assert!(!item.is_published());
    }

    #[test]
    fn generated_images_flatten_across_steps() {
        let job: GeneratedItem = serde_json::from_value(json!({
            "id": "job-1",
            "createdAt": "2024-03-07T10:00:00Z",
            "steps": [
                { "images": [{ "type": "image", "id": "a", "url": "https://x/a", "completed": "2024-03-07T10:01:00Z" }] },
                { "images": [{ "type": "image", "id": "b", "completed": null }] }
            ]
        }))
        .unwrap();

        let ids: Vec<&str> = job.images().map(|image| image.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(job.images().nth(1).unwrap().completed.is_none());
    }

    #[test]
    fn model_versions_without_rank_have_no_generations() {
        let model: Model = serde_json::from_value(json!({
            "id": 1,
            "name": "Model",
            "modelVersions": [
                { "id": 2, "name": "v1", "rank": { "generationCountAllTime": 40 } },
                { "id": 3, "name": "v2" }
            ]
        }))
        .unwrap();

        assert_eq!(model.model_versions[0].generations(), 40);
        assert_eq!(model.model_versions[1].generations(), 0);
    }
}
