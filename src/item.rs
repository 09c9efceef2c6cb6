//! Canonical representation of a Civitai image
//!
//! # Item
//! An [`Item`] is what every API shape gets normalized into before it reaches the ranking engine or the
//! download queue. The REST and tRPC endpoints name their counters differently (`likeCount` vs
//! `likeCountAllTime`), so the mapping happens once in [`api::models`](crate::api::models) and nothing
//! downstream needs to know which endpoint an item came from.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

/// Public website root, used for image and post links.
pub const CIVITAI_BASE_URL: &str = "https://civitai.com";

/// Image CDN root. tRPC items only carry a storage key that has to be expanded against this.
pub const IMAGE_CDN_URL: &str = "https://image.civitai.com/xG1nkqKTMzGDvpLrqFT7WA";

/// Engagement counters that can take part in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Laugh,
    Heart,
    Cry,
    Dislike,
}

/// Engagement counters of a single item.
///
/// `comment`, `collected` and `tipped` are informational only; scoring works exclusively on
/// [`Reaction`]s. Counters missing from a given endpoint stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stats {
    pub like: i64,
    pub laugh: i64,
    pub heart: i64,
    pub cry: i64,
    pub dislike: i64,
    pub comment: i64,
    pub collected: i64,
    pub tipped: i64,
}

impl Stats {
    #[inline]
    pub const fn get(&self, reaction: Reaction) -> i64 {
        match reaction {
            Reaction::Like => self.like,
            Reaction::Laugh => self.laugh,
            Reaction::Heart => self.heart,
            Reaction::Cry => self.cry,
            Reaction::Dislike => self.dislike,
        }
    }
}

/// One image, regardless of the endpoint it was fetched from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Image id. Unique within a fetch session.
    pub id: u64,
    /// Id of the post this image belongs to.
    pub post_id: u64,
    /// Position of the image inside its post.
    #[serde(default)]
    pub index: u32,
    /// Either an absolute URL (REST) or a CDN storage key (tRPC).
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// `None` while the image is not published yet.
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: Stats,
}

impl Item {
    #[inline]
    pub const fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// The publication date, falling back to the creation date for images that the API
    /// returns without one.
    #[inline]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.created_at)
    }

    #[inline]
    fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// Direct URL of the image file.
    pub fn image_url(&self) -> String {
        if self.is_remote() {
            return self.url.clone();
        }
        // some keys come with a leading slash
        let name = self.url.trim_start_matches('/');
        format!("{IMAGE_CDN_URL}/{}/{name}.jpeg", self.url)
    }

    /// Link to the image page on the website.
    #[inline]
    pub fn page_url(&self) -> String {
        format!("{CIVITAI_BASE_URL}/images/{}", self.id)
    }

    /// Link to the post page on the website.
    #[inline]
    pub fn post_url(&self) -> String {
        format!("{CIVITAI_BASE_URL}/posts/{}", self.post_id)
    }

    /// Name of the file this item is saved as.
    pub fn file_name(&self) -> String {
        if self.is_remote() {
            return Url::parse(&self.url)
                .ok()
                .and_then(|url| {
                    url.path_segments()
                        .and_then(|mut segments| segments.next_back().map(str::to_string))
                })
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("{}.jpeg", self.id));
        }
        format!("{}.jpeg", self.url.trim_start_matches('/'))
    }
}

/// Deserializes an optional RFC 3339 timestamp, mapping the zero values some endpoints send for
/// "not set" (`0001-01-01T00:00:00Z`, the Unix epoch) to `None`.
pub(crate) fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<DateTime<Utc>> = Option::deserialize(deserializer)?;
    Ok(value.filter(|ts| ts.timestamp() > 0))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_timestamps_are_unpublished() {
        let item: Item = serde_json::from_value(json!({
            "id": 1,
            "postId": 2,
            "publishedAt": "0001-01-01T00:00:00Z",
            "createdAt": "2024-03-07T10:00:00Z"
        }))
        .unwrap();

        assert!(!item.is_published());
        assert!(item.created_at.is_some());
        assert_eq!(item.date(), item.created_at);

        let item: Item = serde_json::from_value(json!({
            "id": 1,
            "postId": 2,
            "publishedAt": null
        }))
        .unwrap();
        assert!(!item.is_published());
    }

    #[test]
    fn storage_keys_expand_to_cdn_urls() {
        let item = Item {
            id: 7,
            post_id: 3,
            url: "/abc-123".to_string(),
            ..Default::default()
        };

        assert_eq!(
            item.image_url(),
            format!("{IMAGE_CDN_URL}//abc-123/abc-123.jpeg")
        );
        assert_eq!(item.file_name(), "abc-123.jpeg");
        assert_eq!(item.page_url(), "https://civitai.com/images/7");
        assert_eq!(item.post_url(), "https://civitai.com/posts/3");
    }

    #[test]
    fn remote_urls_are_used_verbatim() {
        let item = Item {
            id: 7,
            url: "https://image.civitai.com/key/width=512/photo.png".to_string(),
            ..Default::default()
        };

        assert_eq!(item.image_url(), item.url);
        assert_eq!(item.file_name(), "photo.png");
    }
}
