use serde::{de::DeserializeOwned, Deserialize};

use crate::api::{error::ApiError, trpc::TrpcEnvelope};

/// A single decoded page: the items it carried and where to go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Next-page URL or cursor token. Never `Some("")`.
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    /// Builds a page, treating an empty continuation as the end of the sequence.
    pub fn new(items: Vec<T>, continuation: Option<String>) -> Self {
        Self {
            items,
            continuation: continuation.filter(|token| !token.is_empty()),
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            continuation: self.continuation,
        }
    }
}

/// The two envelopes paged endpoints wrap their items in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    /// REST: `{ items: [..], metadata: { nextPage: "<url>" } }`
    Offset,
    /// tRPC: `{ result: { data: { json: { items: [..], nextCursor: "<token>" } } } }`
    Cursor,
}

impl PageShape {
    /// Decodes a response body into a page of raw wire records.
    pub fn decode<R: DeserializeOwned>(self, body: &[u8]) -> Result<Page<R>, ApiError> {
        match self {
            Self::Offset => {
                let envelope: OffsetEnvelope<R> = serde_json::from_slice(body)?;
                Ok(Page::new(envelope.items, envelope.metadata.next_page))
            }
            Self::Cursor => {
                let envelope: CursorEnvelope<R> = serde_json::from_slice(body)?;
                let json = envelope.into_inner();
                Ok(Page::new(json.items, json.next_cursor))
            }
        }
    }
}

#[derive(Deserialize)]
struct OffsetEnvelope<R> {
    #[serde(default = "Vec::new")]
    items: Vec<R>,
    #[serde(default)]
    metadata: OffsetMetadata,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OffsetMetadata {
    #[serde(default)]
    next_page: Option<String>,
}

type CursorEnvelope<R> = TrpcEnvelope<CursorItems<R>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorItems<R> {
    #[serde(default = "Vec::new")]
    items: Vec<R>,
    #[serde(default)]
    next_cursor: Option<String>,
}
