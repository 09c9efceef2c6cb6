//! Sequential, single-use pagination over the two paging conventions of the Civitai API.
//!
//! # Paginator
//! A [`Paginator`] buffers one page at a time and only goes back to the server once the buffer is
//! drained, so there is never more than one request in flight. It knows two ways of getting to the
//! next page:
//!
//! * **next-page URLs**, returned verbatim by the REST API and followed as-is (relative URLs are
//!   resolved against the request that produced them);
//! * **cursors**, returned by the tRPC API and turned into the next request by a caller-supplied
//!   builder.
//!
//! Both behave the same from the outside: items come out in server order, the sequence ends when the
//! server stops handing out continuations or sends a page without items, and the first failure ends
//! it for good. Each advance performs at most one request.
//!
//! ```rust,no_run
//! use civitai_downloader::api::CivitaiClient;
//!
//! async fn test(client: CivitaiClient) {
//!     let mut images = client.images_for_post(1234);
//!
//!     while let Some(image) = images.next().await {
//!         println!("{} -> {}", image.id, image.image_url());
//!     }
//!
//!     if let Some(error) = images.error() {
//!         eprintln!("stopped early: {error}");
//!     }
//! }
//! ```
use std::{collections::VecDeque, future::Future};

use ahash::AHashSet;
use futures::Stream;
use log::{debug, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::error::ApiError;

pub use self::page::{Page, PageShape};

pub mod page;

/// Builds the request target for a cursor. `None` asks for the first page.
pub type CursorBuilder = Box<dyn Fn(Option<&str>) -> String + Send + Sync>;

/// Anything able to turn a request target into a decoded [`Page`].
///
/// The HTTP implementation lives in [`api`](crate::api::pages::HttpPages); tests use scripted sources.
pub trait PageSource<T> {
    fn fetch_page(
        &mut self,
        target: &str,
    ) -> impl Future<Output = Result<Page<T>, ApiError>> + Send;
}

enum Continuation {
    NextPage,
    Cursor(CursorBuilder),
}

/// Lazy, forward-only sequence of items spread over several pages.
pub struct Paginator<T, S> {
    source: S,
    continuation: Continuation,
    buffer: VecDeque<T>,
    next_target: Option<String>,
    /// Targets already requested, so a cycle in the continuations is fetched only once.
    visited: AHashSet<String>,
    error: Option<ApiError>,
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
    pages_fetched: usize,
}

/// Everything a paginator produced before it stopped.
#[derive(Debug)]
pub struct Collected<T> {
    pub items: Vec<T>,
    /// The failure that ended pagination, if it did not end normally.
    pub error: Option<ApiError>,
}

impl<T> Collected<T> {
    /// Drops the partial items if pagination failed.
    pub fn into_result(self) -> Result<Vec<T>, ApiError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.items),
        }
    }
}

impl<T, S> Paginator<T, S>
where
    S: PageSource<T>,
{
    /// Starts at `seed` and follows the `nextPage` URL of every response.
    pub fn next_page(source: S, seed: impl Into<String>) -> Self {
        Self::with_continuation(source, Continuation::NextPage, seed.into())
    }

    /// Starts at `builder(None)` and requests `builder(Some(cursor))` for every cursor returned.
    pub fn cursor<F>(source: S, builder: F) -> Self
    where
        F: Fn(Option<&str>) -> String + Send + Sync + 'static,
    {
        let seed = builder(None);
        Self::with_continuation(source, Continuation::Cursor(Box::new(builder)), seed)
    }

    fn with_continuation(source: S, continuation: Continuation, seed: String) -> Self {
        Self {
            source,
            continuation,
            buffer: VecDeque::new(),
            next_target: Some(seed),
            visited: AHashSet::new(),
            error: None,
            cancel: None,
            deadline: None,
            pages_fetched: 0,
        }
    }

    /// Stops pagination with [`ApiError::Cancelled`] as soon as `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Stops pagination with [`ApiError::DeadlineExceeded`] once `deadline` passes.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the next item, fetching a new page when the buffer runs dry.
    ///
    /// Returns `None` once the source is exhausted or a fetch failed; check [`error`](Self::error)
    /// to tell the two apart.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(item) = self.buffer.pop_front() {
            return Some(item);
        }

        if self.error.is_some() {
            return None;
        }

        let target = self.next_target.take()?;
        self.fetch(target).await;
        self.buffer.pop_front()
    }

    /// The error that stopped pagination, if any.
    #[inline]
    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    #[inline]
    pub fn take_error(&mut self) -> Option<ApiError> {
        self.error.take()
    }

    /// Number of pages successfully fetched so far.
    #[inline]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Drains the paginator, keeping every item fetched before a failure.
    pub async fn collect(mut self) -> Collected<T> {
        let mut items = Vec::new();

        while let Some(item) = self.next().await {
            items.push(item);
        }

        Collected {
            items,
            error: self.error.take(),
        }
    }

    /// Turns the paginator into a stream that yields every item and then, if pagination failed,
    /// the error exactly once.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, ApiError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut pages = state?;
            match pages.next().await {
                Some(item) => Some((Ok(item), Some(pages))),
                None => pages.error.take().map(|error| (Err(error), None)),
            }
        })
    }

    async fn fetch(&mut self, target: String) {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            self.error = Some(ApiError::Cancelled);
            return;
        }

        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            self.error = Some(ApiError::DeadlineExceeded);
            return;
        }

        debug!("Fetching page {} from {target}", self.pages_fetched + 1);

        let request = self.source.fetch_page(&target);
        let result = guarded(request, self.cancel.as_ref(), self.deadline).await;

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                debug!("Pagination stopped after {} pages: {error}", self.pages_fetched);
                self.error = Some(error);
                return;
            }
        };

        self.pages_fetched += 1;
        debug!("Page {} carried {} items", self.pages_fetched, page.items.len());

        if page.items.is_empty() {
            return;
        }
        self.buffer.extend(page.items);

        let Some(token) = page.continuation else {
            return;
        };

        let next = self.resolve(&target, &token);
        self.visited.insert(target);

        match next {
            Ok(next) if self.visited.contains(&next) => {
                warn!("Server pointed back to an already fetched page ({next}), stopping");
            }
            Ok(next) => self.next_target = Some(next),
            Err(error) => self.error = Some(error),
        }
    }

    fn resolve(&self, current: &str, token: &str) -> Result<String, ApiError> {
        match &self.continuation {
            Continuation::Cursor(builder) => Ok(builder(Some(token))),
            Continuation::NextPage => match Url::parse(token) {
                Ok(url) => Ok(url.into()),
                Err(url::ParseError::RelativeUrlWithoutBase) => {
                    Ok(Url::parse(current)?.join(token)?.into())
                }
                Err(error) => Err(error.into()),
            },
        }
    }
}

/// Races a fetch against the caller's cancellation scope.
pub(crate) async fn guarded<F, T>(
    request: F,
    cancel: Option<&CancellationToken>,
    deadline: Option<Instant>,
) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        () = cancelled => Err(ApiError::Cancelled),
        () = expired => Err(ApiError::DeadlineExceeded),
        result = request => result,
    }
}
