//! Civitai API client
//!
//! # Endpoints
//! Civitai exposes two APIs side by side:
//!
//! * the public REST API under `/api/v1`, paged with `nextPage` URLs;
//! * the tRPC API used by the website under `/api/trpc`, paged with cursors.
//!
//! Both are reached through one [`CivitaiClient`]. Paged endpoints return a
//! [`Paginator`] that yields canonical [`Item`]s; single-record endpoints return their
//! [`models`] record directly.
use std::sync::Arc;

use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    item::{Item, CIVITAI_BASE_URL},
    pagination::{guarded, PageShape, Paginator},
};

use self::{
    cookies::CookieFile,
    error::ApiError,
    models::{
        CompensationPool, GeneratedItem, Model, RestImage, TrpcImage, User, UserLists,
    },
    pages::HttpPages,
    trpc::TrpcEnvelope,
};

pub mod cookies;
pub mod error;
pub mod models;
pub mod pages;
pub(crate) mod trpc;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("Civitai Downloader/", env!("CARGO_PKG_VERSION"));

/// Content rating filter covering every level.
const ALL_BROWSING_LEVELS: u32 = 31;

/// Images coming from a REST endpoint.
pub type RestImages = Paginator<Item, HttpPages<RestImage, Item>>;

/// Images coming from a tRPC endpoint.
pub type TrpcImages = Paginator<Item, HttpPages<TrpcImage, Item>>;

pub type GeneratedImages = Paginator<GeneratedItem, HttpPages<GeneratedItem>>;

/// Authenticated client for both Civitai APIs.
///
/// Cloning is cheap; all clones share the same connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct CivitaiClient {
    client: Client,
    base_url: String,
    cancel: Option<CancellationToken>,
}

impl CivitaiClient {
    /// Builds a client that authenticates with `api_key` and, when given, keeps its session
    /// cookies in `cookies`.
    pub fn new(api_key: &str, cookies: Option<Arc<CookieFile>>) -> Result<Self, ApiError> {
        let mut auth =
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| ApiError::InvalidApiKey)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers);

        if let Some(jar) = cookies {
            debug!("Using cookie file {}", jar.path().display());
            builder = builder.cookie_provider(jar);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: CIVITAI_BASE_URL.to_string(),
            cancel: None,
        })
    }

    /// Points the client at another host. Used to test against a local server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Every request made afterwards, paginated or not, stops with [`ApiError::Cancelled`] once
    /// `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The underlying HTTP client, for downloading assets with the same session.
    #[inline]
    pub fn http(&self) -> &Client {
        &self.client
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn paginate<R, T>(&self, pages: Paginator<T, HttpPages<R, T>>) -> Paginator<T, HttpPages<R, T>>
    where
        R: DeserializeOwned,
        T: From<R> + Send,
    {
        match &self.cancel {
            Some(token) => pages.with_cancellation(token.clone()),
            None => pages,
        }
    }

    fn rest_images(&self, filter: (&str, &str)) -> Result<RestImages, ApiError> {
        let mut url = Url::parse(&format!("{}/api/v1/images", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("nsfw", "X")
            .append_pair(filter.0, filter.1);

        let source = HttpPages::new(self.client.clone(), PageShape::Offset);
        Ok(self.paginate(Paginator::next_page(source, url)))
    }

    /// Every image of `username`, from the REST API.
    pub fn rest_images_for_user(&self, username: &str) -> Result<RestImages, ApiError> {
        self.rest_images(("username", username))
    }

    /// Every image of a post, from the REST API.
    pub fn rest_images_for_post(&self, post_id: u64) -> Result<RestImages, ApiError> {
        self.rest_images(("postId", &post_id.to_string()))
    }

    fn cursor_pages<R, T>(&self, procedure: &'static str, fields: Value) -> Paginator<T, HttpPages<R, T>>
    where
        R: DeserializeOwned,
        T: From<R> + Send,
    {
        let base_url = self.base_url.clone();
        let source = HttpPages::new(self.client.clone(), PageShape::Cursor);

        self.paginate(Paginator::cursor(source, move |cursor| {
            trpc::query_url(&base_url, procedure, &trpc::cursor_input(fields.clone(), cursor))
        }))
    }

    /// Every image of a user, newest first. This is the query the profile page makes.
    pub fn images_for_user(&self, username: &str, user_id: u64) -> TrpcImages {
        self.cursor_pages(
            "image.getInfinite",
            json!({
                "period": "AllTime",
                "sort": "Newest",
                "types": ["image"],
                "username": username,
                "withMeta": false,
                "fromPlatform": false,
                "userId": user_id,
                "useIndex": true,
                "browsingLevel": ALL_BROWSING_LEVELS,
                "include": ["cosmetics"],
            }),
        )
    }

    /// Every image of a user when only the name is known.
    pub fn images_for_username(&self, username: &str) -> TrpcImages {
        self.cursor_pages(
            "image.getInfinite",
            json!({
                "username": username,
                "useIndex": true,
                "browsingLevel": ALL_BROWSING_LEVELS,
            }),
        )
    }

    /// Every image of a post, including the ones not published yet.
    pub fn images_for_post(&self, post_id: u64) -> TrpcImages {
        self.cursor_pages(
            "image.getInfinite",
            json!({
                "postId": post_id,
                "pending": true,
                "browsingLevel": null,
            }),
        )
    }

    /// Generation jobs of the authenticated user.
    pub fn generated_images(&self) -> GeneratedImages {
        self.cursor_pages("orchestrator.queryGeneratedImages", json!({ "tags": ["gen"] }))
    }

    /// Runs a single tRPC query and unwraps its payload.
    async fn query<T: DeserializeOwned>(&self, procedure: &str, input: Value) -> Result<T, ApiError> {
        let url = trpc::query_url(&self.base_url, procedure, &trpc::input(input));
        debug!("Querying {}", procedure);

        let request = self.client.get(url);
        let body = self
            .guard(async { Ok::<_, ApiError>(checked(request).await?.bytes().await?) })
            .await?;

        let envelope: TrpcEnvelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.into_inner())
    }

    async fn guard<F, T>(&self, request: F) -> Result<T, ApiError>
    where
        F: std::future::Future<Output = Result<T, ApiError>>,
    {
        guarded(request, self.cancel.as_ref(), None).await
    }

    pub async fn image(&self, id: u64) -> Result<Item, ApiError> {
        let image: TrpcImage = self.query("image.get", json!({ "id": id })).await?;
        Ok(image.into())
    }

    pub async fn model(&self, id: u64) -> Result<Model, ApiError> {
        self.query("model.getById", json!({ "id": id })).await
    }

    /// Current state of the creator program compensation pool.
    pub async fn compensation_pool(&self) -> Result<CompensationPool, ApiError> {
        self.query("creatorProgram.getCompensationPool", json!({})).await
    }

    /// Users followed by the authenticated user. Not paged.
    pub async fn users_following(&self) -> Result<Vec<User>, ApiError> {
        self.query("user.getFollowingUsers", json!({})).await
    }

    pub async fn lists_for_user(&self, username: &str) -> Result<UserLists, ApiError> {
        self.query("user.getLists", json!({ "username": username })).await
    }

    /// Pins an image to the authenticated user's profile showcase.
    pub async fn add_image_to_showcase(&self, image_id: u64) -> Result<(), ApiError> {
        let url = trpc::mutation_url(&self.base_url, "userProfile.addEntityToShowcase");
        let request = self.client.post(url).json(&json!({
            "json": {
                "entityId": image_id,
                "entityType": "Image",
                "authed": true,
            }
        }));

        self.guard(async { checked(request).await.map(drop) }).await
    }
}

/// Sends `request`, turning non-success statuses into [`ApiError::Status`].
pub(crate) async fn checked(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            url: response.url().to_string(),
        });
    }

    Ok(response)
}

#[cfg(test)]
mod test {
    use super::*;
    use wiremock::{
        matchers::{body_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn client(server: &MockServer) -> CivitaiClient {
        CivitaiClient::new("secret", None)
            .unwrap()
            .with_base_url(server.uri())
    }

    fn trpc_body(json: Value) -> Value {
        json!({ "result": { "data": { "json": json } } })
    }

    #[tokio::test]
    async fn requests_carry_the_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/trpc/creatorProgram.getCompensationPool"))
            .and(header("authorization", "Bearer secret"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(trpc_body(json!({
                "value": 12500.5,
                "size": { "current": 1000000.0, "forecasted": 2500000.0 }
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let pool = client(&server).compensation_pool().await.unwrap();
        assert_eq!(pool.value, 12500.5);
        assert_eq!(pool.size.forecasted, 2_500_000.0);
    }

    #[tokio::test]
    async fn post_images_follow_cursors() {
        let server = MockServer::start().await;

        let first = trpc::cursor_input(
            json!({ "postId": 9, "pending": true, "browsingLevel": null }),
            None,
        );
        let second = trpc::cursor_input(
            json!({ "postId": 9, "pending": true, "browsingLevel": null }),
            Some("c2"),
        );

        Mock::given(method("GET"))
            .and(path("/api/trpc/image.getInfinite"))
            .and(query_param("input", first.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(trpc_body(json!({
                "items": [{ "id": 1, "postId": 9, "index": 0, "url": "k1" }],
                "nextCursor": "c2"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/trpc/image.getInfinite"))
            .and(query_param("input", second.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(trpc_body(json!({
                "items": [{ "id": 2, "postId": 9, "index": 1, "url": "k2" }],
                "nextCursor": null
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let mut images = client(&server).images_for_post(9);
        let mut ids = Vec::new();
        while let Some(image) = images.next().await {
            ids.push(image.id);
        }

        assert!(images.error().is_none());
        assert_eq!(ids, [1, 2]);
        assert_eq!(images.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn rest_images_filter_by_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/images"))
            .and(query_param("nsfw", "X"))
            .and(query_param("username", "some one"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": 5, "postId": 2, "stats": { "likeCount": 4 } }],
                "metadata": {}
            })))
            .mount(&server)
            .await;

        let items = client(&server)
            .rest_images_for_user("some one")
            .unwrap()
            .collect()
            .await
            .into_result()
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].stats.like, 4);
    }

    #[tokio::test]
    async fn showcase_additions_post_the_image_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trpc/userProfile.addEntityToShowcase"))
            .and(body_json(json!({
                "json": { "entityId": 77, "entityType": "Image", "authed": true }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).add_image_to_showcase(77).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_clients_make_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(trpc_body(json!([]))))
            .expect(0)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let client = client(&server).with_cancellation(token);

        let result = client.users_following().await;
        assert!(matches!(result, Err(ApiError::Cancelled)));

        let mut images = client.images_for_username("someone");
        assert!(images.next().await.is_none());
        assert!(matches!(images.error(), Some(ApiError::Cancelled)));
    }
}
