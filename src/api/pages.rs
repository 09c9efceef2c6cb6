use std::{future::Future, marker::PhantomData};

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::pagination::{Page, PageShape, PageSource};

use super::{checked, error::ApiError};

/// [`PageSource`] that GETs each target over HTTP.
///
/// Bodies are decoded as `R` (the wire record of the endpoint) and converted into `T` before they
/// reach the [`Paginator`](crate::pagination::Paginator).
#[derive(Debug, Clone)]
pub struct HttpPages<R, T = R> {
    client: Client,
    shape: PageShape,
    _records: PhantomData<fn(R) -> T>,
}

impl<R, T> HttpPages<R, T> {
    pub fn new(client: Client, shape: PageShape) -> Self {
        Self {
            client,
            shape,
            _records: PhantomData,
        }
    }
}

impl<R, T> PageSource<T> for HttpPages<R, T>
where
    R: DeserializeOwned,
    T: From<R> + Send,
{
    fn fetch_page(&mut self, target: &str) -> impl Future<Output = Result<Page<T>, ApiError>> + Send {
        let request = self.client.get(target);
        let shape = self.shape;

        async move {
            let body = checked(request).await?.bytes().await?;
            let page = shape.decode::<R>(&body)?;
            Ok::<_, ApiError>(page.map(T::from))
        }
    }
}
