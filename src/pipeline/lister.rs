//! Paginated listing as a lazy stream of records

use crate::error::{Result, SweepError};
use crate::provider::{ComputeApi, ListQuery, ResourceKind, ResourceRecord};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

/// Lists one resource kind by following page tokens until exhausted.
///
/// Each call to [`Lister::stream`] starts again from the first page. Nothing
/// is fetched until the stream is polled, and a failed page call ends the
/// stream with that error.
pub struct Lister<'a> {
    api: &'a dyn ComputeApi,
}

impl<'a> Lister<'a> {
    pub fn new(api: &'a dyn ComputeApi) -> Self {
        Self { api }
    }

    pub fn stream(
        &self,
        kind: ResourceKind,
        query: ListQuery,
    ) -> BoxStream<'a, Result<ResourceRecord>> {
        let api = self.api;
        // Outer None: exhausted. Inner None: first page.
        stream::try_unfold(Some(None::<String>), move |cursor| {
            let query = query.clone();
            async move {
                let Some(token) = cursor else {
                    return Ok::<_, SweepError>(None);
                };
                let page = api.list_page(kind, &query, token).await?;
                debug!(
                    "Listed {} {}(s) in {}, more pages: {}",
                    page.records.len(),
                    kind,
                    api.region(),
                    page.next_token.is_some()
                );
                let next = page
                    .next_token
                    .filter(|t| kind.is_paginated() && !t.is_empty())
                    .map(Some);
                let records = stream::iter(page.records.into_iter().map(Ok::<_, SweepError>));
                Ok(Some((records, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Drain the whole listing
    pub async fn collect(&self, kind: ResourceKind, query: ListQuery) -> Result<Vec<ResourceRecord>> {
        self.stream(kind, query).try_collect().await
    }
}
