//! Storage backend connectors.
//!
//! Every backend (object-storage bucket, managed sequence store, managed
//! reference store) is reached through a narrow client trait and wrapped in a
//! [`BackendConnector`], so the search orchestrator is written once against
//! the connector trait:
//!
//! ```text
//!   SearchOrchestrator
//!          │  list() / get_tags_batch()
//!          ▼
//!   BackendConnector ◄── ObjectStoreConnector ── ObjectStoreClient (S3, local dir, memory)
//!                    ◄── SequenceStoreConnector ── SequenceStoreClient
//!                    ◄── ReferenceStoreConnector ── ReferenceStoreClient
//! ```
//!
//! Listing is exposed as a lazy stream that walks the backend's pagination
//! transparently. Streams are restartable: each call to `list` re-lists from
//! the backend.

mod error;
pub mod local;
pub mod memory;
pub mod object_store;
pub mod reference_store;
mod registry;
pub mod sequence_store;

pub use error::{BackendError, BackendResult};
pub use local::LocalDirectoryClient;
pub use object_store::{ObjectPage, ObjectStoreClient, ObjectStoreConnector, ObjectSummary};
pub use reference_store::{
    ReferencePage, ReferenceStoreClient, ReferenceStoreConnector, ReferenceSummary,
};
pub use registry::BackendRegistry;
pub use sequence_store::{
    ReadSetFormat, ReadSetPage, ReadSetPart, ReadSetPartKind, ReadSetSummary, SequenceStoreClient,
    SequenceStoreConnector,
};

use crate::models::{FileRecord, TagSet};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use strum::{Display, EnumString};

/// Lazy sequence of records produced by one `list` call
pub type RecordStream<'a> = BoxStream<'a, BackendResult<FileRecord>>;

/// Backend family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    ObjectStore,
    SequenceStore,
    ReferenceStore,
}

/// Identity and placement of a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique id, used as `FileRecord::backend_id`
    pub id: String,

    pub kind: BackendKind,

    /// Bucket, directory or store id
    pub location: String,

    /// Disabled backends stay registered but are never searched
    pub enabled: bool,
}

impl BackendDescriptor {
    pub fn new(id: impl Into<String>, kind: BackendKind, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            location: location.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Paging parameters for one listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRequest {
    /// Items requested per page
    pub page_size: usize,

    /// Stop after this many pages; `None` lists everything
    pub max_pages: Option<usize>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: None,
        }
    }
}

/// A searchable storage backend
#[async_trait]
pub trait BackendConnector: Send + Sync + 'static {
    /// Backend identity
    fn descriptor(&self) -> &BackendDescriptor;

    /// List every record in scope as a lazy, paginated stream
    fn list(&self, request: ListRequest) -> RecordStream<'_>;

    /// Fetch tags for a batch of records, keyed by record path.
    ///
    /// Callers keep batches within the configured batch size; records
    /// without tags may be omitted from the returned map.
    async fn get_tags_batch(&self, records: &[FileRecord]) -> BackendResult<HashMap<String, TagSet>>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Turn a token-paginated fetch function into a flat record stream.
///
/// `fetch` receives the continuation token (`None` for the first page) and
/// returns the page items plus the next token.
pub(crate) fn paginate<'a, T, F, Fut>(
    backend_id: String,
    max_pages: Option<usize>,
    fetch: F,
) -> BoxStream<'a, BackendResult<T>>
where
    T: Send + 'a,
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = BackendResult<(Vec<T>, Option<String>)>> + Send + 'a,
{
    let pages = stream::try_unfold(
        (Cursor::Start, 0usize, fetch),
        move |(cursor, fetched, mut fetch)| {
            let backend_id = backend_id.clone();
            async move {
                let token = match cursor {
                    Cursor::Done => return Ok(None),
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                };

                if max_pages.is_some_and(|max| fetched >= max) {
                    tracing::debug!(backend = %backend_id, pages = fetched, "Page budget exhausted");
                    return Ok(None);
                }

                let (items, next) = fetch(token).await?;
                let cursor = match next {
                    Some(token) if !token.is_empty() => Cursor::Next(token),
                    _ => Cursor::Done,
                };

                Ok::<_, BackendError>(Some((items, (cursor, fetched + 1, fetch))))
            }
        },
    );

    pages
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, BackendError>)))
        .try_flatten()
        .boxed()
}

/// Split `items` into batches no larger than `max`
pub fn batches<T>(items: &[T], max: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(max.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn numbered_pages(calls: Arc<AtomicUsize>) -> BoxStream<'static, BackendResult<u32>> {
        paginate("test".to_string(), None, move |token: Option<String>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let page: u32 = token.map(|t| t.parse().unwrap()).unwrap_or(0);
                let items = vec![page * 10, page * 10 + 1];
                let next = (page < 2).then(|| (page + 1).to_string());
                Ok::<_, BackendError>((items, next))
            }
        })
    }

    #[tokio::test]
    async fn test_paginate_flattens_all_pages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = numbered_pages(calls.clone()).try_collect().await.unwrap();

        assert_eq!(items, vec![0, 1, 10, 11, 20, 21]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_paginate_respects_page_budget() {
        let stream = paginate("test".to_string(), Some(2), |token: Option<String>| async move {
            let page: u32 = token.map(|t| t.parse().unwrap()).unwrap_or(0);
            Ok::<_, BackendError>((vec![page], Some((page + 1).to_string())))
        });
        let items: Vec<u32> = stream.try_collect().await.unwrap();
        assert_eq!(items, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_paginate_surfaces_errors_after_yielding() {
        let stream = paginate("flaky".to_string(), None, |token: Option<String>| async move {
            match token {
                None => Ok((vec![1u32, 2], Some("next".to_string()))),
                Some(_) => Err(BackendError::unavailable("flaky", "connection reset")),
            }
        });
        let results: Vec<_> = stream.collect().await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[2].is_err());
    }

    #[test]
    fn test_batches() {
        let items: Vec<u32> = (0..7).collect();
        let sizes: Vec<usize> = batches(&items, 3).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(batches(&items, 0).count(), 7);
    }
}
