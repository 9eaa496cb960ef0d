//! Object-storage bucket connector

use super::{paginate, BackendConnector, BackendDescriptor, BackendError, BackendResult, ListRequest, RecordStream};
use crate::models::{FileRecord, StorageTier, TagSet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;

/// One listed object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,

    /// Provider storage class, e.g. `STANDARD` or `GLACIER`
    pub storage_class: Option<String>,
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    pub next_token: Option<String>,
}

/// Narrow client over an object-storage service
#[async_trait]
pub trait ObjectStoreClient: Send + Sync + 'static {
    /// URI scheme used for access URIs (`s3`, `file`, `mem`)
    fn scheme(&self) -> &str;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> BackendResult<ObjectPage>;

    /// Tags per key; keys without tags may be omitted
    async fn get_object_tags(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> BackendResult<HashMap<String, TagSet>>;
}

/// Connector exposing one bucket (optionally narrowed to a prefix)
pub struct ObjectStoreConnector {
    descriptor: BackendDescriptor,
    client: Arc<dyn ObjectStoreClient>,
    prefix: String,
}

impl ObjectStoreConnector {
    /// `descriptor.location` is the bucket name
    pub fn new(descriptor: BackendDescriptor, client: Arc<dyn ObjectStoreClient>) -> Self {
        Self {
            descriptor,
            client,
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn to_record(&self, object: ObjectSummary) -> FileRecord {
        let tier = object
            .storage_class
            .as_deref()
            .map_or(StorageTier::Standard, StorageTier::from_storage_class);
        let access_uri = format!(
            "{}://{}/{}",
            self.client.scheme(),
            self.descriptor.location,
            object.key
        );

        FileRecord::new(
            self.descriptor.id.clone(),
            object.key,
            access_uri,
            object.size,
            object.last_modified,
            tier,
        )
    }
}

#[async_trait]
impl BackendConnector for ObjectStoreConnector {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn list(&self, request: ListRequest) -> RecordStream<'_> {
        let client = self.client.clone();
        let bucket = self.descriptor.location.clone();
        let prefix = self.prefix.clone();
        let page_size = request.page_size.max(1);

        let objects = paginate(
            self.descriptor.id.clone(),
            request.max_pages,
            move |token| {
                let client = client.clone();
                let bucket = bucket.clone();
                let prefix = prefix.clone();
                async move {
                    let page = client
                        .list_objects(&bucket, &prefix, token, page_size)
                        .await?;
                    Ok::<_, BackendError>((page.objects, page.next_token))
                }
            },
        );

        objects
            .filter_map(move |object| async move {
                match object {
                    // Directory placeholders
                    Ok(object) if object.key.ends_with('/') => None,
                    Ok(object) => Some(Ok(self.to_record(object))),
                    Err(err) => Some(Err(err)),
                }
            })
            .boxed()
    }

    async fn get_tags_batch(&self, records: &[FileRecord]) -> BackendResult<HashMap<String, TagSet>> {
        if records.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = records.iter().map(|r| r.path.clone()).collect();
        let tags = self
            .client
            .get_object_tags(&self.descriptor.location, &keys)
            .await?;

        tracing::trace!(
            backend = %self.descriptor.id,
            requested = keys.len(),
            returned = tags.len(),
            "Fetched object tags"
        );

        Ok(tags)
    }
}
