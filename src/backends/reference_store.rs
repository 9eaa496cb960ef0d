//! Managed reference-store connector.
//!
//! Each reference genome is exposed as `reference/{id}/{name}.fasta` plus its
//! `.fasta.fai` index when the store reports one.

use super::sequence_store::{resource_ids, tags_by_path};
use super::{paginate, BackendConnector, BackendDescriptor, BackendError, BackendResult, ListRequest, RecordStream};
use crate::models::{FileRecord, StorageTier, TagSet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub source_size: u64,

    /// Size of the FASTA index, when one exists
    pub index_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferencePage {
    pub references: Vec<ReferenceSummary>,
    pub next_token: Option<String>,
}

/// Narrow client over a managed reference store
#[async_trait]
pub trait ReferenceStoreClient: Send + Sync + 'static {
    async fn list_references(
        &self,
        store_id: &str,
        next_token: Option<String>,
        max_results: usize,
    ) -> BackendResult<ReferencePage>;

    /// Tags per reference id
    async fn get_tags(&self, resource_ids: &[String]) -> BackendResult<HashMap<String, TagSet>>;
}

pub struct ReferenceStoreConnector {
    descriptor: BackendDescriptor,
    client: Arc<dyn ReferenceStoreClient>,
}

impl ReferenceStoreConnector {
    /// `descriptor.location` is the store id
    pub fn new(descriptor: BackendDescriptor, client: Arc<dyn ReferenceStoreClient>) -> Self {
        Self { descriptor, client }
    }

    fn to_records(&self, reference: ReferenceSummary) -> Vec<FileRecord> {
        let store = &self.descriptor.location;
        let tier = StorageTier::from_store_status(&reference.status);
        let base = format!("reference/{}/{}.fasta", reference.id, reference.name);

        let source = FileRecord::new(
            self.descriptor.id.clone(),
            base.clone(),
            format!("omics://{store}/reference/{}/source", reference.id),
            reference.source_size,
            reference.creation_time,
            tier,
        );

        let index = reference.index_size.map(|size| {
            FileRecord::new(
                self.descriptor.id.clone(),
                format!("{base}.fai"),
                format!("omics://{store}/reference/{}/index", reference.id),
                size,
                reference.creation_time,
                tier,
            )
        });

        std::iter::once(source).chain(index).collect()
    }
}

#[async_trait]
impl BackendConnector for ReferenceStoreConnector {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn list(&self, request: ListRequest) -> RecordStream<'_> {
        let client = self.client.clone();
        let store_id = self.descriptor.location.clone();
        let page_size = request.page_size.max(1);

        let references = paginate(self.descriptor.id.clone(), request.max_pages, move |token| {
            let client = client.clone();
            let store_id = store_id.clone();
            async move {
                let page = client.list_references(&store_id, token, page_size).await?;
                Ok::<_, BackendError>((page.references, page.next_token))
            }
        });

        references
            .flat_map(move |reference| {
                let records: Vec<BackendResult<FileRecord>> = match reference {
                    Ok(reference) => self.to_records(reference).into_iter().map(Ok).collect(),
                    Err(err) => vec![Err(err)],
                };
                stream::iter(records)
            })
            .boxed()
    }

    async fn get_tags_batch(&self, records: &[FileRecord]) -> BackendResult<HashMap<String, TagSet>> {
        let ids = resource_ids(records);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let by_resource = self.client.get_tags(&ids).await?;
        Ok(tags_by_path(records, &by_resource))
    }
}
