//! Managed sequence-store connector.
//!
//! A read set is one logical resource with up to three file parts. Each part
//! becomes its own [`FileRecord`] under `readSet/{id}/`, named so that the
//! association rules pair them again:
//!
//! | read set type | source1              | source2              | index             |
//! |---------------|----------------------|----------------------|-------------------|
//! | FASTQ         | `{name}_R1.fastq.gz` | `{name}_R2.fastq.gz` |                   |
//! | FASTQ (single)| `{name}.fastq.gz`    |                      |                   |
//! | BAM / UBAM    | `{name}.bam`         |                      | `{name}.bam.bai`  |
//! | CRAM          | `{name}.cram`        |                      | `{name}.cram.crai`|

use super::{paginate, BackendConnector, BackendDescriptor, BackendError, BackendResult, ListRequest, RecordStream};
use crate::models::{FileRecord, StorageTier, TagSet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strum::{Display, EnumString};

/// Read set file format as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ReadSetFormat {
    Fastq,
    Bam,
    Cram,
    Ubam,
}

/// File part of a read set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReadSetPartKind {
    Source1,
    Source2,
    Index,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadSetPart {
    pub kind: ReadSetPartKind,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadSetSummary {
    pub id: String,
    pub name: String,
    pub format: ReadSetFormat,

    /// `ACTIVE`, `ARCHIVED`, ...
    pub status: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub parts: Vec<ReadSetPart>,
}

impl ReadSetSummary {
    fn has_part(&self, kind: ReadSetPartKind) -> bool {
        self.parts.iter().any(|p| p.kind == kind)
    }

    /// File name a part is exposed under
    pub fn part_file_name(&self, kind: ReadSetPartKind) -> String {
        let name = &self.name;
        match (self.format, kind) {
            (ReadSetFormat::Fastq, ReadSetPartKind::Source1)
                if self.has_part(ReadSetPartKind::Source2) =>
            {
                format!("{name}_R1.fastq.gz")
            }
            (ReadSetFormat::Fastq, ReadSetPartKind::Source2) => format!("{name}_R2.fastq.gz"),
            (ReadSetFormat::Fastq, _) => format!("{name}.fastq.gz"),
            (ReadSetFormat::Bam | ReadSetFormat::Ubam, ReadSetPartKind::Index) => {
                format!("{name}.bam.bai")
            }
            (ReadSetFormat::Bam | ReadSetFormat::Ubam, _) => format!("{name}.bam"),
            (ReadSetFormat::Cram, ReadSetPartKind::Index) => format!("{name}.cram.crai"),
            (ReadSetFormat::Cram, _) => format!("{name}.cram"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadSetPage {
    pub read_sets: Vec<ReadSetSummary>,
    pub next_token: Option<String>,
}

/// Narrow client over a managed sequence store
#[async_trait]
pub trait SequenceStoreClient: Send + Sync + 'static {
    async fn list_read_sets(
        &self,
        store_id: &str,
        next_token: Option<String>,
        max_results: usize,
    ) -> BackendResult<ReadSetPage>;

    /// Tags per read set id
    async fn get_tags(&self, resource_ids: &[String]) -> BackendResult<HashMap<String, TagSet>>;
}

/// Connector exposing one sequence store
pub struct SequenceStoreConnector {
    descriptor: BackendDescriptor,
    client: Arc<dyn SequenceStoreClient>,
}

impl SequenceStoreConnector {
    /// `descriptor.location` is the store id
    pub fn new(descriptor: BackendDescriptor, client: Arc<dyn SequenceStoreClient>) -> Self {
        Self { descriptor, client }
    }

    fn to_records(&self, read_set: ReadSetSummary) -> Vec<FileRecord> {
        let store = &self.descriptor.location;
        let tier = StorageTier::from_store_status(&read_set.status);

        read_set
            .parts
            .iter()
            .map(|part| {
                let path = format!(
                    "readSet/{}/{}",
                    read_set.id,
                    read_set.part_file_name(part.kind)
                );
                let access_uri = format!("omics://{store}/readSet/{}/{}", read_set.id, part.kind);
                FileRecord::new(
                    self.descriptor.id.clone(),
                    path,
                    access_uri,
                    part.size,
                    read_set.creation_time,
                    tier,
                )
            })
            .collect()
    }
}

/// Resource id embedded in a `readSet/{id}/...` or `reference/{id}/...` path
pub(crate) fn resource_id(path: &str) -> Option<&str> {
    path.split('/').nth(1).filter(|id| !id.is_empty())
}

/// Fan resource-level tags back out to every record of that resource
pub(crate) fn tags_by_path(
    records: &[FileRecord],
    by_resource: &HashMap<String, TagSet>,
) -> HashMap<String, TagSet> {
    records
        .iter()
        .filter_map(|record| {
            let id = resource_id(&record.path)?;
            let tags = by_resource.get(id)?;
            Some((record.path.clone(), tags.clone()))
        })
        .collect()
}

/// Distinct resource ids for a batch of records, in first-seen order
pub(crate) fn resource_ids(records: &[FileRecord]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in records.iter().filter_map(|r| resource_id(&r.path)) {
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[async_trait]
impl BackendConnector for SequenceStoreConnector {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn list(&self, request: ListRequest) -> RecordStream<'_> {
        let client = self.client.clone();
        let store_id = self.descriptor.location.clone();
        let page_size = request.page_size.max(1);

        let read_sets = paginate(self.descriptor.id.clone(), request.max_pages, move |token| {
            let client = client.clone();
            let store_id = store_id.clone();
            async move {
                let page = client.list_read_sets(&store_id, token, page_size).await?;
                Ok::<_, BackendError>((page.read_sets, page.next_token))
            }
        });

        read_sets
            .flat_map(move |read_set| {
                let records: Vec<BackendResult<FileRecord>> = match read_set {
                    Ok(read_set) => self.to_records(read_set).into_iter().map(Ok).collect(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::InMemorySequenceStore;
    use crate::backends::BackendKind;
    use crate::models::FileType;
    use futures::TryStreamExt;

    fn read_set(id: &str, name: &str, format: ReadSetFormat, kinds: &[ReadSetPartKind]) -> ReadSetSummary {
        ReadSetSummary {
            id: id.to_string(),
            name: name.to_string(),
            format,
            status: "ACTIVE".to_string(),
            creation_time: None,
            parts: kinds
                .iter()
                .map(|kind| ReadSetPart { kind: *kind, size: 100 })
                .collect(),
        }
    }

    #[test]
    fn test_part_naming() {
        use ReadSetPartKind::*;
        let paired = read_set("1", "NA12878", ReadSetFormat::Fastq, &[Source1, Source2]);
        assert_eq!(paired.part_file_name(Source1), "NA12878_R1.fastq.gz");
        assert_eq!(paired.part_file_name(Source2), "NA12878_R2.fastq.gz");

        let single = read_set("2", "NA12878", ReadSetFormat::Fastq, &[Source1]);
        assert_eq!(single.part_file_name(Source1), "NA12878.fastq.gz");

        let cram = read_set("3", "s", ReadSetFormat::Cram, &[Source1, Index]);
        assert_eq!(cram.part_file_name(Index), "s.cram.crai");
        assert_eq!("ubam".parse::<ReadSetFormat>().unwrap(), ReadSetFormat::Ubam);
    }

    #[tokio::test]
    async fn test_list_expands_parts() {
        use ReadSetPartKind::*;
        let store = Arc::new(InMemorySequenceStore::new());
        store.put(read_set("rs1", "NA12878", ReadSetFormat::Bam, &[Source1, Index]));
        let mut archived = read_set("rs2", "HG002", ReadSetFormat::Fastq, &[Source1, Source2]);
        archived.status = "ARCHIVED".to_string();
        store.put(archived);

        let connector = SequenceStoreConnector::new(
            BackendDescriptor::new("seq", BackendKind::SequenceStore, "store-1"),
            store,
        );
        let records: Vec<FileRecord> = connector
            .list(ListRequest::default())
            .try_collect()
            .await
            .unwrap();

        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "readSet/rs1/NA12878.bam",
                "readSet/rs1/NA12878.bam.bai",
                "readSet/rs2/HG002_R1.fastq.gz",
                "readSet/rs2/HG002_R2.fastq.gz",
            ]
        );
        assert_eq!(records[1].file_type, FileType::Bai);
        assert_eq!(records[1].access_uri, "omics://store-1/readSet/rs1/index");
        assert_eq!(records[2].storage_tier, StorageTier::Archive);
    }

    #[tokio::test]
    async fn test_tags_fan_out_to_parts() {
        use ReadSetPartKind::*;
        let store = Arc::new(InMemorySequenceStore::new());
        store.put(read_set("rs1", "NA12878", ReadSetFormat::Bam, &[Source1, Index]));
        let mut tags = TagSet::new();
        tags.insert("project".into(), "giab".into());
        store.set_tags("rs1", tags.clone());

        let connector = SequenceStoreConnector::new(
            BackendDescriptor::new("seq", BackendKind::SequenceStore, "store-1"),
            store.clone(),
        );
        let records: Vec<FileRecord> = connector
            .list(ListRequest::default())
            .try_collect()
            .await
            .unwrap();

        let fetched = connector.get_tags_batch(&records).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched["readSet/rs1/NA12878.bam.bai"], tags);
        assert_eq!(store.tag_calls(), 1);
    }

    #[test]
    fn test_resource_ids() {
        assert_eq!(resource_id("readSet/abc/x.bam"), Some("abc"));
        assert_eq!(resource_id("x.bam"), None);
    }
}
