//! In-memory clients for every backend family.
//!
//! Used by the test suite and by the binary's `--demo` mode. Each client
//! counts its calls and can be told to misbehave through a [`Fault`].

use super::{
    BackendConnector, BackendDescriptor, BackendError, BackendKind, BackendResult, ObjectPage,
    ObjectStoreClient, ObjectStoreConnector, ObjectSummary, ReadSetFormat, ReadSetPage,
    ReadSetPart, ReadSetPartKind, ReadSetSummary, ReferencePage, ReferenceStoreClient,
    ReferenceStoreConnector, ReferenceSummary, SequenceStoreClient, SequenceStoreConnector,
};
use crate::models::TagSet;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Misbehaviour injected into an in-memory client
#[derive(Debug, Clone, Default)]
pub enum Fault {
    #[default]
    None,

    /// Every call fails with this error
    Fail(BackendError),

    /// Every call hangs forever
    Block,

    /// Every call sleeps first
    Delay(Duration),

    /// Listing fails once this many pages were served
    FailAfterPages(usize),

    /// Listing hangs once this many pages were served
    BlockAfterPages(usize),

    /// Listing works, every tag call fails
    FailTags(BackendError),
}

/// Call counters and fault state shared by the in-memory clients
#[derive(Debug, Default)]
pub struct FaultInjector {
    fault: Mutex<Fault>,
    list_calls: AtomicUsize,
    tag_calls: AtomicUsize,
    listing_page: AtomicUsize,
    largest_tag_batch: AtomicUsize,
}

impl FaultInjector {
    pub fn set(&self, fault: Fault) {
        *self.fault.lock() = fault;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    /// Largest tag batch seen so far
    pub fn largest_tag_batch(&self) -> usize {
        self.largest_tag_batch.load(Ordering::SeqCst)
    }

    async fn before_list(&self, backend: &str, first_page: bool) -> BackendResult<()> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if first_page {
            self.listing_page.store(0, Ordering::SeqCst);
        }
        let page = self.listing_page.fetch_add(1, Ordering::SeqCst);
        self.apply(backend, Some(page)).await
    }

    async fn before_tags(&self, backend: &str, batch: usize) -> BackendResult<()> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        self.largest_tag_batch.fetch_max(batch, Ordering::SeqCst);
        self.apply(backend, None).await
    }

    async fn apply(&self, backend: &str, page: Option<usize>) -> BackendResult<()> {
        let fault = self.fault.lock().clone();
        match fault {
            Fault::None => Ok(()),
            Fault::Fail(err) => Err(err),
            Fault::Block => {
                futures::future::pending::<()>().await;
                Ok(())
            }
            Fault::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Fault::FailAfterPages(limit) => match page {
                Some(page) if page >= limit => Err(BackendError::unavailable(
                    backend,
                    format!("listing interrupted after {limit} pages"),
                )),
                _ => Ok(()),
            },
            Fault::BlockAfterPages(limit) => {
                if page.is_some_and(|page| page >= limit) {
                    futures::future::pending::<()>().await;
                }
                Ok(())
            }
            Fault::FailTags(err) => match page {
                Some(_) => Ok(()),
                None => Err(err),
            },
        }
    }
}

/// Offset-token pagination over an already ordered slice
fn page_of<T: Clone>(items: &[T], token: Option<&str>, max: usize) -> (Vec<T>, Option<String>) {
    let start = token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + max.max(1)).min(items.len());
    let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| end.to_string());
    (page, next)
}

/// Object stored in an [`InMemoryObjectStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
    pub tags: TagSet,
}

impl StoredObject {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            storage_class: None,
            tags: TagSet::new(),
        }
    }

    pub fn with_storage_class(mut self, class: impl Into<String>) -> Self {
        self.storage_class = Some(class.into());
        self
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Single-bucket object store held in memory
#[derive(Debug)]
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    max_tag_batch: Option<usize>,
    faults: FaultInjector,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            max_tag_batch: None,
            faults: FaultInjector::default(),
        }
    }

    /// Reject tag batches larger than `max`
    pub fn with_max_tag_batch(mut self, max: usize) -> Self {
        self.max_tag_batch = Some(max);
        self
    }

    pub fn put(&self, object: StoredObject) {
        self.objects.write().insert(object.key.clone(), object);
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn list_calls(&self) -> usize {
        self.faults.list_calls()
    }

    pub fn tag_calls(&self) -> usize {
        self.faults.tag_calls()
    }

    fn check_bucket(&self, bucket: &str) -> BackendResult<()> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(BackendError::NotFound {
                backend: self.bucket.clone(),
                location: bucket.to_string(),
            })
        }
    }
}

#[async_trait]
impl ObjectStoreClient for InMemoryObjectStore {
    fn scheme(&self) -> &str {
        "mem"
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> BackendResult<ObjectPage> {
        self.faults
            .before_list(bucket, continuation.is_none())
            .await?;
        self.check_bucket(bucket)?;

        let matching: Vec<ObjectSummary> = self
            .objects
            .read()
            .values()
            .filter(|o| o.key.starts_with(prefix))
            .map(|o| ObjectSummary {
                key: o.key.clone(),
                size: o.size,
                last_modified: o.last_modified,
                storage_class: o.storage_class.clone(),
            })
            .collect();

        let (objects, next_token) = page_of(&matching, continuation.as_deref(), max_keys);
        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn get_object_tags(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> BackendResult<HashMap<String, TagSet>> {
        self.faults.before_tags(bucket, keys.len()).await?;
        self.check_bucket(bucket)?;

        if let Some(max) = self.max_tag_batch {
            if keys.len() > max {
                return Err(BackendError::BatchTooLarge {
                    backend: bucket.to_string(),
                    requested: keys.len(),
                    max,
                });
            }
        }

        let objects = self.objects.read();
        Ok(keys
            .iter()
            .filter_map(|key| objects.get(key))
            .filter(|o| !o.tags.is_empty())
            .map(|o| (o.key.clone(), o.tags.clone()))
            .collect())
    }
}

/// Sequence store held in memory, read sets ordered by id
#[derive(Debug, Default)]
pub struct InMemorySequenceStore {
    read_sets: RwLock<BTreeMap<String, ReadSetSummary>>,
    tags: RwLock<HashMap<String, TagSet>>,
    faults: FaultInjector,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, read_set: ReadSetSummary) {
        self.read_sets.write().insert(read_set.id.clone(), read_set);
    }

    pub fn set_tags(&self, id: impl Into<String>, tags: TagSet) {
        self.tags.write().insert(id.into(), tags);
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn list_calls(&self) -> usize {
        self.faults.list_calls()
    }

    pub fn tag_calls(&self) -> usize {
        self.faults.tag_calls()
    }
}

#[async_trait]
impl SequenceStoreClient for InMemorySequenceStore {
    async fn list_read_sets(
        &self,
        store_id: &str,
        next_token: Option<String>,
        max_results: usize,
    ) -> BackendResult<ReadSetPage> {
        self.faults
            .before_list(store_id, next_token.is_none())
            .await?;

        let all: Vec<ReadSetSummary> = self.read_sets.read().values().cloned().collect();
        let (read_sets, next_token) = page_of(&all, next_token.as_deref(), max_results);
        Ok(ReadSetPage {
            read_sets,
            next_token,
        })
    }

    async fn get_tags(&self, resource_ids: &[String]) -> BackendResult<HashMap<String, TagSet>> {
        self.faults.before_tags("sequence-store", resource_ids.len()).await?;

        let tags = self.tags.read();
        Ok(resource_ids
            .iter()
            .filter_map(|id| tags.get(id).map(|t| (id.clone(), t.clone())))
            .collect())
    }
}

/// Reference store held in memory, references ordered by id
#[derive(Debug, Default)]
pub struct InMemoryReferenceStore {
    references: RwLock<BTreeMap<String, ReferenceSummary>>,
    tags: RwLock<HashMap<String, TagSet>>,
    faults: FaultInjector,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, reference: ReferenceSummary) {
        self.references
            .write()
            .insert(reference.id.clone(), reference);
    }

    pub fn set_tags(&self, id: impl Into<String>, tags: TagSet) {
        self.tags.write().insert(id.into(), tags);
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn list_calls(&self) -> usize {
        self.faults.list_calls()
    }

    pub fn tag_calls(&self) -> usize {
        self.faults.tag_calls()
    }
}

#[async_trait]
impl ReferenceStoreClient for InMemoryReferenceStore {
    async fn list_references(
        &self,
        store_id: &str,
        next_token: Option<String>,
        max_results: usize,
    ) -> BackendResult<ReferencePage> {
        self.faults
            .before_list(store_id, next_token.is_none())
            .await?;

        let all: Vec<ReferenceSummary> = self.references.read().values().cloned().collect();
        let (references, next_token) = page_of(&all, next_token.as_deref(), max_results);
        Ok(ReferencePage {
            references,
            next_token,
        })
    }

    async fn get_tags(&self, resource_ids: &[String]) -> BackendResult<HashMap<String, TagSet>> {
        self.faults
            .before_tags("reference-store", resource_ids.len())
            .await?;

        let tags = self.tags.read();
        Ok(resource_ids
            .iter()
            .filter_map(|id| tags.get(id).map(|t| (id.clone(), t.clone())))
            .collect())
    }
}

/// Seeded backends for `genomics-search search --demo`
pub fn demo_backends() -> Vec<Arc<dyn BackendConnector>> {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single();

    let bucket = InMemoryObjectStore::new("demo-genomics");
    let objects = [
        ("runs/NA12878_R1.fastq.gz", 4_200_000_000, "STANDARD"),
        ("runs/NA12878_R2.fastq.gz", 4_300_000_000, "STANDARD"),
        ("runs/HG002_R1.fastq.gz", 3_900_000_000, "STANDARD"),
        ("runs/HG002_R2.fastq.gz", 3_950_000_000, "STANDARD"),
        ("aln/NA12878.bam", 95_000_000_000, "STANDARD_IA"),
        ("aln/NA12878.bam.bai", 9_000_000, "STANDARD_IA"),
        ("vc/NA12878.vcf.gz", 150_000_000, "STANDARD"),
        ("vc/NA12878.vcf.gz.tbi", 1_500_000, "STANDARD"),
        ("archive/NA12878_2019.cram", 40_000_000_000, "DEEP_ARCHIVE"),
        ("ref/hg38.fa", 3_100_000_000, "STANDARD"),
        ("ref/hg38.fa.fai", 160_000, "STANDARD"),
        ("ref/hg38.dict", 600_000, "STANDARD"),
    ];
    for (key, size, class) in objects {
        let mut object = StoredObject::new(key, size).with_storage_class(class);
        if let Some(at) = created {
            object = object.with_last_modified(at);
        }
        bucket.put(object);
    }
    bucket.put(
        StoredObject::new("misc/run42.bam", 80_000_000_000)
            .with_tag("sample", "NA12878")
            .with_tag("assay", "wgs"),
    );

    let sequences = InMemorySequenceStore::new();
    sequences.put(ReadSetSummary {
        id: "4481193487".into(),
        name: "NA12878-exome".into(),
        format: ReadSetFormat::Fastq,
        status: "ACTIVE".into(),
        creation_time: created,
        parts: vec![
            ReadSetPart {
                kind: ReadSetPartKind::Source1,
                size: 2_000_000_000,
            },
            ReadSetPart {
                kind: ReadSetPartKind::Source2,
                size: 2_000_000_000,
            },
        ],
    });

    let references = InMemoryReferenceStore::new();
    references.put(ReferenceSummary {
        id: "9000000001".into(),
        name: "GRCh38".into(),
        status: "ACTIVE".into(),
        creation_time: created,
        source_size: 3_100_000_000,
        index_size: Some(160_000),
    });

    vec![
        Arc::new(ObjectStoreConnector::new(
            BackendDescriptor::new("demo-bucket", BackendKind::ObjectStore, "demo-genomics"),
            Arc::new(bucket),
        )),
        Arc::new(SequenceStoreConnector::new(
            BackendDescriptor::new("demo-sequences", BackendKind::SequenceStore, "seq-demo"),
            Arc::new(sequences),
        )),
        Arc::new(ReferenceStoreConnector::new(
            BackendDescriptor::new("demo-references", BackendKind::ReferenceStore, "ref-demo"),
            Arc::new(references),
        )),
    ]
}
