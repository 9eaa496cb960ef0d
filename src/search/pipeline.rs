//! Per-backend pipeline: list, match by path, fetch tags for weak matches.

use super::config::SearchConfig;
use crate::backends::{batches, BackendConnector, BackendError, ListRequest};
use crate::cache::TagCache;
use crate::matching::PatternMatcher;
use crate::metrics::BACKEND_CALLS_TOTAL;
use crate::models::{BackendReport, BackendStatus, FileRecord, MatchResult, MatchedRecord};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Records listed so far, readable after the task is cancelled
pub(crate) type ListingBuffer = Arc<Mutex<Vec<FileRecord>>>;

/// What one backend contributed to a search
#[derive(Debug)]
pub(crate) struct BackendOutcome {
    pub backend_id: String,
    pub report: BackendReport,
    pub matches: Vec<MatchedRecord>,
}

/// Everything a backend task needs, cheap to clone into the task
#[derive(Clone)]
pub(crate) struct BackendTask {
    pub connector: Arc<dyn BackendConnector>,
    pub matcher: Arc<PatternMatcher>,
    pub tag_cache: Arc<TagCache>,
    pub limiter: Arc<Semaphore>,
    pub config: Arc<SearchConfig>,
    pub buffer: ListingBuffer,
}

/// Path-only matching of whatever was listed, for backends cut off early
pub(crate) fn salvage(matcher: &PatternMatcher, records: Vec<FileRecord>) -> Vec<MatchedRecord> {
    records
        .into_iter()
        .filter_map(|record| {
            let result = matcher.match_record(&record);
            result.is_match().then_some(MatchedRecord { record, result })
        })
        .collect()
}

impl BackendTask {
    pub async fn run(self) -> BackendOutcome {
        let backend_id = self.connector.id().to_string();

        let _permit = match self.limiter.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return BackendOutcome {
                    backend_id,
                    report: BackendReport::failed(BackendStatus::Error, "concurrency limiter closed"),
                    matches: Vec::new(),
                }
            }
        };

        let started = Instant::now();
        let budget = self.config.backend_timeout();

        let (status, error, matches) = match tokio::time::timeout(budget, self.execute()).await {
            Ok(result) => result,
            Err(_) => {
                let err = BackendError::Timeout {
                    backend: backend_id.clone(),
                    after_ms: budget.as_millis() as u64,
                };
                warn!(backend = %backend_id, error = %err, "Backend exceeded its budget");
                let listed = self.buffer.lock().clone();
                (
                    BackendStatus::TimedOut,
                    Some(err.to_string()),
                    salvage(&self.matcher, listed),
                )
            }
        };

        let records_listed = self.buffer.lock().len();
        BackendOutcome {
            report: BackendReport {
                status,
                records_listed,
                records_matched: matches.len(),
                error,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            backend_id,
            matches,
        }
    }

    async fn execute(&self) -> (BackendStatus, Option<String>, Vec<MatchedRecord>) {
        let backend_id = self.connector.id();
        let request = ListRequest {
            page_size: self.config.page_size,
            max_pages: self.config.max_pages,
        };

        BACKEND_CALLS_TOTAL
            .with_label_values(&[backend_id, "list"])
            .inc();

        let mut listing_error = None;
        let mut stream = self.connector.list(request);
        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => self.buffer.lock().push(record),
                Err(err) => {
                    warn!(backend = %backend_id, error = %err, "Listing failed");
                    listing_error = Some(err);
                    break;
                }
            }
        }
        drop(stream);

        let records = self.buffer.lock().clone();
        debug!(backend = %backend_id, listed = records.len(), "Listing finished");

        let (matches, tag_error) = self.match_records(records).await;

        let listed_any = !self.buffer.lock().is_empty();
        match (listing_error, tag_error) {
            (Some(err), _) if !listed_any => (BackendStatus::Error, Some(err.to_string()), matches),
            (Some(err), _) | (None, Some(err)) => {
                (BackendStatus::Partial, Some(err.to_string()), matches)
            }
            (None, None) => (BackendStatus::Ok, None, matches),
        }
    }

    /// Score every record, consulting tags only for weak path matches
    async fn match_records(
        &self,
        records: Vec<FileRecord>,
    ) -> (Vec<MatchedRecord>, Option<BackendError>) {
        let matcher = &self.matcher;
        let mut matched = Vec::new();
        let mut pending: Vec<(FileRecord, MatchResult)> = Vec::new();

        for record in records {
            let result = matcher.match_path(&record);
            if !matcher.needs_tags(&result) {
                if result.is_match() {
                    matched.push(MatchedRecord { record, result });
                }
                continue;
            }

            let tags = match &record.tags {
                Some(tags) => Some(tags.clone()),
                None => self.tag_cache.get(&record.backend_id, &record.path).await,
            };
            match tags {
                Some(tags) => {
                    let result = matcher.apply_tags(result, &tags);
                    if result.is_match() {
                        matched.push(MatchedRecord {
                            record: record.with_tags(tags),
                            result,
                        });
                    }
                }
                None => pending.push((record, result)),
            }
        }

        let tag_error = self.fetch_tags(pending, &mut matched).await;
        (matched, tag_error)
    }

    async fn fetch_tags(
        &self,
        pending: Vec<(FileRecord, MatchResult)>,
        matched: &mut Vec<MatchedRecord>,
    ) -> Option<BackendError> {
        let backend_id = self.connector.id();
        let mut first_error = None;

        for batch in batches(&pending, self.config.max_tag_batch_size) {
            let records: Vec<FileRecord> = batch.iter().map(|(r, _)| r.clone()).collect();
            BACKEND_CALLS_TOTAL
                .with_label_values(&[backend_id, "get_tags"])
                .inc();

            match self.connector.get_tags_batch(&records).await {
                Ok(mut fetched) => {
                    for (record, result) in batch.iter().cloned() {
                        let tags = fetched.remove(&record.path).unwrap_or_default();
                        self.tag_cache
                            .put(&record.backend_id, &record.path, tags.clone())
                            .await;
                        let result = self.matcher.apply_tags(result, &tags);
                        if result.is_match() {
                            matched.push(MatchedRecord {
                                record: record.with_tags(tags),
                                result,
                            });
                        }
                    }
                }
                Err(err) => {
                    warn!(backend = %backend_id, error = %err, batch = batch.len(), "Tag fetch failed, keeping path scores");
                    matched.extend(batch.iter().cloned().filter_map(|(record, result)| {
                        result.is_match().then_some(MatchedRecord { record, result })
                    }));
                    first_error.get_or_insert(err);
                }
            }
        }

        first_error
    }
}
