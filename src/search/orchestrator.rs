//! Bounded concurrent fan-out over every enabled backend.

use super::config::SearchConfig;
use super::merge::{merge, score_and_rank};
use super::pipeline::{salvage, BackendOutcome, BackendTask, ListingBuffer};
use super::state::{SearchLifecycle, SearchState};
use crate::backends::BackendRegistry;
use crate::cache::{CacheConfig, ResultCache, TagCache};
use crate::error::{EngineError, Result};
use crate::matching::PatternMatcher;
use crate::metrics::{BACKEND_OUTCOMES_TOTAL, SEARCHES_TOTAL, SEARCH_DURATION_SECONDS};
use crate::models::{BackendReport, BackendStatus, Manifest, MatchedRecord, Query, SearchResponse};
use crate::scoring::{RelevanceScorer, ScoringConfig};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs searches against the backends in a registry
pub struct SearchOrchestrator {
    registry: Arc<BackendRegistry>,
    config: Arc<SearchConfig>,
    scoring: ScoringConfig,
    limiter: Arc<Semaphore>,
    tag_cache: Arc<TagCache>,
    result_cache: Arc<ResultCache>,
}

impl SearchOrchestrator {
    /// Orchestrator with default scoring and default-sized caches
    pub fn new(registry: Arc<BackendRegistry>, config: SearchConfig) -> Self {
        let (tag_cache, result_cache) = CacheConfig::default().build();
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_backends));

        Self {
            registry,
            config: Arc::new(config),
            scoring: ScoringConfig::default(),
            limiter,
            tag_cache: Arc::new(tag_cache),
            result_cache: Arc::new(result_cache),
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_caches(mut self, tag_cache: Arc<TagCache>, result_cache: Arc<ResultCache>) -> Self {
        self.tag_cache = tag_cache;
        self.result_cache = result_cache;
        self
    }

    /// Share a concurrency limit with other orchestrators
    pub fn with_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn limiter(&self) -> Arc<Semaphore> {
        self.limiter.clone()
    }

    pub fn tag_cache(&self) -> &Arc<TagCache> {
        &self.tag_cache
    }

    pub fn result_cache(&self) -> &Arc<ResultCache> {
        &self.result_cache
    }

    /// Run one search. Backend failures degrade the response; only a search
    /// where every selected backend failed returns an error.
    pub async fn search(&self, query: Query) -> Result<SearchResponse> {
        let search_id = Uuid::new_v4();
        let span = info_span!("search", search_id = %search_id);
        let started = Instant::now();

        let outcome = self.run(search_id, query).instrument(span).await;
        SEARCH_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        let label = match &outcome {
            Ok(response) if response.from_cache => "cached",
            Ok(response) if response.manifest.is_degraded() => "degraded",
            Ok(_) => "ok",
            Err(_) => "failed",
        };
        SEARCHES_TOTAL.with_label_values(&[label]).inc();

        outcome
    }

    async fn run(&self, search_id: Uuid, query: Query) -> Result<SearchResponse> {
        query.validate()?;
        let mut lifecycle = SearchLifecycle::new(search_id);
        let signature = query.signature();

        if let Some(mut cached) = self.result_cache.get(&signature).await {
            lifecycle.advance(SearchState::Done)?;
            debug!(groups = cached.results.len(), "Served from result cache");
            cached.search_id = search_id;
            cached.from_cache = true;
            cached.elapsed_ms = lifecycle.elapsed().as_millis() as u64;
            return Ok(cached);
        }

        let backends = self.registry.resolve(&query.backends_enabled);
        if backends.is_empty() {
            return Err(EngineError::NoBackendsAvailable {
                diagnostics: Manifest::default(),
            });
        }

        lifecycle.advance(SearchState::FanOut)?;
        let timeout = query.timeout.unwrap_or_else(|| self.config.search_timeout());
        let deadline = tokio::time::Instant::now() + timeout;
        let matcher = Arc::new(PatternMatcher::new(&query, self.config.match_settings()));

        let mut buffers: BTreeMap<String, ListingBuffer> = BTreeMap::new();
        let mut tasks = JoinSet::new();
        for connector in backends {
            let buffer: ListingBuffer = Arc::new(Mutex::new(Vec::new()));
            buffers.insert(connector.id().to_string(), buffer.clone());

            let task = BackendTask {
                connector,
                matcher: matcher.clone(),
                tag_cache: self.tag_cache.clone(),
                limiter: self.limiter.clone(),
                config: self.config.clone(),
                buffer,
            };
            tasks.spawn(task.run().in_current_span());
        }
        info!(
            backends = buffers.len(),
            timeout_ms = timeout.as_millis() as u64,
            terms = ?matcher.terms(),
            "Search fanned out"
        );

        lifecycle.advance(SearchState::Collecting)?;
        let mut outcomes: BTreeMap<String, BackendOutcome> = BTreeMap::new();
        let mut deadline_hit = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(outcome))) => {
                    debug!(
                        backend = %outcome.backend_id,
                        status = %outcome.report.status,
                        matched = outcome.matches.len(),
                        "Backend finished"
                    );
                    outcomes.insert(outcome.backend_id.clone(), outcome);
                }
                Ok(Some(Err(err))) => warn!(error = %err, "Backend task failed"),
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    warn!(
                        pending = tasks.len(),
                        "Search deadline reached, cancelling remaining backends"
                    );
                    tasks.shutdown().await;
                    break;
                }
            }
        }

        let mut manifest = Manifest::default();
        let mut matches: Vec<MatchedRecord> = Vec::new();
        for (backend_id, buffer) in buffers {
            let (report, backend_matches) = match outcomes.remove(&backend_id) {
                Some(outcome) => (outcome.report, outcome.matches),
                None if deadline_hit => {
                    let listed = std::mem::take(&mut *buffer.lock());
                    let records_listed = listed.len();
                    let salvaged = salvage(&matcher, listed);
                    let report = BackendReport {
                        status: BackendStatus::TimedOut,
                        records_listed,
                        records_matched: salvaged.len(),
                        error: Some(format!("cancelled at search deadline of {}ms", timeout.as_millis())),
                        elapsed_ms: lifecycle.elapsed().as_millis() as u64,
                    };
                    (report, salvaged)
                }
                None => (
                    BackendReport::failed(BackendStatus::Error, "backend task did not complete"),
                    Vec::new(),
                ),
            };

            BACKEND_OUTCOMES_TOTAL
                .with_label_values(&[backend_id.as_str(), report.status.to_string().as_str()])
                .inc();
            matches.extend(backend_matches);
            manifest.insert(backend_id, report);
        }

        if manifest.all_failed() {
            lifecycle.advance(SearchState::Aborted)?;
            warn!(manifest = ?manifest.statuses(), "No backend produced usable records");
            return Err(EngineError::NoBackendsAvailable {
                diagnostics: manifest,
            });
        }

        lifecycle.advance(SearchState::Merging)?;
        let merged = merge(matches);

        lifecycle.advance(SearchState::Scoring)?;
        let scorer = RelevanceScorer::new(self.scoring, query.file_type_hint);
        let ranked = score_and_rank(merged, &scorer, query.max_results);

        let response = SearchResponse {
            search_id,
            results: ranked.results,
            total_groups: ranked.total_groups,
            manifest,
            from_cache: false,
            elapsed_ms: lifecycle.elapsed().as_millis() as u64,
        };

        // Degraded responses are left uncached so a repeat query retries the failed backends
        if response.manifest.is_degraded() {
            debug!(manifest = ?response.manifest.statuses(), "Skipping result cache for degraded response");
        } else {
            self.result_cache.put(&signature, &response).await;
        }
        lifecycle.advance(SearchState::Done)?;

        info!(
            groups = response.total_groups,
            returned = response.results.len(),
            degraded = response.manifest.is_degraded(),
            elapsed_ms = response.elapsed_ms,
            "Search complete"
        );

        Ok(response)
    }
}
