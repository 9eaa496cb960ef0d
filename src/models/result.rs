use super::file::FileRecord;
use super::group::AssociationGroup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Pattern matcher output for one record against one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Mean best per-term score against the path (0.0 - 1.0)
    pub path_score: f64,

    /// Same measure over tag keys and values, when it was computed
    pub tag_score: Option<f64>,

    /// Search terms that contributed a non-zero score
    pub matched_terms: Vec<String>,
}

impl MatchResult {
    pub fn path_only(path_score: f64, matched_terms: Vec<String>) -> Self {
        Self {
            path_score,
            tag_score: None,
            matched_terms,
        }
    }

    /// Final match score: the better of path and tag scores
    pub fn score(&self) -> f64 {
        self.tag_score
            .map_or(self.path_score, |tag| tag.max(self.path_score))
    }

    pub fn is_match(&self) -> bool {
        self.score() > 0.0
    }
}

/// A record together with its match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRecord {
    pub record: FileRecord,
    pub result: MatchResult,
}

/// One sub-score of the composite relevance score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    /// Raw sub-score (0.0 - 1.0)
    pub raw: f64,

    /// Configured weight
    pub weight: f64,

    /// Share of the composite score contributed by this component
    pub contribution: f64,
}

/// Named sub-scores behind a composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub match_quality: ScoreComponent,
    pub type_relevance: ScoreComponent,
    pub association_completeness: ScoreComponent,
    pub accessibility: ScoreComponent,
}

impl ScoreBreakdown {
    pub fn components(&self) -> [(&'static str, ScoreComponent); 4] {
        [
            ("match_quality", self.match_quality),
            ("type_relevance", self.type_relevance),
            ("association_completeness", self.association_completeness),
            ("accessibility", self.accessibility),
        ]
    }

    /// Sum of weighted contributions
    pub fn total(&self) -> f64 {
        self.components().iter().map(|(_, c)| c.contribution).sum()
    }
}

/// Final ranked unit returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredGroup {
    pub group: AssociationGroup,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}

/// Per-backend outcome reported in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendStatus {
    Ok,
    Partial,
    Error,
    TimedOut,
}

/// Diagnostics for one backend's contribution to a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendReport {
    pub status: BackendStatus,

    /// Records listed before matching
    pub records_listed: usize,

    /// Records that survived matching
    pub records_matched: usize,

    pub error: Option<String>,

    pub elapsed_ms: u64,
}

impl BackendReport {
    pub fn failed(status: BackendStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            records_listed: 0,
            records_matched: 0,
            error: Some(error.into()),
            elapsed_ms: 0,
        }
    }

    /// A backend failed when it produced nothing usable
    pub fn is_failure(&self) -> bool {
        match self.status {
            BackendStatus::Ok | BackendStatus::Partial => false,
            BackendStatus::Error => true,
            BackendStatus::TimedOut => self.records_listed == 0,
        }
    }
}

/// Which backends contributed to a search and how
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, BackendReport>);

impl Manifest {
    pub fn insert(&mut self, backend_id: impl Into<String>, report: BackendReport) {
        self.0.insert(backend_id.into(), report);
    }

    pub fn get(&self, backend_id: &str) -> Option<&BackendReport> {
        self.0.get(backend_id)
    }

    pub fn status(&self, backend_id: &str) -> Option<BackendStatus> {
        self.0.get(backend_id).map(|r| r.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BackendReport)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Status per backend, e.g. `{s3-a: ok, s3-b: error}`
    pub fn statuses(&self) -> BTreeMap<String, BackendStatus> {
        self.0
            .iter()
            .map(|(id, report)| (id.clone(), report.status))
            .collect()
    }

    /// True when at least one backend ran and none produced anything usable
    pub fn all_failed(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(BackendReport::is_failure)
    }

    /// True when any backend reported something other than `ok`
    pub fn is_degraded(&self) -> bool {
        self.0.values().any(|r| r.status != BackendStatus::Ok)
    }
}

/// Ranked results plus the manifest of contributing backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub search_id: Uuid,
    pub results: Vec<ScoredGroup>,

    /// Groups found before truncation to `max_results`
    pub total_groups: usize,

    pub manifest: Manifest,

    /// Served from the result cache
    #[serde(default)]
    pub from_cache: bool,

    pub elapsed_ms: u64,
}
