//! Genomics file discovery and ranking engine.
//!
//! Fans a free-text query out to object-storage buckets and managed genomics
//! stores, matches the listed objects by path and tags, groups primary files
//! with their companions (indexes, mate pairs, dictionaries) and returns a
//! ranked, explained result set together with a per-backend manifest.
//!
//! ```text
//! query ──► result cache ──hit──► response
//!              │ miss
//!              ▼
//!        orchestrator ──► backend tasks (list ─► match ─► tags via tag cache)
//!              │
//!              ▼
//!   merge ─► association detector ─► relevance scorer ─► result cache
//! ```

pub mod association;
pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod models;
pub mod scoring;
pub mod search;

pub use error::{EngineError, Result};
pub use models::{
    AssociationGroup, AssociationKind, BackendReport, BackendStatus, Companion, FileRecord,
    FileType, Manifest, MatchResult, Query, ScoreBreakdown, ScoredGroup, SearchResponse,
    StorageTier,
};
pub use search::{SearchOrchestrator, SearchService};
