//! Search orchestration.
//!
//! A search runs through a small state machine ([`SearchState`]). Each
//! selected backend gets its own task that lists records, matches them by
//! path and fetches tags only for weak matches. Tasks share a process-wide
//! semaphore, so no more than `max_concurrent_backends` run at once.
//!
//! ```text
//!                 ┌──────────────┐
//!  Query ───────► │ Orchestrator │ ── result cache hit ──► SearchResponse
//!                 └──────┬───────┘
//!                        │ fan-out (semaphore-bounded)
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!     BackendTask   BackendTask   BackendTask    list ─► match ─► tags
//!          │             │             │
//!          └─────────────┴──────┬──────┘
//!                               ▼
//!                  merge ─► associate ─► score ─► rank
//! ```
//!
//! # Example
//!
//! ```no_run
//! use genomics_file_search::backends::{memory, BackendRegistry};
//! use genomics_file_search::search::{SearchConfig, SearchOrchestrator};
//! use genomics_file_search::{FileType, Query};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(BackendRegistry::new());
//!     for backend in memory::demo_backends() {
//!         registry.register(backend)?;
//!     }
//!
//!     let orchestrator = SearchOrchestrator::new(registry, SearchConfig::default());
//!     let query = Query::new(["NA12878"]).with_file_type(FileType::Bam);
//!
//!     let response = orchestrator.search(query).await?;
//!     println!("Found {} groups", response.total_groups);
//!     Ok(())
//! }
//! ```

mod config;
mod merge;
mod orchestrator;
mod pipeline;
mod service;
mod state;

pub use config::{SearchConfig, SearchConfigBuilder};
pub use merge::{merge, merge_and_rank, score_and_rank, Merged, Ranked};
pub use orchestrator::SearchOrchestrator;
pub use service::{SearchService, ServiceStats};
pub use state::{SearchLifecycle, SearchState};
