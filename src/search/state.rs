//! Search lifecycle state machine.
//!
//! ```text
//! Idle ─► FanOut ─► Collecting ─► Merging ─► Scoring ─► Done
//!   │        │           │
//!   │        └───────────┴─► Aborted   (deadline hit, nothing gathered)
//!   └─► Done                           (result cache hit)
//! ```

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Idle,
    FanOut,
    Collecting,
    Merging,
    Scoring,
    Done,
    Aborted,
}

impl SearchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchState::Done | SearchState::Aborted)
    }

    pub fn can_transition_to(&self, next: SearchState) -> bool {
        use SearchState::*;
        matches!(
            (self, next),
            (Idle, FanOut)
                | (Idle, Done)
                | (FanOut, Collecting)
                | (FanOut, Aborted)
                | (Collecting, Merging)
                | (Collecting, Aborted)
                | (Merging, Scoring)
                | (Scoring, Done)
        )
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchState::Idle => write!(f, "idle"),
            SearchState::FanOut => write!(f, "fan-out"),
            SearchState::Collecting => write!(f, "collecting"),
            SearchState::Merging => write!(f, "merging"),
            SearchState::Scoring => write!(f, "scoring"),
            SearchState::Done => write!(f, "done"),
            SearchState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Tracks one search through its states
#[derive(Debug)]
pub struct SearchLifecycle {
    search_id: Uuid,
    state: SearchState,
    started_at: Instant,
}

impl SearchLifecycle {
    pub fn new(search_id: Uuid) -> Self {
        Self {
            search_id,
            state: SearchState::Idle,
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn advance(&mut self, next: SearchState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::Internal(format!(
                "invalid search transition {} -> {}",
                self.state, next
            )));
        }

        tracing::debug!(
            search_id = %self.search_id,
            from = %self.state,
            to = %next,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Search state transition"
        );
        self.state = next;
        Ok(())
    }
}
