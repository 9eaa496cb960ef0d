//! Search configuration

use crate::error::Result;
use crate::matching::MatchSettings;
use crate::models::DEFAULT_MAX_RESULTS;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SearchConfig {
    /// Backend tasks allowed to run at once, across all searches
    #[validate(range(min = 1, max = 1024))]
    pub max_concurrent_backends: usize,

    /// Budget for one backend's list + match + tags pipeline
    #[validate(range(min = 1))]
    pub backend_timeout_ms: u64,

    /// Overall wall-clock budget of a search
    #[validate(range(min = 1))]
    pub search_timeout_ms: u64,

    /// Path scores at or above this skip the tag lookup
    #[validate(range(min = 0.0, max = 1.0))]
    pub confident_match_threshold: f64,

    /// Fuzzy similarities below this count as no match
    #[validate(range(min = 0.0, max = 1.0))]
    pub fuzzy_floor: f64,

    /// Consult object tags for weak path matches
    pub tag_search_enabled: bool,

    /// Largest `get_tags_batch` request
    #[validate(range(min = 1, max = 10000))]
    pub max_tag_batch_size: usize,

    /// Items requested per listing page
    #[validate(range(min = 1, max = 10000))]
    pub page_size: usize,

    /// Stop listing a backend after this many pages
    pub max_pages: Option<usize>,

    /// Result limit for queries that do not set one
    #[validate(range(min = 1, max = 10000))]
    pub default_max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_backends: 10,
            backend_timeout_ms: 10_000,
            search_timeout_ms: 30_000,
            confident_match_threshold: 0.8,
            fuzzy_floor: 0.6,
            tag_search_enabled: true,
            max_tag_batch_size: 100,
            page_size: 1000,
            max_pages: None,
            default_max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchConfig {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            confident_threshold: self.confident_match_threshold,
            fuzzy_floor: self.fuzzy_floor,
            tag_search_enabled: self.tag_search_enabled,
        }
    }

    /// Range checks; a backend budget larger than the overall budget is
    /// allowed but never reached
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.backend_timeout_ms > self.search_timeout_ms {
            tracing::warn!(
                backend_timeout_ms = self.backend_timeout_ms,
                search_timeout_ms = self.search_timeout_ms,
                "Backend timeout exceeds the overall search timeout"
            );
        }
        Ok(())
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn max_concurrent_backends(mut self, max: usize) -> Self {
        self.config.max_concurrent_backends = max;
        self
    }

    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.config.search_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn confident_match_threshold(mut self, threshold: f64) -> Self {
        self.config.confident_match_threshold = threshold;
        self
    }

    pub fn fuzzy_floor(mut self, floor: f64) -> Self {
        self.config.fuzzy_floor = floor;
        self
    }

    pub fn tag_search_enabled(mut self, enabled: bool) -> Self {
        self.config.tag_search_enabled = enabled;
        self
    }

    pub fn max_tag_batch_size(mut self, size: usize) -> Self {
        self.config.max_tag_batch_size = size;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = Some(pages);
        self
    }

    pub fn default_max_results(mut self, max: usize) -> Self {
        self.config.default_max_results = max;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
