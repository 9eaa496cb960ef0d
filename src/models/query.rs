use super::file::FileType;
use crate::error::{EngineError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

/// Default number of groups returned when a query does not say
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Upper bound on `max_results`
pub const MAX_RESULTS_LIMIT: usize = 10_000;

/// A search request
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Free-text terms, in the order the caller gave them
    pub search_terms: Vec<String>,

    /// Preferred file type, used for ranking
    pub file_type_hint: Option<FileType>,

    /// Backend allow-list; empty means every registered backend
    pub backends_enabled: BTreeSet<String>,

    /// Maximum groups to return
    pub max_results: usize,

    /// Overall search timeout; falls back to the engine default
    pub timeout: Option<Duration>,
}

/// Cache-relevant view of a query
#[derive(Serialize)]
struct Signature<'a> {
    schema: u32,
    terms: Vec<String>,
    file_type_hint: Option<FileType>,
    backends: &'a BTreeSet<String>,
    max_results: usize,
}

impl Query {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            search_terms: terms.into_iter().map(Into::into).collect(),
            file_type_hint: None,
            backends_enabled: BTreeSet::new(),
            max_results: DEFAULT_MAX_RESULTS,
            timeout: None,
        }
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type_hint = Some(file_type);
        self
    }

    /// Parse a hint such as `"fastq"` or `"BAM"`
    pub fn with_file_type_hint(mut self, hint: &str) -> Result<Self> {
        let file_type = FileType::from_str(hint.trim())
            .map_err(|_| EngineError::Validation(format!("unsupported file type hint: {hint}")))?;
        self.file_type_hint = Some(file_type);
        Ok(self)
    }

    pub fn with_backends<I, S>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backends_enabled = backends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Lowercased, trimmed, non-blank terms in caller order
    pub fn normalized_terms(&self) -> Vec<String> {
        self.search_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(EngineError::Validation(format!(
                "max_results must be between 1 and {MAX_RESULTS_LIMIT}, got {}",
                self.max_results
            )));
        }

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(EngineError::Validation(
                    "timeout must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Stable hash of everything that changes the result set.
    ///
    /// Term order and case do not change the ranking, so terms are sorted
    /// after normalization; the timeout is excluded.
    pub fn signature(&self) -> String {
        let mut terms = self.normalized_terms();
        terms.sort();

        let signature = Signature {
            schema: 1,
            terms,
            file_type_hint: self.file_type_hint,
            backends: &self.backends_enabled,
            max_results: self.max_results,
        };

        // Serializing plain strings, numbers and sets cannot fail
        let payload = serde_json::to_vec(&signature).unwrap_or_default();
        format!("{:x}", Sha256::digest(&payload))
    }
}
